//! Stream doubles shared by unit tests.

use super::{Backing, Metadata, Stream};
use crate::error::{Error, Result};
use std::io::SeekFrom;

/// Stream over fixed bytes that fails once after `fail_after` bytes and
/// then carries on where it stopped.
#[derive(Debug)]
pub(crate) struct FailOnce {
    data: Vec<u8>,
    served: usize,
    fail_after: usize,
    step: usize,
    failed: bool,
    metadata: Metadata,
}

impl FailOnce {
    pub(crate) fn new(data: impl AsRef<[u8]>, fail_after: usize) -> Self {
        Self {
            data: data.as_ref().to_vec(),
            served: 0,
            fail_after,
            step: usize::MAX,
            failed: false,
            metadata: Metadata::default(),
        }
    }

    /// Caps every read at `step` bytes.
    pub(crate) fn with_step(mut self, step: usize) -> Self {
        self.step = step.max(1);
        self
    }

    pub(crate) fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

impl Stream for FailOnce {
    fn read(&mut self, len: usize) -> Result<Vec<u8>> {
        if !self.failed && self.served == self.fail_after {
            self.failed = true;
            return Err(Error::BackingStore(std::io::Error::other(
                "transient read failure",
            )));
        }
        let mut end = self
            .data
            .len()
            .min(self.served.saturating_add(len.min(self.step)));
        if !self.failed {
            end = end.min(self.fail_after);
        }
        let out = self.data[self.served..end].to_vec();
        self.served = end;
        Ok(out)
    }

    fn seek(&mut self, _pos: SeekFrom) -> Result<u64> {
        Err(Error::NotSeekable)
    }

    fn tell(&mut self) -> Result<u64> {
        Ok(self.served as u64)
    }

    fn eof(&mut self) -> Result<bool> {
        Ok(self.served == self.data.len())
    }

    fn size(&mut self) -> Result<Option<u64>> {
        Ok(Some(self.data.len() as u64))
    }

    fn is_readable(&self) -> bool {
        true
    }

    fn is_seekable(&self) -> bool {
        false
    }

    fn close(&mut self) {}

    fn detach(&mut self) -> Option<Backing> {
        None
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

/// Reads `stream` to the end in `chunk`-byte steps, counting the failures
/// it recovers from.
pub(crate) fn read_through_failures(stream: &mut impl Stream, chunk: usize) -> (Vec<u8>, usize) {
    let mut out = Vec::new();
    let mut failures = 0;
    while failures < 8 {
        match stream.eof() {
            Ok(true) => break,
            Ok(false) => {}
            Err(_) => {
                failures += 1;
                continue;
            }
        }
        match stream.read(chunk) {
            Ok(bytes) => out.extend(bytes),
            Err(_) => failures += 1,
        }
    }
    (out, failures)
}
