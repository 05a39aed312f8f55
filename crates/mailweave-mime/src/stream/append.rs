//! Concatenation of several streams into one virtual stream.

use super::{Backing, COPY_CHUNK, Metadata, Stream, replay_to};
use crate::error::{Error, Result};
use std::io::SeekFrom;

/// Stream that reads its members one after the other.
///
/// Members are read lazily, in order, and exactly once per pass; nothing is
/// copied except what a single `read` call returns. The composite is
/// seekable only while every member is.
///
/// If a member fails after a `read` already gathered bytes from earlier
/// members, those bytes are returned and the failure is reported by the
/// next call to `read`.
#[derive(Debug)]
pub struct AppendStream {
    streams: Vec<Box<dyn Stream>>,
    current: usize,
    position: u64,
    seekable: bool,
    pending: Option<Error>,
    metadata: Metadata,
}

impl Default for AppendStream {
    fn default() -> Self {
        Self {
            streams: Vec::new(),
            current: 0,
            position: 0,
            seekable: true,
            pending: None,
            metadata: Metadata::default(),
        }
    }
}

impl AppendStream {
    /// Creates a composite from `streams`, in order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotReadable`] if any stream is not readable.
    pub fn new(streams: Vec<Box<dyn Stream>>) -> Result<Self> {
        let mut append = Self::default();
        for stream in streams {
            append.push(stream)?;
        }
        Ok(append)
    }

    /// Attaches a descriptor to the composite.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Appends a member.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotReadable`] if the stream is not readable.
    pub fn add_stream(&mut self, stream: impl Stream + 'static) -> Result<()> {
        self.push(Box::new(stream))
    }

    fn push(&mut self, stream: Box<dyn Stream>) -> Result<()> {
        if !stream.is_readable() {
            return Err(Error::NotReadable);
        }
        if !stream.is_seekable() {
            self.seekable = false;
        }
        self.streams.push(stream);
        Ok(())
    }

    /// Returns the number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    /// Returns true if there are no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Reads from the member under the cursor, moving to the next member
    /// first when the current one is spent. `None` means the last member
    /// is exhausted.
    fn step(&mut self, last: usize, progress_to_next: bool, want: usize) -> Result<Option<Vec<u8>>> {
        if progress_to_next || self.streams[self.current].eof()? {
            if self.current == last {
                return Ok(None);
            }
            self.current += 1;
        }
        self.streams[self.current].read(want).map(Some)
    }

    fn reset(&mut self) {
        self.streams.clear();
        self.current = 0;
        self.position = 0;
        self.seekable = true;
        self.pending = None;
    }
}

impl Stream for AppendStream {
    fn read(&mut self, len: usize) -> Result<Vec<u8>> {
        if let Some(err) = self.pending.take() {
            return Err(err);
        }

        let mut buf = Vec::with_capacity(len.min(COPY_CHUNK));
        let Some(last) = self.streams.len().checked_sub(1) else {
            return Ok(buf);
        };
        let mut progress_to_next = false;

        while buf.len() < len {
            match self.step(last, progress_to_next, len - buf.len()) {
                Ok(None) => break,
                Ok(Some(chunk)) if chunk.is_empty() => progress_to_next = true,
                Ok(Some(chunk)) => {
                    progress_to_next = false;
                    buf.extend_from_slice(&chunk);
                }
                Err(err) if buf.is_empty() => return Err(err),
                Err(err) => {
                    tracing::debug!(member = self.current, %err, "deferring member failure");
                    self.pending = Some(err);
                    break;
                }
            }
        }

        self.position += buf.len() as u64;
        Ok(buf)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        if !self.seekable {
            return Err(Error::NotSeekable);
        }
        let SeekFrom::Start(offset) = pos else {
            return Err(Error::InvalidSeek(
                "AppendStream can only seek from the start".to_string(),
            ));
        };

        self.current = 0;
        self.position = 0;
        self.pending = None;
        for (index, stream) in self.streams.iter_mut().enumerate() {
            stream.rewind().map_err(|e| Error::seek(index, e))?;
        }

        replay_to(self, offset)
    }

    fn tell(&mut self) -> Result<u64> {
        Ok(self.position)
    }

    fn eof(&mut self) -> Result<bool> {
        if self.pending.is_some() {
            return Ok(false);
        }
        let Some(last) = self.streams.len().checked_sub(1) else {
            return Ok(true);
        };
        Ok(self.current >= last && self.streams[self.current].eof()?)
    }

    fn size(&mut self) -> Result<Option<u64>> {
        let mut total = 0u64;
        for stream in &mut self.streams {
            match stream.size()? {
                Some(size) => total += size,
                None => return Ok(None),
            }
        }
        Ok(Some(total))
    }

    fn is_readable(&self) -> bool {
        true
    }

    fn is_seekable(&self) -> bool {
        self.seekable
    }

    fn close(&mut self) {
        for stream in &mut self.streams {
            stream.close();
        }
        self.reset();
    }

    fn detach(&mut self) -> Option<Backing> {
        for stream in &mut self.streams {
            let _ = stream.detach();
        }
        self.reset();
        None
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use crate::stream::{BackingStream, EmptyStream, Mode};
    use std::io::Cursor;

    fn literal(s: &str) -> Box<dyn Stream> {
        Box::new(BackingStream::from_literal(s))
    }

    /// Member that yields its bytes and then fails once.
    #[derive(Debug)]
    struct Flaky {
        data: Vec<u8>,
        failed: bool,
        metadata: Metadata,
    }

    impl Flaky {
        fn new(data: &str) -> Self {
            Self {
                data: data.as_bytes().to_vec(),
                failed: false,
                metadata: Metadata::default(),
            }
        }
    }

    impl Stream for Flaky {
        fn read(&mut self, len: usize) -> Result<Vec<u8>> {
            if self.data.is_empty() {
                if self.failed {
                    return Ok(Vec::new());
                }
                self.failed = true;
                return Err(Error::BackingStore(std::io::Error::other("disk gone")));
            }
            let take = len.min(self.data.len());
            Ok(self.data.drain(..take).collect())
        }

        fn seek(&mut self, _pos: SeekFrom) -> Result<u64> {
            Err(Error::BackingStore(std::io::Error::other("cannot rewind")))
        }

        fn tell(&mut self) -> Result<u64> {
            Ok(0)
        }

        fn eof(&mut self) -> Result<bool> {
            Ok(self.failed && self.data.is_empty())
        }

        fn size(&mut self) -> Result<Option<u64>> {
            Ok(None)
        }

        fn is_readable(&self) -> bool {
            true
        }

        fn is_seekable(&self) -> bool {
            true
        }

        fn close(&mut self) {}

        fn detach(&mut self) -> Option<Backing> {
            None
        }

        fn metadata(&self) -> &Metadata {
            &self.metadata
        }
    }

    #[test]
    fn test_append_reads_across_members() {
        let mut stream =
            AppendStream::new(vec![literal("Hello"), literal(", "), literal("World!")]).unwrap();
        assert_eq!(stream.len(), 3);
        assert_eq!(stream.read(7).unwrap(), b"Hello, ");
        assert_eq!(stream.tell().unwrap(), 7);
        assert_eq!(stream.read(100).unwrap(), b"World!");
        assert!(stream.eof().unwrap());
        assert!(stream.read(1).unwrap().is_empty());
        assert_eq!(stream.tell().unwrap(), 13);
    }

    #[test]
    fn test_append_empty() {
        let mut stream = AppendStream::default();
        assert!(stream.is_empty());
        assert!(stream.eof().unwrap());
        assert!(stream.read(10).unwrap().is_empty());
        assert_eq!(stream.size().unwrap(), Some(0));
    }

    #[test]
    fn test_append_skips_empty_members() {
        let mut stream = AppendStream::new(vec![
            literal(""),
            literal("a"),
            literal(""),
            literal(""),
            literal("b"),
            literal(""),
        ])
        .unwrap();
        assert_eq!(stream.read(10).unwrap(), b"ab");
        assert!(stream.eof().unwrap());
    }

    #[test]
    fn test_append_size() {
        let mut stream = AppendStream::new(vec![literal("abc"), literal("de")]).unwrap();
        assert_eq!(stream.size().unwrap(), Some(5));

        stream.add_stream(Flaky::new("x")).unwrap();
        assert_eq!(stream.size().unwrap(), None);
    }

    #[test]
    fn test_append_rejects_unreadable() {
        let write_only =
            BackingStream::from_backing(Backing::Memory(Cursor::new(Vec::new())), Mode::Write);
        let mut stream = AppendStream::default();
        assert!(matches!(stream.add_stream(write_only), Err(Error::NotReadable)));
        assert!(stream.is_empty());
    }

    #[test]
    fn test_append_seekability_is_monotonic() {
        let mut stream = AppendStream::new(vec![literal("a")]).unwrap();
        assert!(stream.is_seekable());
        stream.add_stream(EmptyStream::new()).unwrap();
        assert!(!stream.is_seekable());
        stream.add_stream(BackingStream::from_literal("b")).unwrap();
        assert!(!stream.is_seekable());
        assert!(matches!(stream.rewind(), Err(Error::NotSeekable)));
    }

    #[test]
    fn test_append_rewind_and_seek() {
        let mut stream = AppendStream::new(vec![literal("0123"), literal("4567"), literal("89")])
            .unwrap();
        assert_eq!(stream.contents().unwrap(), b"0123456789");
        stream.rewind().unwrap();
        assert_eq!(stream.contents().unwrap(), b"0123456789");

        assert_eq!(stream.seek(SeekFrom::Start(6)).unwrap(), 6);
        assert_eq!(stream.tell().unwrap(), 6);
        assert_eq!(stream.read(3).unwrap(), b"678");

        assert!(matches!(stream.seek(SeekFrom::End(0)), Err(Error::InvalidSeek(_))));
    }

    #[test]
    fn test_append_seek_failure_names_member() {
        let mut stream = AppendStream::new(vec![literal("ok"), Box::new(Flaky::new("x"))]).unwrap();
        match stream.rewind() {
            Err(Error::Seek { index, .. }) => assert_eq!(index, 1),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_append_defers_member_failure() {
        let mut stream = AppendStream::new(vec![
            literal("head "),
            Box::new(Flaky::new("body")),
            literal(" tail"),
        ])
        .unwrap();

        assert_eq!(stream.read(100).unwrap(), b"head body");
        assert_eq!(stream.tell().unwrap(), 9);
        assert!(!stream.eof().unwrap());
        assert!(matches!(stream.read(100), Err(Error::BackingStore(_))));
        assert_eq!(stream.tell().unwrap(), 9);
        assert_eq!(stream.read(100).unwrap(), b" tail");
    }

    #[test]
    fn test_append_immediate_failure() {
        let mut stream = AppendStream::new(vec![Box::new(Flaky::new(""))]).unwrap();
        assert!(stream.read(10).is_err());
        assert_eq!(stream.tell().unwrap(), 0);
    }

    #[test]
    fn test_append_oversized_read() {
        let mut stream = AppendStream::new(vec![literal("ab"), literal("cd")]).unwrap();
        assert_eq!(stream.read(usize::MAX >> 1).unwrap(), b"abcd");
        assert!(stream.eof().unwrap());
    }

    #[test]
    fn test_append_close_propagates() {
        let mut stream = AppendStream::new(vec![literal("a"), literal("b")]).unwrap();
        stream.close();
        assert!(stream.is_empty());
        assert!(stream.eof().unwrap());
        assert_eq!(stream.tell().unwrap(), 0);
        stream.close();

        let mut stream = AppendStream::new(vec![literal("a")]).unwrap();
        assert!(stream.detach().is_none());
        assert!(stream.is_empty());
    }

    #[test]
    fn test_append_rejects_write() {
        let mut stream = AppendStream::new(vec![literal("a")]).unwrap();
        assert!(!stream.is_writable());
        assert!(matches!(stream.write(b"x"), Err(Error::NotWritable)));
    }

    #[test]
    fn test_append_nested() {
        let inner = AppendStream::new(vec![literal("b"), literal("c")]).unwrap();
        let mut outer =
            AppendStream::new(vec![literal("a"), Box::new(inner), literal("d")]).unwrap();
        assert_eq!(outer.size().unwrap(), Some(4));
        assert_eq!(outer.contents().unwrap(), b"abcd");
    }
}
