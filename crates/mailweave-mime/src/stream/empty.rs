//! Zero-length stream.

use super::{Backing, Metadata, Stream};
use crate::error::{Error, Result};
use std::io::SeekFrom;

/// Stream with no content, used as the default message body.
///
/// Readable, never writable or seekable.
#[derive(Debug, Default)]
pub struct EmptyStream {
    closed: bool,
    metadata: Metadata,
}

impl EmptyStream {
    /// Creates an empty stream.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty stream carrying a descriptor.
    #[must_use]
    pub fn with_metadata(metadata: Metadata) -> Self {
        Self {
            closed: false,
            metadata,
        }
    }

    const fn check(&self) -> Result<()> {
        if self.closed {
            Err(Error::Closed)
        } else {
            Ok(())
        }
    }
}

impl Stream for EmptyStream {
    fn read(&mut self, _len: usize) -> Result<Vec<u8>> {
        self.check()?;
        Ok(Vec::new())
    }

    fn write(&mut self, _data: &[u8]) -> Result<usize> {
        self.check()?;
        Err(Error::NotWritable)
    }

    fn seek(&mut self, _pos: SeekFrom) -> Result<u64> {
        self.check()?;
        Err(Error::NotSeekable)
    }

    fn tell(&mut self) -> Result<u64> {
        self.check()?;
        Ok(0)
    }

    fn eof(&mut self) -> Result<bool> {
        self.check()?;
        Ok(true)
    }

    fn size(&mut self) -> Result<Option<u64>> {
        self.check()?;
        Ok(Some(0))
    }

    fn is_readable(&self) -> bool {
        true
    }

    fn is_seekable(&self) -> bool {
        false
    }

    fn close(&mut self) {
        self.closed = true;
    }

    fn detach(&mut self) -> Option<Backing> {
        self.closed = true;
        None
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_stream() {
        let mut stream = EmptyStream::new();
        assert!(stream.eof().unwrap());
        assert_eq!(stream.size().unwrap(), Some(0));
        assert_eq!(stream.tell().unwrap(), 0);
        assert!(stream.read(1024).unwrap().is_empty());
        assert!(stream.is_readable());
        assert!(!stream.is_writable());
        assert!(!stream.is_seekable());
    }

    #[test]
    fn test_empty_stream_capabilities() {
        let mut stream = EmptyStream::new();
        assert!(matches!(stream.write(b"x"), Err(Error::NotWritable)));
        assert!(matches!(stream.rewind(), Err(Error::NotSeekable)));
    }

    #[test]
    fn test_empty_stream_closed() {
        let mut stream = EmptyStream::with_metadata(Metadata::new().with_content_type("text/html"));
        assert_eq!(stream.metadata().get("content-type"), Some("text/html"));
        stream.close();
        assert!(matches!(stream.read(1), Err(Error::Closed)));
        assert!(matches!(stream.eof(), Err(Error::Closed)));
        assert!(stream.detach().is_none());
    }
}
