//! `std::io::Read` adapter.

use super::Stream;
use std::io;

/// Exposes any [`Stream`] as a [`std::io::Read`], so a finished message can
/// be handed to `io::copy`, buffered readers or a blocking transport.
#[derive(Debug)]
pub struct StreamReader<S> {
    inner: S,
}

impl<S: Stream> StreamReader<S> {
    /// Wraps `inner`.
    pub const fn new(inner: S) -> Self {
        Self { inner }
    }

    /// Returns the wrapped stream.
    pub fn into_inner(self) -> S {
        self.inner
    }

    /// Returns a mutable reference to the wrapped stream.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }
}

impl<S: Stream> io::Read for StreamReader<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let chunk = self.inner.read(buf.len()).map_err(io::Error::other)?;
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        Ok(n)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::stream::{AppendStream, BackingStream, EmptyStream};
    use std::io::Read;

    #[test]
    fn test_reader_copies_everything() {
        let stream = AppendStream::new(vec![
            Box::new(BackingStream::from_literal("Subject: Hi\n")),
            Box::new(BackingStream::from_literal("\nbody\n")),
        ])
        .unwrap();

        let mut reader = StreamReader::new(stream);
        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "Subject: Hi\n\nbody\n");
        assert!(reader.get_mut().read(1).unwrap().is_empty());
    }

    #[test]
    fn test_reader_surfaces_errors() {
        let mut empty = EmptyStream::new();
        empty.close();
        let mut reader = StreamReader::new(empty);
        let mut buf = [0u8; 4];
        assert!(reader.read(&mut buf).is_err());
    }
}
