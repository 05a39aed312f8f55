//! Fixed-width line wrapping transform.

use super::{Backing, COPY_CHUNK, Metadata, Stream, replay_to};
use crate::error::{Error, Result};
use std::io::SeekFrom;

/// Default line width; keeps wrapped base64 under the RFC 2045 limit.
pub const DEFAULT_WIDTH: usize = 75;

/// Default line delimiter.
pub const DEFAULT_DELIMITER: &[u8] = b"\n";

/// Stream that cuts its input into `width`-byte slices and appends a
/// delimiter after each slice.
///
/// Slices are produced lazily as the consumer reads. An input failure is
/// reported after the bytes already produced, and reading resumes with the
/// slice that was interrupted.
#[derive(Debug)]
pub struct LineChunk {
    input: Box<dyn Stream>,
    width: usize,
    delimiter: Vec<u8>,
    /// Current slice; ends with the delimiter once `complete`.
    line: Vec<u8>,
    complete: bool,
    cursor: usize,
    position: u64,
    pending: Option<Error>,
    closed: bool,
}

impl LineChunk {
    /// Wraps `input` with the default width and delimiter.
    #[must_use]
    pub fn new(input: impl Stream + 'static) -> Self {
        Self::with_width(input, DEFAULT_WIDTH, DEFAULT_DELIMITER)
    }

    /// Wraps `input` with a custom width and delimiter. A zero width is
    /// treated as one.
    #[must_use]
    pub fn with_width(input: impl Stream + 'static, width: usize, delimiter: &[u8]) -> Self {
        Self {
            input: Box::new(input),
            width: width.max(1),
            delimiter: delimiter.to_vec(),
            line: Vec::new(),
            complete: false,
            cursor: 0,
            position: 0,
            pending: None,
            closed: false,
        }
    }

    /// Returns the line width.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    const fn check(&self) -> Result<()> {
        if self.closed {
            Err(Error::Closed)
        } else {
            Ok(())
        }
    }

    /// Loads the next slice plus delimiter; false once the input is spent.
    ///
    /// Bytes read before an input error stay in `line`, and the next call
    /// continues filling the same slice.
    fn next_line(&mut self) -> Result<bool> {
        if self.complete {
            self.line.clear();
            self.cursor = 0;
            self.complete = false;
        }

        while self.line.len() < self.width && !self.input.eof()? {
            let part = self.input.read(self.width - self.line.len())?;
            if part.is_empty() {
                break;
            }
            self.line.extend_from_slice(&part);
        }
        if self.line.is_empty() {
            return Ok(false);
        }
        self.line.extend_from_slice(&self.delimiter);
        self.complete = true;
        Ok(true)
    }

    /// True when no produced byte is left unserved.
    const fn drained(&self) -> bool {
        if self.complete {
            self.cursor == self.line.len()
        } else {
            self.line.is_empty()
        }
    }

    fn reset(&mut self) {
        self.line.clear();
        self.complete = false;
        self.cursor = 0;
        self.pending = None;
    }
}

impl Stream for LineChunk {
    fn read(&mut self, len: usize) -> Result<Vec<u8>> {
        self.check()?;
        if let Some(err) = self.pending.take() {
            return Err(err);
        }

        let mut out = Vec::with_capacity(len.min(COPY_CHUNK));
        while out.len() < len {
            if !self.complete || self.cursor == self.line.len() {
                match self.next_line() {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(err) if out.is_empty() => return Err(err),
                    Err(err) => {
                        tracing::debug!(%err, "deferring input failure");
                        self.pending = Some(err);
                        break;
                    }
                }
            }
            let take = (len - out.len()).min(self.line.len() - self.cursor);
            out.extend_from_slice(&self.line[self.cursor..self.cursor + take]);
            self.cursor += take;
        }

        self.position += out.len() as u64;
        Ok(out)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.check()?;
        if !self.input.is_seekable() {
            return Err(Error::NotSeekable);
        }
        let SeekFrom::Start(offset) = pos else {
            return Err(Error::InvalidSeek(
                "LineChunk can only seek from the start".to_string(),
            ));
        };

        self.input.rewind()?;
        self.reset();
        self.position = 0;
        replay_to(self, offset)
    }

    fn tell(&mut self) -> Result<u64> {
        self.check()?;
        Ok(self.position)
    }

    fn eof(&mut self) -> Result<bool> {
        self.check()?;
        if self.pending.is_some() {
            return Ok(false);
        }
        Ok(self.drained() && self.input.eof()?)
    }

    fn size(&mut self) -> Result<Option<u64>> {
        self.check()?;
        let width = self.width as u64;
        let delimiter = self.delimiter.len() as u64;
        Ok(self
            .input
            .size()?
            .map(|n| n + n.div_ceil(width) * delimiter))
    }

    fn is_readable(&self) -> bool {
        true
    }

    fn is_seekable(&self) -> bool {
        self.input.is_seekable()
    }

    fn close(&mut self) {
        self.input.close();
        self.reset();
        self.closed = true;
    }

    fn detach(&mut self) -> Option<Backing> {
        self.reset();
        self.closed = true;
        self.input.detach()
    }

    fn metadata(&self) -> &Metadata {
        self.input.metadata()
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
    use crate::stream::testing::{FailOnce, read_through_failures};
    use crate::stream::{BackingStream, EmptyStream};

    fn digits() -> BackingStream {
        BackingStream::from_literal("01234567890123456789")
    }

    #[test]
    fn test_chunk_even_width() {
        let mut stream = LineChunk::with_width(digits(), 10, b"|");
        assert_eq!(stream.contents().unwrap(), b"0123456789|0123456789|");
    }

    #[test]
    fn test_chunk_uneven_width() {
        let mut stream = LineChunk::with_width(digits(), 3, b"|");
        assert_eq!(stream.contents().unwrap(), b"012|345|678|901|234|567|89|");
    }

    #[test]
    fn test_chunk_small_reads() {
        let mut stream = LineChunk::with_width(digits(), 3, b"|");
        let mut out = Vec::new();
        while !stream.eof().unwrap() {
            out.extend(stream.read(2).unwrap());
        }
        assert_eq!(out, b"012|345|678|901|234|567|89|");
        assert_eq!(stream.tell().unwrap(), 27);
    }

    #[test]
    fn test_chunk_size() {
        let mut stream = LineChunk::with_width(digits(), 3, b"|");
        assert_eq!(stream.size().unwrap(), Some(27));
        let mut stream = LineChunk::with_width(digits(), 10, b"\r\n");
        assert_eq!(stream.size().unwrap(), Some(24));
    }

    #[test]
    fn test_chunk_default_width() {
        let data = "a".repeat(160);
        let mut stream = LineChunk::new(BackingStream::from_literal(&data));
        let out = String::from_utf8(stream.contents().unwrap()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].len(), 75);
        assert_eq!(lines[1].len(), 75);
        assert_eq!(lines[2].len(), 10);
        assert!(out.ends_with('\n'));
    }

    #[test]
    fn test_chunk_empty_input() {
        let mut stream = LineChunk::new(EmptyStream::new());
        assert!(stream.eof().unwrap());
        assert!(stream.read(10).unwrap().is_empty());
        assert_eq!(stream.size().unwrap(), Some(0));
        assert!(!stream.is_seekable());
        assert!(matches!(stream.rewind(), Err(Error::NotSeekable)));
    }

    #[test]
    fn test_chunk_seek() {
        let mut stream = LineChunk::with_width(digits(), 3, b"|");
        assert_eq!(stream.contents().unwrap().len(), 27);
        assert_eq!(stream.seek(SeekFrom::Start(5)).unwrap(), 5);
        assert_eq!(stream.read(4).unwrap(), b"45|6");
        assert!(matches!(
            stream.seek(SeekFrom::Current(1)),
            Err(Error::InvalidSeek(_))
        ));
    }

    #[test]
    fn test_chunk_resumes_interrupted_slice() {
        let input = FailOnce::new("0123456789", 4).with_step(2);
        let mut stream = LineChunk::with_width(input, 3, b"|");

        assert_eq!(stream.read(5).unwrap(), b"012|");
        assert!(!stream.eof().unwrap());
        assert!(matches!(stream.read(5), Err(Error::BackingStore(_))));
        assert_eq!(stream.tell().unwrap(), 4);

        let (rest, failures) = read_through_failures(&mut stream, 5);
        assert_eq!(failures, 0);
        assert_eq!(rest, b"345|678|9|");
        assert_eq!(stream.tell().unwrap(), 14);
    }

    #[test]
    fn test_chunk_failure_before_any_output() {
        let input = FailOnce::new("abcdefg", 0);
        let mut stream = LineChunk::with_width(input, 3, b"|");
        assert!(stream.read(4).is_err());
        assert_eq!(stream.tell().unwrap(), 0);
        assert_eq!(stream.contents().unwrap(), b"abc|def|g|");
    }

    #[test]
    fn test_chunk_failure_at_every_position() {
        let data = "0123456789abcdef";
        for fail_after in 0..=data.len() {
            for chunk in [1, 2, 5, 64] {
                let input = FailOnce::new(data, fail_after).with_step(3);
                let mut stream = LineChunk::with_width(input, 4, b"|");
                let (out, failures) = read_through_failures(&mut stream, chunk);
                assert_eq!(out, b"0123|4567|89ab|cdef|", "fail_after={fail_after} chunk={chunk}");
                assert!(failures <= 1);
            }
        }
    }

    #[test]
    fn test_chunk_oversized_read() {
        let mut stream = LineChunk::with_width(digits(), 10, b"|");
        assert_eq!(stream.read(usize::MAX >> 1).unwrap(), b"0123456789|0123456789|");
    }

    #[test]
    fn test_chunk_closed() {
        let mut stream = LineChunk::new(digits());
        stream.close();
        assert!(matches!(stream.read(1), Err(Error::Closed)));
        assert!(matches!(stream.tell(), Err(Error::Closed)));
    }
}
