//! Base64 transfer-encoding transform.

use super::{Backing, BackingStream, Metadata, Stream};
use crate::encoding::encode_base64;
use crate::error::{Error, Result};
use std::io::SeekFrom;

/// Bytes pulled from the input per iteration while encoding.
const READ_CHUNK: usize = 2048;

/// Stream producing the standard base64 encoding of its input.
///
/// The whole input is encoded into a temporary buffer the first time the
/// stream is used, then served from that buffer; the buffer spills to disk
/// for large inputs. The input is read exactly once; if it fails partway,
/// the error is returned and the next call continues from where encoding
/// stopped.
#[derive(Debug)]
pub struct Base64Encode {
    input: Box<dyn Stream>,
    output: BackingStream,
    /// Input bytes not yet encoded, always fewer than three between reads.
    carry: Vec<u8>,
    consumed: u64,
    done: bool,
    closed: bool,
}

impl Base64Encode {
    /// Wraps `input`.
    #[must_use]
    pub fn new(input: impl Stream + 'static) -> Self {
        Self {
            input: Box::new(input),
            output: BackingStream::temp(),
            carry: Vec::with_capacity(READ_CHUNK + 2),
            consumed: 0,
            done: false,
            closed: false,
        }
    }

    /// Encodes the rest of the input into `output`. Progress made before an
    /// error is kept.
    fn drain(&mut self) -> Result<()> {
        while !self.input.eof()? {
            let chunk = self.input.read(READ_CHUNK)?;
            if chunk.is_empty() {
                break;
            }
            self.consumed += chunk.len() as u64;
            self.carry.extend_from_slice(&chunk);

            // Only whole 3-byte groups are encoded before the input ends.
            let whole = self.carry.len() / 3 * 3;
            self.output
                .write(encode_base64(&self.carry[..whole]).as_bytes())?;
            self.carry.drain(..whole);
        }
        if !self.carry.is_empty() {
            self.output.write(encode_base64(&self.carry).as_bytes())?;
            self.carry.clear();
        }

        self.output.rewind()?;
        tracing::trace!(input = self.consumed, "base64 encoded input");
        Ok(())
    }

    fn encoded(&mut self) -> Result<&mut BackingStream> {
        if self.closed {
            return Err(Error::Closed);
        }
        if !self.done {
            if let Err(err) = self.drain() {
                tracing::debug!(consumed = self.consumed, %err, "base64 input failed");
                return Err(err);
            }
            self.done = true;
        }
        Ok(&mut self.output)
    }
}

impl Stream for Base64Encode {
    fn read(&mut self, len: usize) -> Result<Vec<u8>> {
        self.encoded()?.read(len)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.encoded()?.seek(pos)
    }

    fn tell(&mut self) -> Result<u64> {
        self.encoded()?.tell()
    }

    fn eof(&mut self) -> Result<bool> {
        self.encoded()?.eof()
    }

    fn size(&mut self) -> Result<Option<u64>> {
        self.encoded()?.size()
    }

    fn is_readable(&self) -> bool {
        true
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn close(&mut self) {
        self.output.close();
        self.input.close();
        self.carry.clear();
        self.closed = true;
    }

    fn detach(&mut self) -> Option<Backing> {
        self.closed = true;
        self.input.close();
        self.carry.clear();
        if self.done {
            self.output.detach()
        } else {
            self.output.close();
            None
        }
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
    use crate::stream::EmptyStream;
    use crate::stream::testing::{FailOnce, read_through_failures};
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    #[test]
    fn test_base64_stream() {
        let mut stream = Base64Encode::new(BackingStream::from_literal("( ͡° ͜ʖ ͡°)"));
        assert_eq!(stream.contents().unwrap(), b"KCDNocKwIM2cypYgzaHCsCk=");
        assert!(stream.eof().unwrap());
    }

    #[test]
    fn test_base64_across_chunk_boundary() {
        // 2048 is not a multiple of 3, so groups straddle input chunks.
        let data: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
        let mut stream = Base64Encode::new(BackingStream::from_literal(&data));

        let encoded = stream.contents().unwrap();
        assert_eq!(encoded, STANDARD.encode(&data).into_bytes());
        assert_eq!(STANDARD.decode(&encoded).unwrap(), data);
    }

    #[test]
    fn test_base64_empty_input() {
        let mut stream = Base64Encode::new(EmptyStream::new());
        assert_eq!(stream.size().unwrap(), Some(0));
        assert!(stream.eof().unwrap());
        assert!(stream.read(16).unwrap().is_empty());
        assert!(stream.is_seekable());
    }

    #[test]
    fn test_base64_rewind() {
        let mut stream = Base64Encode::new(BackingStream::from_literal("Hello, World!"));
        assert_eq!(stream.size().unwrap(), Some(20));
        assert_eq!(stream.read(8).unwrap(), b"SGVsbG8s");
        stream.rewind().unwrap();
        assert_eq!(stream.contents().unwrap(), b"SGVsbG8sIFdvcmxkIQ==");
    }

    #[test]
    fn test_base64_metadata_passthrough() {
        let input = BackingStream::from_literal("x")
            .with_metadata(Metadata::new().with_content_type("text/html"));
        let stream = Base64Encode::new(input);
        assert_eq!(stream.metadata().get("content-type"), Some("text/html"));
    }

    #[test]
    fn test_base64_resumes_after_input_failure() {
        let data = vec![b'a'; 5000];
        let mut stream = Base64Encode::new(FailOnce::new(&data, 4096));

        assert!(matches!(stream.read(64), Err(Error::BackingStore(_))));
        let encoded = stream.contents().unwrap();
        assert_eq!(encoded.len(), 6668);
        assert_eq!(encoded, STANDARD.encode(&data).into_bytes());
    }

    #[test]
    fn test_base64_failure_inside_group() {
        // The failure splits a 3-byte group; the carried bytes must survive.
        let data: Vec<u8> = (0..100u8).collect();
        for fail_after in [1, 2, 50, 99] {
            let input = FailOnce::new(&data, fail_after).with_step(7);
            let mut stream = Base64Encode::new(input);
            let (out, failures) = read_through_failures(&mut stream, 16);
            assert_eq!(failures, 1, "fail_after={fail_after}");
            assert_eq!(STANDARD.decode(&out).unwrap(), data, "fail_after={fail_after}");
        }
    }

    #[test]
    fn test_base64_detach_before_encoding() {
        let mut stream = Base64Encode::new(BackingStream::from_literal("x"));
        assert!(stream.detach().is_none());
        assert!(matches!(stream.read(1), Err(Error::Closed)));
    }

    #[test]
    fn test_base64_closed() {
        let mut stream = Base64Encode::new(BackingStream::from_literal("x"));
        stream.close();
        stream.close();
        assert!(matches!(stream.read(4), Err(Error::Closed)));
    }
}
