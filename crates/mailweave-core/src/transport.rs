//! Delivery of a finished message.
//!
//! A [`Transport`] receives the envelope and pulls the message bytes from
//! the built stream in chunks until it is exhausted.

use std::io::Write;
use std::time::Duration;

use mailweave_mime::Stream;

use crate::error::Result;

/// Bytes requested from the message stream per read.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// SMTP envelope of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Envelope sender (`MAIL FROM`).
    pub from: String,
    /// Envelope recipients (`RCPT TO`): every `To`, `Cc` and `Bcc` address.
    pub recipients: Vec<String>,
}

/// Options shared by transports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportOptions {
    /// Overall time limit for a delivery.
    pub timeout: Option<Duration>,
    /// Verbose per-chunk logging.
    pub debug: bool,
    /// Proxy to connect through.
    pub proxy: Option<String>,
    /// Bytes requested from the message stream per read.
    pub chunk_size: usize,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            debug: false,
            proxy: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Sink for finished messages.
pub trait Transport {
    /// Delivers the message read from `data`.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the stream or delivering fails.
    fn send(&mut self, envelope: &Envelope, data: &mut dyn Stream) -> Result<()>;
}

/// Transport that writes the raw message to any [`Write`] sink.
///
/// Used for `.eml` output, piping into a sendmail-style program, and tests.
#[derive(Debug)]
pub struct WriterTransport<W> {
    writer: W,
    options: TransportOptions,
    written: u64,
}

impl<W: Write> WriterTransport<W> {
    /// Creates a transport writing to `writer` with default options.
    pub fn new(writer: W) -> Self {
        Self::with_options(writer, TransportOptions::default())
    }

    /// Creates a transport writing to `writer`.
    pub fn with_options(writer: W, options: TransportOptions) -> Self {
        Self {
            writer,
            options,
            written: 0,
        }
    }

    /// Sets the read chunk size. Zero keeps the current size.
    #[must_use]
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        if chunk_size > 0 {
            self.options.chunk_size = chunk_size;
        }
        self
    }

    /// Returns the options in use.
    pub const fn options(&self) -> &TransportOptions {
        &self.options
    }

    /// Returns the total number of bytes written so far.
    pub const fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Returns a reference to the sink.
    pub const fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Returns the sink.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> Transport for WriterTransport<W> {
    fn send(&mut self, envelope: &Envelope, data: &mut dyn Stream) -> Result<()> {
        let chunk_size = self.options.chunk_size.max(1);
        let mut total = 0u64;

        while !data.eof()? {
            let chunk = data.read(chunk_size)?;
            if chunk.is_empty() {
                break;
            }
            if self.options.debug {
                tracing::debug!(len = chunk.len(), "writing chunk");
            }
            self.writer.write_all(&chunk)?;
            total += chunk.len() as u64;
        }
        self.writer.flush()?;
        self.written += total;

        tracing::info!(
            from = %envelope.from,
            recipients = envelope.recipients.len(),
            bytes = total,
            "message written"
        );
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use mailweave_mime::{AppendStream, BackingStream};

    fn envelope() -> Envelope {
        Envelope {
            from: "a@example.com".to_string(),
            recipients: vec!["b@example.com".to_string()],
        }
    }

    #[test]
    fn test_writes_exact_bytes() {
        let mut data = AppendStream::default();
        data.add_stream(BackingStream::from_literal("Subject: hi\n")).unwrap();
        data.add_stream(BackingStream::from_literal("\nbody".repeat(500))).unwrap();

        let mut transport = WriterTransport::new(Vec::new()).with_chunk_size(7);
        transport.send(&envelope(), &mut data).unwrap();

        let expected = format!("Subject: hi\n{}", "\nbody".repeat(500));
        assert_eq!(transport.bytes_written(), expected.len() as u64);
        assert_eq!(transport.into_inner(), expected.into_bytes());
    }

    #[test]
    fn test_default_chunk_size() {
        let transport = WriterTransport::new(Vec::new()).with_chunk_size(0);
        assert_eq!(transport.options().chunk_size, DEFAULT_CHUNK_SIZE);
    }

    #[test]
    fn test_empty_stream_writes_nothing() {
        let mut data = AppendStream::default();
        let mut transport = WriterTransport::new(Vec::new());
        transport.send(&envelope(), &mut data).unwrap();
        assert!(transport.get_ref().is_empty());
    }

    #[test]
    fn test_read_error_is_returned() {
        let mut data = BackingStream::from_literal("x");
        data.close();
        let mut transport = WriterTransport::new(Vec::new());
        assert!(transport.send(&envelope(), &mut data).is_err());
    }
}
