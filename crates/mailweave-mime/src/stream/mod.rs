//! Byte stream contract and the stream implementations built on it.
//!
//! Every data source in a message is a [`Stream`]: literal header bytes,
//! an attachment file, the base64 and line-wrapping transforms, and the
//! [`AppendStream`] that concatenates all of them into the final payload.
//! Streams are pull-based; nothing is produced until the consumer calls
//! [`Stream::read`].

mod append;
mod backing;
mod base64_encode;
mod chunk;
mod empty;
mod reader;
#[cfg(test)]
pub(crate) mod testing;

pub use append::AppendStream;
pub use backing::{Backing, BackingStream, Mode};
pub use base64_encode::Base64Encode;
pub use chunk::LineChunk;
pub use empty::EmptyStream;
pub use reader::StreamReader;

use crate::error::{Error, Result};
use std::fmt;
use std::io::SeekFrom;

/// Chunk size used when a stream is read to the end.
pub(crate) const COPY_CHUNK: usize = 8192;

/// Content disposition of an attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Disposition {
    /// Displayed as part of the message body (`multipart/related`).
    Inline,
    /// Offered as a separate file.
    #[default]
    Attachment,
}

impl Disposition {
    /// Parses a disposition name, case-insensitively.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inline" => Some(Self::Inline),
            "attachment" => Some(Self::Attachment),
            _ => None,
        }
    }

    /// Returns the header token for this disposition.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Inline => "inline",
            Self::Attachment => "attachment",
        }
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptor carried by a stream that is used as a body part or attachment.
///
/// Every field is optional; the body assembler applies defaults for the
/// missing ones.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Metadata {
    /// MIME content type (e.g. `image/png`).
    pub content_type: Option<String>,
    /// Attachment disposition.
    pub disposition: Option<Disposition>,
    /// File name advertised in `Content-Disposition`.
    pub filename: Option<String>,
    /// Attachment id, used as `Content-ID` for inline parts.
    pub id: Option<String>,
}

impl Metadata {
    /// Creates an empty descriptor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the content type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Sets the disposition.
    #[must_use]
    pub const fn with_disposition(mut self, disposition: Disposition) -> Self {
        self.disposition = Some(disposition);
        self
    }

    /// Sets the file name.
    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Sets the attachment id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Returns true when the disposition is inline.
    #[must_use]
    pub fn is_inline(&self) -> bool {
        self.disposition == Some(Disposition::Inline)
    }

    /// Looks a field up by its conventional key.
    ///
    /// Recognised keys are `content-type`, `disposition`, `name` (or
    /// `filename`) and `id`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        match key {
            "content-type" => self.content_type.as_deref(),
            "disposition" => self.disposition.as_ref().map(Disposition::as_str),
            "name" | "filename" => self.filename.as_deref(),
            "id" => self.id.as_deref(),
            _ => None,
        }
    }
}

/// Readable, writable and/or seekable byte source.
///
/// Implementations advertise their capabilities through `is_readable`,
/// `is_writable` and `is_seekable` and fail with [`Error::NotReadable`],
/// [`Error::NotWritable`] or [`Error::NotSeekable`] when asked for one they
/// lack. Once closed (or detached) every operation fails with
/// [`Error::Closed`]; `close` and `detach` themselves may be called again.
pub trait Stream: Send + fmt::Debug {
    /// Reads up to `len` bytes. An empty result means the end was reached.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream is closed, not readable, or the
    /// backing store fails.
    fn read(&mut self, len: usize) -> Result<Vec<u8>>;

    /// Writes `data`, returning the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotWritable`] unless the stream supports writing.
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let _ = data;
        Err(Error::NotWritable)
    }

    /// Moves the read position, returning the new absolute position.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotSeekable`] if the stream cannot seek.
    fn seek(&mut self, pos: SeekFrom) -> Result<u64>;

    /// Seeks back to the start.
    ///
    /// # Errors
    ///
    /// Same as [`Stream::seek`].
    fn rewind(&mut self) -> Result<()> {
        self.seek(SeekFrom::Start(0)).map(|_| ())
    }

    /// Returns the current position.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream is closed.
    fn tell(&mut self) -> Result<u64>;

    /// Returns true when no more bytes can be read.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream is closed.
    fn eof(&mut self) -> Result<bool>;

    /// Returns the total size in bytes, or `None` when it is unknown.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream is closed or the store cannot be
    /// inspected.
    fn size(&mut self) -> Result<Option<u64>>;

    /// Returns true if the stream can be read.
    fn is_readable(&self) -> bool;

    /// Returns true if the stream can be written.
    fn is_writable(&self) -> bool {
        false
    }

    /// Returns true if the stream can seek.
    fn is_seekable(&self) -> bool;

    /// Releases the stream and everything it owns.
    fn close(&mut self);

    /// Releases the stream without closing the underlying store, handing it
    /// to the caller when there is one.
    fn detach(&mut self) -> Option<Backing>;

    /// Returns the descriptor attached to this stream.
    fn metadata(&self) -> &Metadata;

    /// Reads everything from the current position to the end.
    ///
    /// # Errors
    ///
    /// Propagates any read failure.
    fn contents(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        loop {
            let chunk = self.read(COPY_CHUNK)?;
            if chunk.is_empty() {
                break;
            }
            out.extend_from_slice(&chunk);
        }
        Ok(out)
    }
}

impl<S: Stream + ?Sized> Stream for Box<S> {
    fn read(&mut self, len: usize) -> Result<Vec<u8>> {
        (**self).read(len)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        (**self).write(data)
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        (**self).seek(pos)
    }

    fn rewind(&mut self) -> Result<()> {
        (**self).rewind()
    }

    fn tell(&mut self) -> Result<u64> {
        (**self).tell()
    }

    fn eof(&mut self) -> Result<bool> {
        (**self).eof()
    }

    fn size(&mut self) -> Result<Option<u64>> {
        (**self).size()
    }

    fn is_readable(&self) -> bool {
        (**self).is_readable()
    }

    fn is_writable(&self) -> bool {
        (**self).is_writable()
    }

    fn is_seekable(&self) -> bool {
        (**self).is_seekable()
    }

    fn close(&mut self) {
        (**self).close();
    }

    fn detach(&mut self) -> Option<Backing> {
        (**self).detach()
    }

    fn metadata(&self) -> &Metadata {
        (**self).metadata()
    }

    fn contents(&mut self) -> Result<Vec<u8>> {
        (**self).contents()
    }
}

/// Reads and discards from the current position until `offset` bytes were
/// consumed or the stream ends. Callers reset the position first. Returns
/// the number of bytes consumed.
pub(crate) fn replay_to<S: Stream + ?Sized>(stream: &mut S, offset: u64) -> Result<u64> {
    let mut pos = 0u64;
    while pos < offset && !stream.eof()? {
        let want = usize::try_from((offset - pos).min(COPY_CHUNK as u64)).unwrap_or(COPY_CHUNK);
        let skipped = stream.read(want)?;
        if skipped.is_empty() {
            break;
        }
        pos += skipped.len() as u64;
    }
    Ok(pos)
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

    #[test]
    fn test_disposition_parse() {
        assert_eq!(Disposition::parse("Inline"), Some(Disposition::Inline));
        assert_eq!(Disposition::parse(" attachment "), Some(Disposition::Attachment));
        assert_eq!(Disposition::parse("form-data"), None);
        assert_eq!(Disposition::default(), Disposition::Attachment);
    }

    #[test]
    fn test_metadata_get() {
        let meta = Metadata::new()
            .with_content_type("image/png")
            .with_disposition(Disposition::Inline)
            .with_filename("logo.png")
            .with_id("logo");

        assert_eq!(meta.get("content-type"), Some("image/png"));
        assert_eq!(meta.get("disposition"), Some("inline"));
        assert_eq!(meta.get("name"), Some("logo.png"));
        assert_eq!(meta.get("filename"), Some("logo.png"));
        assert_eq!(meta.get("id"), Some("logo"));
        assert_eq!(meta.get("charset"), None);
        assert!(meta.is_inline());
    }

    #[test]
    fn test_metadata_empty() {
        let meta = Metadata::new();
        assert_eq!(meta.get("content-type"), None);
        assert!(!meta.is_inline());
    }

    #[test]
    fn test_boxed_stream_delegates() {
        let mut boxed: Box<dyn Stream> = Box::new(BackingStream::from_literal(b"boxed"));
        assert!(boxed.is_seekable());
        assert_eq!(boxed.size().unwrap(), Some(5));
        assert_eq!(boxed.contents().unwrap(), b"boxed");
        boxed.rewind().unwrap();
        assert_eq!(boxed.read(3).unwrap(), b"box");
    }

    #[test]
    fn test_replay_to() {
        let mut stream = BackingStream::from_literal(b"0123456789");
        stream.rewind().unwrap();
        assert_eq!(replay_to(&mut stream, 4).unwrap(), 4);
        assert_eq!(stream.read(2).unwrap(), b"45");

        stream.rewind().unwrap();
        assert_eq!(replay_to(&mut stream, 100).unwrap(), 10);
    }
}
