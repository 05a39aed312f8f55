//! Owned byte buffer backed by memory, a spooled temporary file, or a file.

use super::{COPY_CHUNK, Metadata, Stream};
use crate::error::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tempfile::SpooledTempFile;

/// Bytes kept in memory before a temporary store spills to disk.
pub const SPOOL_THRESHOLD: usize = 2 * 1024 * 1024;

/// Access mode of a [`BackingStream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Read only.
    Read,
    /// Write only.
    Write,
    /// Read and write.
    ReadWrite,
}

impl Mode {
    /// Returns true if the mode permits reading.
    #[must_use]
    pub const fn readable(self) -> bool {
        matches!(self, Self::Read | Self::ReadWrite)
    }

    /// Returns true if the mode permits writing.
    #[must_use]
    pub const fn writable(self) -> bool {
        matches!(self, Self::Write | Self::ReadWrite)
    }
}

/// Underlying store of a [`BackingStream`].
#[derive(Debug)]
pub enum Backing {
    /// Growable in-memory buffer.
    Memory(Cursor<Vec<u8>>),
    /// Memory buffer that rolls over to a temporary file.
    Spooled(SpooledTempFile),
    /// Regular file.
    File(File),
}

impl Backing {
    fn len(&mut self) -> io::Result<u64> {
        match self {
            Self::Memory(cursor) => Ok(cursor.get_ref().len() as u64),
            Self::File(file) => file.metadata().map(|m| m.len()),
            Self::Spooled(spooled) => {
                let current = spooled.stream_position()?;
                let end = spooled.seek(SeekFrom::End(0))?;
                spooled.seek(SeekFrom::Start(current))?;
                Ok(end)
            }
        }
    }
}

impl Read for Backing {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Memory(cursor) => cursor.read(buf),
            Self::Spooled(spooled) => spooled.read(buf),
            Self::File(file) => file.read(buf),
        }
    }
}

impl Write for Backing {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Memory(cursor) => cursor.write(buf),
            Self::Spooled(spooled) => spooled.write(buf),
            Self::File(file) => file.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Memory(cursor) => cursor.flush(),
            Self::Spooled(spooled) => spooled.flush(),
            Self::File(file) => file.flush(),
        }
    }
}

impl Seek for Backing {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            Self::Memory(cursor) => cursor.seek(pos),
            Self::Spooled(spooled) => spooled.seek(pos),
            Self::File(file) => file.seek(pos),
        }
    }
}

/// Concrete leaf stream that owns its store.
///
/// The store is released when the stream is closed or dropped; `detach`
/// hands it to the caller instead.
#[derive(Debug)]
pub struct BackingStream {
    store: Option<Backing>,
    mode: Mode,
    size: Option<u64>,
    metadata: Metadata,
}

impl BackingStream {
    /// Wraps an existing store.
    #[must_use]
    pub fn from_backing(store: Backing, mode: Mode) -> Self {
        Self {
            store: Some(store),
            mode,
            size: None,
            metadata: Metadata::default(),
        }
    }

    /// Creates an empty read-write in-memory stream.
    #[must_use]
    pub fn memory() -> Self {
        Self::from_backing(Backing::Memory(Cursor::new(Vec::new())), Mode::ReadWrite)
    }

    /// Creates an empty read-write temporary stream that stays in memory up
    /// to [`SPOOL_THRESHOLD`] bytes and spills to a temporary file beyond.
    #[must_use]
    pub fn temp() -> Self {
        Self::from_backing(
            Backing::Spooled(SpooledTempFile::new(SPOOL_THRESHOLD)),
            Mode::ReadWrite,
        )
    }

    /// Opens a file.
    ///
    /// `Write` truncates or creates the file, `ReadWrite` creates it if
    /// missing and keeps existing content.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackingStore`] if the file cannot be opened.
    pub fn open(path: impl AsRef<Path>, mode: Mode) -> Result<Self> {
        let mut options = OpenOptions::new();
        match mode {
            Mode::Read => options.read(true),
            Mode::Write => options.write(true).create(true).truncate(true),
            Mode::ReadWrite => options.read(true).write(true).create(true).truncate(false),
        };
        let file = options.open(path.as_ref())?;
        Ok(Self::from_backing(Backing::File(file), mode))
    }

    /// Creates a read-write stream holding `bytes`, positioned at the start.
    #[must_use]
    pub fn from_literal(bytes: impl AsRef<[u8]>) -> Self {
        let bytes = bytes.as_ref();
        let mut stream = Self::from_backing(
            Backing::Memory(Cursor::new(bytes.to_vec())),
            Mode::ReadWrite,
        );
        stream.size = Some(bytes.len() as u64);
        stream
    }

    /// Attaches a descriptor to the stream.
    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Replaces the descriptor.
    pub fn set_metadata(&mut self, metadata: Metadata) {
        self.metadata = metadata;
    }

    /// Returns the access mode.
    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    /// Returns true once the stream was closed or detached.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.store.is_none()
    }

    fn store(&mut self) -> Result<&mut Backing> {
        self.store.as_mut().ok_or(Error::Closed)
    }
}

impl Stream for BackingStream {
    fn read(&mut self, len: usize) -> Result<Vec<u8>> {
        let readable = self.mode.readable();
        let store = self.store()?;
        if !readable {
            return Err(Error::NotReadable);
        }

        // Grows by at most COPY_CHUNK per step; `len` may far exceed the data.
        let mut buf = Vec::new();
        while buf.len() < len {
            let filled = buf.len();
            buf.resize(filled + (len - filled).min(COPY_CHUNK), 0);
            match store.read(&mut buf[filled..]) {
                Ok(0) => {
                    buf.truncate(filled);
                    break;
                }
                Ok(n) => buf.truncate(filled + n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => buf.truncate(filled),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(buf)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let writable = self.mode.writable();
        let store = self.store()?;
        if !writable {
            return Err(Error::NotWritable);
        }

        store.write_all(data)?;
        self.size = None;
        Ok(data.len())
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        Ok(self.store()?.seek(pos)?)
    }

    fn tell(&mut self) -> Result<u64> {
        Ok(self.store()?.stream_position()?)
    }

    fn eof(&mut self) -> Result<bool> {
        let pos = self.tell()?;
        let size = self.size()?.unwrap_or(0);
        Ok(pos >= size)
    }

    fn size(&mut self) -> Result<Option<u64>> {
        if let Some(size) = self.size {
            self.store()?;
            return Ok(Some(size));
        }
        let size = self.store()?.len()?;
        self.size = Some(size);
        Ok(Some(size))
    }

    fn is_readable(&self) -> bool {
        self.mode.readable()
    }

    fn is_writable(&self) -> bool {
        self.mode.writable()
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn close(&mut self) {
        self.store = None;
        self.size = None;
    }

    fn detach(&mut self) -> Option<Backing> {
        self.size = None;
        self.store.take()
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

    #[test]
    fn test_from_literal() {
        let mut stream = BackingStream::from_literal("Hello, World!");
        assert_eq!(stream.tell().unwrap(), 0);
        assert_eq!(stream.size().unwrap(), Some(13));
        assert_eq!(stream.read(5).unwrap(), b"Hello");
        assert!(!stream.eof().unwrap());
        assert_eq!(stream.contents().unwrap(), b", World!");
        assert!(stream.eof().unwrap());
        assert!(stream.read(10).unwrap().is_empty());
    }

    #[test]
    fn test_oversized_read_returns_available() {
        let mut stream = BackingStream::from_literal("abc");
        assert_eq!(stream.read(usize::MAX >> 1).unwrap(), b"abc");
        assert!(stream.eof().unwrap());

        let data = vec![9u8; 3 * COPY_CHUNK + 5];
        let mut stream = BackingStream::from_literal(&data);
        assert_eq!(stream.read(usize::MAX).unwrap(), data);
    }

    #[test]
    fn test_write_invalidates_size() {
        let mut stream = BackingStream::memory();
        assert_eq!(stream.size().unwrap(), Some(0));
        stream.write(b"abc").unwrap();
        assert_eq!(stream.size().unwrap(), Some(3));
        stream.write(b"def").unwrap();
        assert_eq!(stream.size().unwrap(), Some(6));
        stream.rewind().unwrap();
        assert_eq!(stream.contents().unwrap(), b"abcdef");
    }

    #[test]
    fn test_temp_store() {
        let mut stream = BackingStream::temp();
        stream.write(b"spooled bytes").unwrap();
        assert_eq!(stream.size().unwrap(), Some(13));
        assert_eq!(stream.tell().unwrap(), 13);
        stream.rewind().unwrap();
        assert_eq!(stream.read(7).unwrap(), b"spooled");
        assert_eq!(stream.tell().unwrap(), 7);
    }

    #[test]
    fn test_seek_positions() {
        let mut stream = BackingStream::from_literal("0123456789");
        assert_eq!(stream.seek(SeekFrom::Start(4)).unwrap(), 4);
        assert_eq!(stream.read(2).unwrap(), b"45");
        assert_eq!(stream.seek(SeekFrom::End(-1)).unwrap(), 9);
        assert_eq!(stream.read(5).unwrap(), b"9");
    }

    #[test]
    fn test_read_only_rejects_write() {
        let mut stream =
            BackingStream::from_backing(Backing::Memory(Cursor::new(b"ro".to_vec())), Mode::Read);
        assert!(!stream.is_writable());
        assert!(matches!(stream.write(b"x"), Err(Error::NotWritable)));
        assert_eq!(stream.read(2).unwrap(), b"ro");
    }

    #[test]
    fn test_write_only_rejects_read() {
        let mut stream =
            BackingStream::from_backing(Backing::Memory(Cursor::new(Vec::new())), Mode::Write);
        assert!(!stream.is_readable());
        stream.write(b"x").unwrap();
        assert!(matches!(stream.read(1), Err(Error::NotReadable)));
    }

    #[test]
    fn test_closed_fails_everything() {
        let mut stream = BackingStream::from_literal("gone");
        stream.close();
        stream.close();
        assert!(stream.is_closed());
        assert!(matches!(stream.read(1), Err(Error::Closed)));
        assert!(matches!(stream.write(b"x"), Err(Error::Closed)));
        assert!(matches!(stream.tell(), Err(Error::Closed)));
        assert!(matches!(stream.eof(), Err(Error::Closed)));
        assert!(matches!(stream.size(), Err(Error::Closed)));
        assert!(matches!(stream.rewind(), Err(Error::Closed)));
    }

    #[test]
    fn test_detach_hands_over_store() {
        let mut stream = BackingStream::from_literal("owned");
        let store = stream.detach();
        assert!(matches!(store, Some(Backing::Memory(_))));
        assert!(stream.detach().is_none());
        assert!(matches!(stream.read(1), Err(Error::Closed)));

        let mut reopened = BackingStream::from_backing(store.unwrap(), Mode::Read);
        assert_eq!(reopened.contents().unwrap(), b"owned");
    }

    #[test]
    fn test_open_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("part.txt");

        let mut writer = BackingStream::open(&path, Mode::Write).unwrap();
        writer.write(b"file contents").unwrap();
        writer.close();

        let mut reader = BackingStream::open(&path, Mode::Read).unwrap();
        assert_eq!(reader.size().unwrap(), Some(13));
        assert_eq!(reader.contents().unwrap(), b"file contents");
        assert!(reader.eof().unwrap());
    }

    #[test]
    fn test_open_missing_file() {
        let err = BackingStream::open("/nonexistent/mailweave/file", Mode::Read).unwrap_err();
        assert!(matches!(err, Error::BackingStore(_)));
    }
}
