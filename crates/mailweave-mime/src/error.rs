//! Error types for stream and MIME operations.

use std::io;

/// Result type alias for stream and MIME operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Stream and MIME error types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Operation on a stream that has been closed or detached.
    #[error("The stream is closed")]
    Closed,

    /// Read attempted on a stream without the read capability.
    #[error("Cannot read from a non-readable stream")]
    NotReadable,

    /// Write attempted on a stream without the write capability.
    #[error("Cannot write to a non-writable stream")]
    NotWritable,

    /// Seek attempted on a stream without the seek capability.
    #[error("Stream is not seekable")]
    NotSeekable,

    /// A member of a composite stream failed to rewind.
    #[error("Unable to seek stream {index} of the AppendStream: {source}")]
    Seek {
        /// Position of the failing member in the composite.
        index: usize,
        /// Underlying failure.
        #[source]
        source: Box<Error>,
    },

    /// Seek origin or offset the stream cannot honour.
    #[error("Invalid seek: {0}")]
    InvalidSeek(String),

    /// Underlying read, write or stat failure.
    #[error("Backing store error: {0}")]
    BackingStore(#[from] io::Error),
}

impl Error {
    /// Wraps a member failure with the member's index.
    #[must_use]
    pub fn seek(index: usize, source: Self) -> Self {
        Self::Seek {
            index,
            source: Box::new(source),
        }
    }

    /// Returns true for capability violations.
    #[must_use]
    pub const fn is_capability(&self) -> bool {
        matches!(self, Self::NotReadable | Self::NotWritable | Self::NotSeekable)
    }
}
