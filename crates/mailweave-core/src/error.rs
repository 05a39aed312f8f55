//! Error types for the core library.

use thiserror::Error;

/// Errors that can occur while composing or sending a message.
#[derive(Debug, Error)]
pub enum Error {
    /// Stream or MIME assembly failed.
    #[error("MIME error: {0}")]
    Mime(#[from] mailweave_mime::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// The message has no `To`, `Cc` or `Bcc` recipient.
    #[error("No recipients were specified")]
    NoRecipients,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
