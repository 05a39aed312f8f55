//! # mailweave-mime
//!
//! Lazy MIME message assembly over composable byte streams.
//!
//! ## Features
//!
//! - **Streams**: file, memory and spooled temp-file backed byte sources
//! - **Transforms**: base64 encoding and fixed-width line wrapping
//! - **Concatenation**: [`AppendStream`] joins any number of streams
//! - **Headers**: ordered header table with RFC 2047 value encoding
//! - **Bodies**: simple, `multipart/alternative`, `multipart/mixed` and
//!   `multipart/related` layouts
//!
//! Attachment contents are read only when the final stream is read, so a
//! large file passes through to the transport without being loaded first.
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailweave_mime::{Body, HeaderSet, AppendStream, BackingStream, Mode, Stream};
//!
//! let mut headers = HeaderSet::new("sender@example.com", "Sender");
//! headers.add_to("recipient@example.com", "");
//! headers.set_header("Subject", "Report");
//!
//! let mut body = Body::new();
//! body.set_body(BackingStream::from_literal("See attached."));
//! body.add_attachment(BackingStream::open("report.pdf", Mode::Read)?);
//! headers.set_header("Content-Type", &body.content_type());
//!
//! let mut message = AppendStream::default();
//! message.add_stream(headers.to_stream())?;
//! message.add_stream(body.into_stream()?)?;
//!
//! while !message.eof()? {
//!     let chunk = message.read(1024)?;
//!     // hand chunk to the transport
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod address;
mod body;
mod content_type;
mod error;
mod header;

pub mod encoding;
pub mod stream;
pub mod token;

pub use address::Address;
pub use body::{Body, MULTIPART_PLACEHOLDER, MimeShape};
pub use content_type::{ContentType, DEFAULT_CONTENT_TYPE};
pub use error::{Error, Result};
pub use header::{DEFAULT_HOST, HeaderSet, HeaderValue, MAILER};
pub use stream::{
    AppendStream, Backing, BackingStream, Base64Encode, Disposition, EmptyStream, LineChunk,
    Metadata, Mode, Stream, StreamReader,
};
