//! # mailweave-core
//!
//! Message composition on top of `mailweave-mime`.
//!
//! This crate provides:
//! - [`Composer`], which owns the headers and body of one message
//! - [`Settings`], a JSON document describing a message
//! - [`Transport`], the seam to delivery, with [`WriterTransport`] for
//!   raw `.eml` output

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod composer;
mod error;
pub mod settings;
pub mod transport;

pub use composer::Composer;
pub use error::{Error, Result};
pub use settings::{AddressSettings, AttachmentSettings, ContentSettings, Settings};
pub use transport::{DEFAULT_CHUNK_SIZE, Envelope, Transport, TransportOptions, WriterTransport};
