//! Message settings loaded from JSON.
//!
//! ```json
//! {
//!   "from": { "email": "news@example.com", "name": "Newsletter" },
//!   "subject": "Monthly digest",
//!   "to": [{ "email": "reader@example.com" }],
//!   "body": { "path": "digest.html", "contentType": "text/html" },
//!   "altBody": { "text": "Open the HTML version." },
//!   "attachments": [{ "path": "logo.png", "contentType": "image/png", "disposition": "inline", "id": "logo" }],
//!   "dataChunkSize": 4096
//! }
//! ```
//!
//! Relative paths are resolved against the directory of the settings file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use mailweave_mime::{BackingStream, Disposition, Metadata, Mode};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::transport::{DEFAULT_CHUNK_SIZE, TransportOptions};

/// Mailbox entry of the settings document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressSettings {
    /// Email address. Entries with an empty email are ignored.
    pub email: String,
    /// Display name.
    pub name: String,
}

/// Body content given inline or by file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContentSettings {
    /// Literal content. Takes precedence over `path`.
    pub text: Option<String>,
    /// File holding the content.
    pub path: Option<PathBuf>,
    /// MIME type, `text/plain` when absent.
    pub content_type: Option<String>,
}

/// Attachment entry of the settings document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AttachmentSettings {
    /// File to attach.
    pub path: PathBuf,
    /// MIME type, `text/plain` when absent.
    pub content_type: Option<String>,
    /// `attachment` (default) or `inline`.
    pub disposition: Option<String>,
    /// Advertised file name, the file name of `path` when absent.
    pub filename: Option<String>,
    /// Attachment id, used as `Content-ID` for inline parts.
    pub id: Option<String>,
}

/// Settings document for one message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// `From` header.
    pub from: Option<AddressSettings>,
    /// `Subject` header. Ignored when empty.
    pub subject: Option<String>,
    /// `Priority` header.
    pub priority: Option<i64>,
    /// Host identity used for the Message-ID.
    pub host: Option<String>,
    /// `Reply-To` addresses.
    pub reply_to: Vec<AddressSettings>,
    /// `To` recipients.
    pub to: Vec<AddressSettings>,
    /// `Cc` recipients.
    pub cc: Vec<AddressSettings>,
    /// `Bcc` recipients.
    pub bcc: Vec<AddressSettings>,
    /// Primary body.
    pub body: Option<ContentSettings>,
    /// Alternative body.
    pub alt_body: Option<ContentSettings>,
    /// Attachments, in order.
    pub attachments: Vec<AttachmentSettings>,
    /// Delivery timeout in seconds. Zero means no limit.
    pub timeout: Option<u64>,
    /// Verbose transport logging.
    pub debug: bool,
    /// Proxy for network transports. Ignored when empty.
    pub proxy: Option<String>,
    /// Bytes read from the message per transport write. Ignored when zero.
    pub data_chunk_size: Option<usize>,

    /// Directory relative paths are resolved against.
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

impl Settings {
    /// Parses a settings document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serde`] if the document is not valid.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Loads a settings document from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "loading settings");
        let json = std::fs::read_to_string(path)?;
        let mut settings = Self::from_json(&json)?;
        settings.base_dir = path.parent().map(Path::to_path_buf);
        Ok(settings)
    }

    /// Returns the transport options described by these settings.
    #[must_use]
    pub fn transport(&self) -> TransportOptions {
        TransportOptions {
            timeout: self
                .timeout
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            debug: self.debug,
            proxy: self
                .proxy
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string),
            chunk_size: self
                .data_chunk_size
                .filter(|n| *n > 0)
                .unwrap_or(DEFAULT_CHUNK_SIZE),
        }
    }

    /// Resolves `path` against [`Settings::base_dir`].
    #[must_use]
    pub fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl ContentSettings {
    /// Opens the content as a stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if neither `text` nor `path` is set, or an
    /// error if the file cannot be opened.
    pub fn open(&self, settings: &Settings) -> Result<BackingStream> {
        let stream = match (&self.text, &self.path) {
            (Some(text), _) => BackingStream::from_literal(text),
            (None, Some(path)) => BackingStream::open(settings.resolve(path), Mode::Read)?,
            (None, None) => {
                return Err(Error::Config(
                    "body needs either \"text\" or \"path\"".to_string(),
                ));
            }
        };

        let mut metadata = Metadata::new();
        if let Some(content_type) = &self.content_type {
            metadata = metadata.with_content_type(content_type);
        }
        Ok(stream.with_metadata(metadata))
    }
}

impl AttachmentSettings {
    /// Opens the attachment file with its metadata.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an unknown disposition, or an error if
    /// the file cannot be opened.
    pub fn open(&self, settings: &Settings) -> Result<BackingStream> {
        let mut metadata = Metadata::new();

        if let Some(disposition) = &self.disposition {
            let parsed = Disposition::parse(disposition).ok_or_else(|| {
                Error::Config(format!("unknown attachment disposition: {disposition}"))
            })?;
            metadata = metadata.with_disposition(parsed);
        }
        if let Some(content_type) = &self.content_type {
            metadata = metadata.with_content_type(content_type);
        }
        let filename = self.filename.clone().or_else(|| {
            self.path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
        });
        if let Some(filename) = filename {
            metadata = metadata.with_filename(filename);
        }
        if let Some(id) = &self.id {
            metadata = metadata.with_id(id);
        }

        let stream = BackingStream::open(settings.resolve(&self.path), Mode::Read)?;
        Ok(stream.with_metadata(metadata))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use mailweave_mime::Stream;

    #[test]
    fn test_parse_camel_case() {
        let settings = Settings::from_json(
            r#"{
                "from": {"email": "a@example.com", "name": "A"},
                "subject": "Hello",
                "priority": 1,
                "host": "mx.example.org",
                "replyTo": [{"email": "r@example.com"}],
                "to": [{"email": "b@example.com", "name": "B"}],
                "altBody": {"text": "plain", "contentType": "text/plain"},
                "attachments": [{"path": "x.png", "disposition": "inline", "id": "x"}],
                "timeout": 30,
                "debug": true,
                "proxy": "socks5://localhost:1080",
                "dataChunkSize": 4096
            }"#,
        )
        .unwrap();

        assert_eq!(settings.from.as_ref().unwrap().name, "A");
        assert_eq!(settings.reply_to[0].email, "r@example.com");
        assert_eq!(settings.reply_to[0].name, "");
        assert_eq!(settings.to.len(), 1);
        assert!(settings.cc.is_empty());
        assert_eq!(
            settings.alt_body.as_ref().unwrap().content_type.as_deref(),
            Some("text/plain")
        );
        assert_eq!(settings.attachments[0].id.as_deref(), Some("x"));
        assert_eq!(settings.priority, Some(1));

        let transport = settings.transport();
        assert_eq!(transport.timeout, Some(Duration::from_secs(30)));
        assert!(transport.debug);
        assert_eq!(transport.proxy.as_deref(), Some("socks5://localhost:1080"));
        assert_eq!(transport.chunk_size, 4096);
    }

    #[test]
    fn test_transport_defaults() {
        let settings = Settings::from_json(r#"{"dataChunkSize": 0, "proxy": " ", "timeout": 0}"#)
            .unwrap();
        assert_eq!(settings.transport(), TransportOptions::default());
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(Settings::from_json("{"), Err(Error::Serde(_))));
    }

    #[test]
    fn test_content_from_text() {
        let content = ContentSettings {
            text: Some("hello".to_string()),
            path: None,
            content_type: Some("text/html".to_string()),
        };
        let mut stream = content.open(&Settings::default()).unwrap();
        assert_eq!(stream.metadata().content_type.as_deref(), Some("text/html"));
        assert_eq!(stream.contents().unwrap(), b"hello");
    }

    #[test]
    fn test_content_requires_source() {
        let content = ContentSettings::default();
        assert!(matches!(
            content.open(&Settings::default()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_attachment_relative_to_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("report.csv"), "a,b\n1,2\n").unwrap();
        let settings_path = dir.path().join("settings.json");
        std::fs::write(
            &settings_path,
            r#"{"attachments": [{"path": "report.csv", "contentType": "text/csv"}]}"#,
        )
        .unwrap();

        let settings = Settings::from_file(&settings_path).unwrap();
        let mut stream = settings.attachments[0].open(&settings).unwrap();
        let metadata = stream.metadata().clone();
        assert_eq!(metadata.filename.as_deref(), Some("report.csv"));
        assert_eq!(metadata.content_type.as_deref(), Some("text/csv"));
        assert_eq!(metadata.disposition, None);
        assert_eq!(stream.contents().unwrap(), b"a,b\n1,2\n");
    }

    #[test]
    fn test_attachment_bad_disposition() {
        let attachment = AttachmentSettings {
            path: PathBuf::from("missing.bin"),
            disposition: Some("sideways".to_string()),
            ..AttachmentSettings::default()
        };
        assert!(matches!(
            attachment.open(&Settings::default()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_attachment_missing_file() {
        let attachment = AttachmentSettings {
            path: PathBuf::from("/nonexistent/mailweave/file.bin"),
            ..AttachmentSettings::default()
        };
        assert!(matches!(
            attachment.open(&Settings::default()),
            Err(Error::Mime(_))
        ));
    }
}
