//! Message body assembly.
//!
//! A [`Body`] holds the primary content, an optional alternative rendering
//! and the attachments of a message. When the message is built it picks one
//! of three [`MimeShape`]s and turns its parts into a single
//! [`AppendStream`], base64 encoding and line wrapping every part on the
//! way. Part contents are still read lazily by whoever consumes the stream.

use crate::content_type::{ContentType, DEFAULT_CONTENT_TYPE};
use crate::encoding::secure;
use crate::error::Result;
use crate::stream::{AppendStream, Base64Encode, BackingStream, EmptyStream, LineChunk, Stream};
use crate::token::unique_token;

/// Text of the alternative part when attachments are present and no
/// alternative body was set.
pub const MULTIPART_PLACEHOLDER: &str = "This is a multipart message";

/// Layout of the generated body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MimeShape {
    /// A single base64 encoded part.
    Simple,
    /// `multipart/alternative`: the alternative body, then the primary one.
    Alternative,
    /// `multipart/mixed`, or `multipart/related` when `inline` is set.
    Attachments {
        /// At least one attachment is displayed inline.
        inline: bool,
    },
}

/// Primary content, alternative content and attachments of a message.
#[derive(Debug)]
pub struct Body {
    body: Box<dyn Stream>,
    alt_body: Option<Box<dyn Stream>>,
    attachments: Vec<(String, Box<dyn Stream>)>,
    boundary: String,
    close_delimiters: bool,
}

impl Default for Body {
    fn default() -> Self {
        Self::new()
    }
}

impl Body {
    /// Creates an empty body.
    #[must_use]
    pub fn new() -> Self {
        Self {
            body: Box::new(EmptyStream::new()),
            alt_body: None,
            attachments: Vec::new(),
            boundary: unique_token(),
            close_delimiters: false,
        }
    }

    /// Replaces the primary content.
    pub fn set_body(&mut self, stream: impl Stream + 'static) {
        self.body = Box::new(stream);
    }

    /// Sets the alternative content, usually a plain text rendering of an
    /// HTML body.
    pub fn set_alt_body(&mut self, stream: impl Stream + 'static) {
        self.alt_body = Some(Box::new(stream));
    }

    /// Returns the primary content.
    #[must_use]
    pub fn body(&self) -> &dyn Stream {
        self.body.as_ref()
    }

    /// Returns the alternative content, if set.
    #[must_use]
    pub fn alt_body(&self) -> Option<&dyn Stream> {
        self.alt_body.as_deref()
    }

    /// Returns true if an alternative body is set.
    #[must_use]
    pub const fn has_alt_body(&self) -> bool {
        self.alt_body.is_some()
    }

    /// Adds an attachment and returns its id.
    ///
    /// The id comes from the stream's metadata when it carries one,
    /// otherwise a fresh token not used by any other attachment is
    /// generated. Adding a stream whose id is already taken replaces the
    /// earlier attachment in place.
    pub fn add_attachment(&mut self, stream: impl Stream + 'static) -> String {
        let given = stream
            .metadata()
            .id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string);

        let id = given.unwrap_or_else(|| loop {
            let candidate = unique_token();
            if self.position(&candidate).is_none() {
                break candidate;
            }
        });

        let stream: Box<dyn Stream> = Box::new(stream);
        match self.position(&id) {
            Some(idx) => {
                tracing::debug!(id = %id, "replacing attachment with the same id");
                self.attachments[idx].1 = stream;
            }
            None => {
                tracing::trace!(id = %id, "attachment added");
                self.attachments.push((id.clone(), stream));
            }
        }
        id
    }

    /// Removes the attachment with the given id. Unknown ids are ignored.
    ///
    /// Returns true if an attachment was removed.
    pub fn remove_attachment(&mut self, id: &str) -> bool {
        match self.position(id) {
            Some(idx) => {
                self.attachments.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Returns true if at least one attachment is present.
    #[must_use]
    pub fn has_attachments(&self) -> bool {
        !self.attachments.is_empty()
    }

    /// Returns true if at least one attachment has an inline disposition.
    #[must_use]
    pub fn has_inline_attachments(&self) -> bool {
        self.attachments
            .iter()
            .any(|(_, stream)| stream.metadata().is_inline())
    }

    /// Returns the attachment ids in insertion order.
    pub fn attachment_ids(&self) -> impl Iterator<Item = &str> {
        self.attachments.iter().map(|(id, _)| id.as_str())
    }

    /// Returns the outer boundary token.
    #[must_use]
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Sets the outer boundary token.
    pub fn set_boundary(&mut self, boundary: impl Into<String>) {
        self.boundary = boundary.into();
    }

    /// Replaces the outer boundary with a fresh token and returns it.
    pub fn refresh_boundary(&mut self) -> &str {
        self.boundary = unique_token();
        &self.boundary
    }

    /// Controls whether `--boundary--` close delimiters end each multipart
    /// section. Off by default.
    pub const fn set_close_delimiters(&mut self, enabled: bool) {
        self.close_delimiters = enabled;
    }

    /// Returns the shape the body will be generated in.
    #[must_use]
    pub fn shape(&self) -> MimeShape {
        if self.has_attachments() {
            MimeShape::Attachments {
                inline: self.has_inline_attachments(),
            }
        } else if self.has_alt_body() {
            MimeShape::Alternative
        } else {
            MimeShape::Simple
        }
    }

    /// Returns the value of the top-level `Content-Type` header matching
    /// the current shape and boundary.
    #[must_use]
    pub fn content_type(&self) -> String {
        match self.shape() {
            MimeShape::Simple => part_content_type(self.body.as_ref()),
            MimeShape::Alternative => {
                ContentType::multipart_alternative(self.boundary.as_str()).to_string()
            }
            MimeShape::Attachments { inline: true } => {
                ContentType::multipart_related(self.boundary.as_str()).to_string()
            }
            MimeShape::Attachments { inline: false } => {
                ContentType::multipart_mixed(self.boundary.as_str()).to_string()
            }
        }
    }

    /// Consumes the body and returns its wire form.
    ///
    /// The result starts with the newline that separates it from the
    /// message headers.
    ///
    /// # Errors
    ///
    /// Returns an error if one of the parts is not readable.
    pub fn into_stream(self) -> Result<AppendStream> {
        let shape = self.shape();
        tracing::debug!(
            ?shape,
            attachments = self.attachments.len(),
            "assembling body"
        );

        let mut out = AppendStream::default();
        match shape {
            MimeShape::Simple => {
                out.add_stream(literal("\n"))?;
                out.add_stream(encoded(self.body))?;
            }
            MimeShape::Alternative => {
                if let Some(alt) = self.alt_body {
                    out.add_stream(part(&self.boundary, alt)?)?;
                }
                out.add_stream(part(&self.boundary, self.body)?)?;
                if self.close_delimiters {
                    out.add_stream(close(&self.boundary))?;
                }
            }
            MimeShape::Attachments { .. } => {
                let inner = unique_token();
                out.add_stream(literal(format!(
                    "\n\n--{}\nContent-Type: {}\nMime-Version: 1.0\n\n",
                    self.boundary,
                    ContentType::multipart_alternative(inner.as_str())
                )))?;
                let alt = self
                    .alt_body
                    .unwrap_or_else(|| Box::new(BackingStream::from_literal(MULTIPART_PLACEHOLDER)));
                out.add_stream(part(&inner, alt)?)?;
                out.add_stream(part(&inner, self.body)?)?;
                if self.close_delimiters {
                    out.add_stream(close(&inner))?;
                }
                for (id, attachment) in self.attachments {
                    out.add_stream(attachment_part(&self.boundary, &id, attachment)?)?;
                }
                if self.close_delimiters {
                    out.add_stream(close(&self.boundary))?;
                }
            }
        }
        Ok(out)
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.attachments.iter().position(|(existing, _)| existing == id)
    }
}

fn literal(text: impl AsRef<[u8]>) -> BackingStream {
    BackingStream::from_literal(text)
}

fn close(boundary: &str) -> BackingStream {
    literal(format!("\n\n--{boundary}--\n"))
}

fn encoded(stream: Box<dyn Stream>) -> LineChunk {
    LineChunk::new(Base64Encode::new(stream))
}

fn part_content_type(stream: &dyn Stream) -> String {
    stream
        .metadata()
        .content_type
        .as_deref()
        .map(secure)
        .filter(|ct| !ct.is_empty())
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string())
}

/// One body part of a multipart section.
fn part(boundary: &str, stream: Box<dyn Stream>) -> Result<AppendStream> {
    let header = format!(
        "\n\n--{boundary}\nContent-Transfer-Encoding: base64\nContent-Type: {}\nMime-Version: 1.0\n\n",
        part_content_type(stream.as_ref())
    );
    let mut out = AppendStream::default();
    out.add_stream(literal(header))?;
    out.add_stream(encoded(stream))?;
    Ok(out)
}

fn attachment_part(boundary: &str, id: &str, stream: Box<dyn Stream>) -> Result<AppendStream> {
    let metadata = stream.metadata();
    let disposition = metadata.disposition.unwrap_or_default();
    let filename = metadata
        .filename
        .as_deref()
        .map(|name| secure(name).replace('"', ""))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| format!("{}.bin", unique_token()));

    let mut header = format!(
        "\n\n--{boundary}\nContent-Transfer-Encoding: base64\nContent-Type: {}\n",
        part_content_type(stream.as_ref())
    );
    if metadata.is_inline() {
        header.push_str(&format!("Content-ID: <{id}>\n"));
    }
    header.push_str(&format!(
        "Content-Disposition: {disposition}; filename=\"{filename}\"\n\n"
    ));

    let mut out = AppendStream::default();
    out.add_stream(literal(header))?;
    out.add_stream(encoded(stream))?;
    Ok(out)
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
    use crate::encoding::encode_base64;
    use crate::stream::testing::{FailOnce, read_through_failures};
    use crate::stream::{Disposition, Metadata};
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    fn text(data: &str, content_type: &str) -> BackingStream {
        BackingStream::from_literal(data)
            .with_metadata(Metadata::new().with_content_type(content_type))
    }

    fn attachment(data: &str, id: &str, disposition: Disposition) -> BackingStream {
        BackingStream::from_literal(data).with_metadata(
            Metadata::new()
                .with_content_type("image/png")
                .with_disposition(disposition)
                .with_filename("logo.png")
                .with_id(id),
        )
    }

    fn render(body: Body) -> String {
        let mut stream = body.into_stream().unwrap();
        String::from_utf8(stream.contents().unwrap()).unwrap()
    }

    fn part_header(boundary: &str, content_type: &str) -> String {
        format!(
            "\n\n--{boundary}\nContent-Transfer-Encoding: base64\nContent-Type: {content_type}\nMime-Version: 1.0\n\n"
        )
    }

    #[test]
    fn test_empty_body() {
        let body = Body::new();
        assert_eq!(body.shape(), MimeShape::Simple);
        assert_eq!(body.content_type(), "text/plain");
        assert_eq!(render(body), "\n");
    }

    #[test]
    fn test_simple_shape() {
        let mut body = Body::new();
        body.set_body(text("hello", "text/html; charset=utf-8"));
        assert_eq!(body.shape(), MimeShape::Simple);
        assert_eq!(body.content_type(), "text/html; charset=utf-8");
        assert_eq!(render(body), "\naGVsbG8=\n");
    }

    #[test]
    fn test_simple_shape_wraps_lines() {
        let data = "x".repeat(120);
        let mut body = Body::new();
        body.set_body(BackingStream::from_literal(&data));
        let out = render(body);
        let encoded = encode_base64(data.as_bytes());
        assert_eq!(encoded.len(), 160);
        assert_eq!(
            out,
            format!(
                "\n{}\n{}\n{}\n",
                &encoded[..75],
                &encoded[75..150],
                &encoded[150..]
            )
        );
    }

    #[test]
    fn test_simple_shape_survives_body_failure() {
        let data: Vec<u8> = (0..6000u32).map(|i| (i % 253) as u8).collect();
        let mut expected = Body::new();
        expected.set_body(BackingStream::from_literal(&data));
        let expected = render(expected);

        let mut body = Body::new();
        body.set_body(FailOnce::new(&data, 4096).with_step(1000));
        let mut stream = body.into_stream().unwrap();
        let (out, failures) = read_through_failures(&mut stream, 100);
        assert_eq!(failures, 1);
        assert_eq!(String::from_utf8(out).unwrap(), expected);
    }

    #[test]
    fn test_attachment_survives_read_failure() {
        let payload = vec![0xA5u8; 5000];
        let mut body = Body::new();
        body.set_body(BackingStream::from_literal("see attached"));
        body.add_attachment(
            FailOnce::new(&payload, 3001).with_metadata(
                Metadata::new()
                    .with_content_type("application/octet-stream")
                    .with_filename("blob.bin"),
            ),
        );
        body.set_boundary("b1");
        body.set_close_delimiters(true);

        let mut stream = body.into_stream().unwrap();
        let (out, failures) = read_through_failures(&mut stream, 333);
        assert_eq!(failures, 1);

        let out = String::from_utf8(out).unwrap();
        let section = out
            .split("filename=\"blob.bin\"\n\n")
            .nth(1)
            .unwrap()
            .strip_suffix("\n\n--b1--\n")
            .unwrap();
        assert!(section.lines().all(|line| line.len() <= 75));
        let joined: String = section.lines().collect();
        assert_eq!(STANDARD.decode(joined).unwrap(), payload);
    }

    #[test]
    fn test_alternative_shape() {
        let mut body = Body::new();
        body.set_body(text("<b>hi</b>", "text/html"));
        body.set_alt_body(BackingStream::from_literal("hi"));
        body.set_boundary("b1");

        assert_eq!(body.shape(), MimeShape::Alternative);
        assert_eq!(body.content_type(), "multipart/alternative; boundary=b1");

        let expected = format!(
            "{}aGk=\n{}PGI+aGk8L2I+\n",
            part_header("b1", "text/plain"),
            part_header("b1", "text/html")
        );
        assert_eq!(render(body), expected);
    }

    #[test]
    fn test_alternative_with_close_delimiter() {
        let mut body = Body::new();
        body.set_body(BackingStream::from_literal("a"));
        body.set_alt_body(BackingStream::from_literal("b"));
        body.set_boundary("b1");
        body.set_close_delimiters(true);
        assert!(render(body).ends_with("\n\n--b1--\n"));
    }

    #[test]
    fn test_attachments_shape() {
        let mut body = Body::new();
        body.set_body(text("<b>hi</b>", "text/html"));
        body.set_boundary("outer");
        let id = body.add_attachment(attachment("data", "file-1", Disposition::Attachment));
        assert_eq!(id, "file-1");

        assert_eq!(body.shape(), MimeShape::Attachments { inline: false });
        assert_eq!(body.content_type(), "multipart/mixed; boundary=outer");

        let out = render(body);
        assert!(out.starts_with("\n\n--outer\nContent-Type: multipart/alternative; boundary="));

        let inner = out
            .lines()
            .nth(3)
            .and_then(|line| line.strip_prefix("Content-Type: multipart/alternative; boundary="))
            .unwrap()
            .to_string();
        assert_ne!(inner, "outer");

        let placeholder = encode_base64(MULTIPART_PLACEHOLDER.as_bytes());
        let expected = format!(
            "\n\n--outer\nContent-Type: multipart/alternative; boundary={inner}\nMime-Version: 1.0\n\n\
             {}{placeholder}\n{}PGI+aGk8L2I+\n\
             \n\n--outer\nContent-Transfer-Encoding: base64\nContent-Type: image/png\n\
             Content-Disposition: attachment; filename=\"logo.png\"\n\nZGF0YQ==\n",
            part_header(&inner, "text/plain"),
            part_header(&inner, "text/html"),
        );
        assert_eq!(out, expected);
    }

    #[test]
    fn test_inline_attachment_is_related() {
        let mut body = Body::new();
        body.set_boundary("outer");
        body.set_alt_body(BackingStream::from_literal("alt"));
        body.add_attachment(attachment("data", "file-1", Disposition::Attachment));
        body.add_attachment(attachment("logo", "logo-1", Disposition::Inline));

        assert_eq!(body.shape(), MimeShape::Attachments { inline: true });
        assert_eq!(body.content_type(), "multipart/related; boundary=outer");

        let out = render(body);
        assert!(out.contains(&encode_base64(b"alt")));
        assert!(!out.contains(&encode_base64(MULTIPART_PLACEHOLDER.as_bytes())));
        assert!(out.contains(
            "Content-Type: image/png\nContent-ID: <logo-1>\nContent-Disposition: inline; filename=\"logo.png\"\n\n"
        ));
        assert_eq!(out.matches("Content-ID:").count(), 1);
        let first = out.find(&encode_base64(b"data")).unwrap();
        let second = out.find(&encode_base64(b"logo")).unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_attachment_defaults() {
        let mut body = Body::new();
        let id = body.add_attachment(BackingStream::from_literal("raw"));
        assert_eq!(id.len(), 32);

        let out = render(body);
        assert!(out.contains("Content-Type: text/plain\nContent-Disposition: attachment; filename=\""));
        assert!(out.contains(".bin\"\n\n"));
    }

    #[test]
    fn test_attachment_close_delimiters() {
        let mut body = Body::new();
        body.set_boundary("outer");
        body.set_close_delimiters(true);
        body.add_attachment(attachment("data", "a", Disposition::Attachment));
        let out = render(body);
        assert!(out.ends_with("ZGF0YQ==\n\n\n--outer--\n"));
        assert_eq!(out.matches("--\n").count(), 2);
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let mut body = Body::new();
        let a = body.add_attachment(BackingStream::from_literal("a"));
        let b = body.add_attachment(BackingStream::from_literal("b"));
        assert_ne!(a, b);
        assert_eq!(body.attachment_ids().collect::<Vec<_>>(), [a.as_str(), b.as_str()]);
    }

    #[test]
    fn test_same_id_replaces_in_place() {
        let mut body = Body::new();
        body.add_attachment(attachment("one", "x", Disposition::Attachment));
        body.add_attachment(attachment("two", "y", Disposition::Attachment));
        body.add_attachment(attachment("three", "x", Disposition::Inline));

        assert_eq!(body.attachment_ids().collect::<Vec<_>>(), ["x", "y"]);
        assert!(body.has_inline_attachments());
        let out = render(body);
        assert!(!out.contains(&encode_base64(b"one")));
        assert!(out.find(&encode_base64(b"three")).unwrap() < out.find(&encode_base64(b"two")).unwrap());
    }

    #[test]
    fn test_remove_attachment() {
        let mut body = Body::new();
        let id = body.add_attachment(BackingStream::from_literal("a"));
        assert!(!body.remove_attachment("missing"));
        assert!(body.has_attachments());
        assert!(body.remove_attachment(&id));
        assert!(!body.has_attachments());
        assert!(!body.remove_attachment(&id));
        assert_eq!(body.shape(), MimeShape::Simple);
    }

    #[test]
    fn test_refresh_boundary() {
        let mut body = Body::new();
        let first = body.boundary().to_string();
        let second = body.refresh_boundary().to_string();
        assert_ne!(first, second);
        assert_eq!(body.boundary(), second);
    }

    #[test]
    fn test_body_stream_rewinds() {
        let mut body = Body::new();
        body.set_body(BackingStream::from_literal("rewind me"));
        body.add_attachment(BackingStream::from_literal("file"));
        let mut stream = body.into_stream().unwrap();
        assert!(stream.is_seekable());
        let first = stream.contents().unwrap();
        stream.rewind().unwrap();
        assert_eq!(stream.contents().unwrap(), first);
        assert_eq!(stream.size().unwrap(), Some(first.len() as u64));
    }
}
