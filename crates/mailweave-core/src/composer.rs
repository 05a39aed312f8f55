//! Message composition.
//!
//! [`Composer`] owns the header table and the body of one message, exposes
//! the setters a mailer needs, and turns both into the final stream.

use mailweave_mime::{AppendStream, Body, HeaderSet, MimeShape, Stream};

use crate::error::{Error, Result};
use crate::settings::{AddressSettings, Settings};
use crate::transport::{Envelope, Transport};

/// Builder for one outgoing message.
#[derive(Debug)]
pub struct Composer {
    sender: String,
    headers: HeaderSet,
    body: Body,
}

impl Composer {
    /// Starts a message sent by `sender_email`.
    ///
    /// The address is both the envelope sender and the initial `From`.
    #[must_use]
    pub fn new(sender_email: &str, sender_name: &str) -> Self {
        Self {
            sender: sender_email.trim().to_string(),
            headers: HeaderSet::new(sender_email, sender_name),
            body: Body::new(),
        }
    }

    /// Returns the header table.
    #[must_use]
    pub const fn headers(&self) -> &HeaderSet {
        &self.headers
    }

    /// Returns the body.
    #[must_use]
    pub const fn body(&self) -> &Body {
        &self.body
    }

    /// Sets a header. Returns false for `To`, `Cc` and `Bcc`.
    pub fn set_header(&mut self, name: &str, value: &str) -> bool {
        self.headers.set_header(name, value)
    }

    /// Sets the subject.
    pub fn set_subject(&mut self, subject: &str) -> bool {
        self.set_header("Subject", subject)
    }

    /// Sets the `Priority` header.
    pub fn set_priority(&mut self, priority: i64) -> bool {
        self.set_header("Priority", &priority.to_string())
    }

    /// Sets the `From` header. The envelope sender is unchanged.
    pub fn set_from(&mut self, email: &str, name: &str) -> bool {
        self.headers.set_from(email, name)
    }

    /// Adds a `Reply-To` address.
    pub fn add_reply_to(&mut self, email: &str, name: &str) -> bool {
        self.headers.add_reply_to(email, name)
    }

    /// Adds a `To` recipient.
    pub fn add_to(&mut self, email: &str, name: &str) -> bool {
        self.headers.add_to(email, name)
    }

    /// Adds a `Cc` recipient.
    pub fn add_cc(&mut self, email: &str, name: &str) -> bool {
        self.headers.add_cc(email, name)
    }

    /// Adds a `Bcc` recipient.
    pub fn add_bcc(&mut self, email: &str, name: &str) -> bool {
        self.headers.add_bcc(email, name)
    }

    /// Sets the host identity and regenerates the Message-ID.
    pub fn set_host(&mut self, host: &str) {
        self.headers.set_host(host);
    }

    /// Replaces the primary body.
    pub fn set_body(&mut self, stream: impl Stream + 'static) {
        self.body.set_body(stream);
    }

    /// Sets the alternative body.
    pub fn set_alt_body(&mut self, stream: impl Stream + 'static) {
        self.body.set_alt_body(stream);
    }

    /// Adds an attachment and returns its id.
    pub fn add_attachment(&mut self, stream: impl Stream + 'static) -> String {
        self.body.add_attachment(stream)
    }

    /// Removes an attachment. Unknown ids are ignored.
    pub fn remove_attachment(&mut self, id: &str) -> bool {
        let removed = self.body.remove_attachment(id);
        if removed {
            tracing::debug!(id, "attachment removed");
        }
        removed
    }

    /// Ends multipart sections with close delimiters.
    pub fn set_close_delimiters(&mut self, enabled: bool) {
        self.body.set_close_delimiters(enabled);
    }

    /// Applies a settings document.
    ///
    /// Empty subjects and address entries without an email are skipped.
    /// Body and attachment files are opened here but read only when the
    /// message is sent.
    ///
    /// # Errors
    ///
    /// Returns an error if a body or attachment cannot be opened.
    pub fn apply_settings(&mut self, settings: &Settings) -> Result<()> {
        if let Some(from) = settings.from.as_ref().filter(|a| !a.email.trim().is_empty()) {
            self.set_from(&from.email, &from.name);
        }
        if let Some(subject) = settings.subject.as_deref().filter(|s| !s.is_empty()) {
            self.set_subject(subject);
        }
        if let Some(body) = &settings.body {
            self.set_body(body.open(settings)?);
        }
        if let Some(alt_body) = &settings.alt_body {
            self.set_alt_body(alt_body.open(settings)?);
        }
        if let Some(priority) = settings.priority {
            self.set_priority(priority);
        }
        if let Some(host) = &settings.host {
            self.set_host(host);
        }

        self.add_all(&settings.reply_to, Self::add_reply_to);
        self.add_all(&settings.to, Self::add_to);
        self.add_all(&settings.cc, Self::add_cc);
        self.add_all(&settings.bcc, Self::add_bcc);

        for attachment in &settings.attachments {
            self.add_attachment(attachment.open(settings)?);
        }
        Ok(())
    }

    fn add_all(&mut self, entries: &[AddressSettings], add: fn(&mut Self, &str, &str) -> bool) {
        for entry in entries.iter().filter(|a| !a.email.trim().is_empty()) {
            add(self, &entry.email, &entry.name);
        }
    }

    /// Returns the envelope sender and every `To`, `Cc` and `Bcc` address.
    #[must_use]
    pub fn envelope(&self) -> Envelope {
        Envelope {
            from: self.sender.clone(),
            recipients: self
                .headers
                .recipients()
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }

    /// Finishes the message and returns its wire form.
    ///
    /// Sets `Mime-Version` and the `Content-Type` of the chosen shape; a
    /// multipart shape gets a fresh boundary.
    ///
    /// # Errors
    ///
    /// Returns an error if a part is not readable.
    pub fn build(mut self) -> Result<AppendStream> {
        let shape = self.body.shape();
        if shape == MimeShape::Simple {
            self.headers
                .set_header("Content-Transfer-Encoding", "base64");
        } else {
            self.body.refresh_boundary();
        }
        self.headers
            .set_header("Content-Type", &self.body.content_type());
        self.headers.set_header("Mime-Version", "1.0");

        tracing::debug!(?shape, boundary = self.body.boundary(), "building message");

        let mut out = AppendStream::default();
        out.add_stream(self.headers.to_stream())?;
        out.add_stream(self.body.into_stream()?)?;
        Ok(out)
    }

    /// Builds the message and hands it to `transport`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoRecipients`] if no recipient was added, or the
    /// error of building or delivering the message.
    pub fn send(self, transport: &mut impl Transport) -> Result<()> {
        let envelope = self.envelope();
        if envelope.recipients.is_empty() {
            return Err(Error::NoRecipients);
        }

        let mut data = self.build()?;
        let result = transport.send(&envelope, &mut data);
        data.close();
        result
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::transport::WriterTransport;
    use mailweave_mime::{BackingStream, Disposition, HeaderValue, Metadata};

    fn render(composer: Composer) -> String {
        let mut stream = composer.build().unwrap();
        String::from_utf8(stream.contents().unwrap()).unwrap()
    }

    fn header(composer: &Composer, name: &str) -> Option<String> {
        composer.headers().get(name).map(HeaderValue::render)
    }

    #[test]
    fn test_simple_message() {
        let mut composer = Composer::new("a@example.com", "Alice");
        composer.add_to("b@example.com", "");
        composer.set_subject("Hi");
        composer.set_body(BackingStream::from_literal("hello"));

        let out = render(composer);
        assert!(out.contains("\nFrom: Alice <a@example.com>\n"));
        assert!(out.contains("\nSubject: Hi\n"));
        assert!(out.ends_with(
            "Content-Transfer-Encoding: base64\nContent-Type: text/plain\nMime-Version: 1.0\n\naGVsbG8=\n"
        ));
    }

    #[test]
    fn test_alternative_message() {
        let mut composer = Composer::new("a@example.com", "");
        composer.set_body(
            BackingStream::from_literal("<b>hi</b>")
                .with_metadata(Metadata::new().with_content_type("text/html")),
        );
        composer.set_alt_body(BackingStream::from_literal("hi"));

        let out = render(composer);
        let (head, body) = out.split_once("\n\n").unwrap();
        let boundary = head
            .lines()
            .find_map(|l| l.strip_prefix("Content-Type: multipart/alternative; boundary="))
            .unwrap();
        assert!(body.starts_with(&format!("\n--{boundary}\n")));
        assert!(!head.contains("Content-Transfer-Encoding"));
    }

    #[test]
    fn test_related_message() {
        let mut composer = Composer::new("a@example.com", "");
        composer.add_attachment(BackingStream::from_literal("img").with_metadata(
            Metadata::new()
                .with_disposition(Disposition::Inline)
                .with_id("logo"),
        ));
        let out = render(composer);
        assert!(out.contains("\nContent-Type: multipart/related; boundary="));
        assert!(out.contains("Content-ID: <logo>\n"));
    }

    #[test]
    fn test_envelope_includes_bcc() {
        let mut composer = Composer::new(" sender@example.com ", "");
        composer.set_from("other@example.com", "Other");
        composer.add_to("to@example.com", "");
        composer.add_cc("cc@example.com", "");
        composer.add_bcc("bcc@example.com", "");

        let envelope = composer.envelope();
        assert_eq!(envelope.from, "sender@example.com");
        assert_eq!(
            envelope.recipients,
            ["to@example.com", "cc@example.com", "bcc@example.com"]
        );
    }

    #[test]
    fn test_send_without_recipients() {
        let composer = Composer::new("a@example.com", "");
        let mut transport = WriterTransport::new(Vec::new());
        assert!(matches!(
            composer.send(&mut transport),
            Err(Error::NoRecipients)
        ));
        assert!(transport.get_ref().is_empty());
    }

    #[test]
    fn test_send_writes_message() {
        let mut composer = Composer::new("a@example.com", "");
        composer.add_to("b@example.com", "");
        composer.set_body(BackingStream::from_literal("payload"));
        let mut transport = WriterTransport::new(Vec::new()).with_chunk_size(3);
        composer.send(&mut transport).unwrap();

        let out = String::from_utf8(transport.into_inner()).unwrap();
        assert!(out.starts_with("Date: "));
        assert!(out.ends_with("\n\ncGF5bG9hZA==\n"));
    }

    #[test]
    fn test_apply_settings() {
        let settings = Settings::from_json(
            r#"{
                "from": {"email": "news@example.com", "name": "News"},
                "subject": "",
                "priority": 3,
                "host": "mx.example.org",
                "to": [{"email": "one@example.com"}, {"email": ""}, {"email": "two@example.com", "name": "Two"}],
                "bcc": [{"email": "hidden@example.com"}],
                "body": {"text": "<p>hi</p>", "contentType": "text/html"}
            }"#,
        )
        .unwrap();

        let mut composer = Composer::new("sender@example.com", "");
        composer.apply_settings(&settings).unwrap();

        assert_eq!(header(&composer, "From").as_deref(), Some("News <news@example.com>"));
        assert_eq!(header(&composer, "Subject"), None);
        assert_eq!(header(&composer, "Priority").as_deref(), Some("3"));
        assert!(header(&composer, "Message-ID").unwrap().ends_with("@mx.example.org>"));
        assert_eq!(
            header(&composer, "To").as_deref(),
            Some("one@example.com, Two <two@example.com>")
        );
        assert_eq!(
            composer.envelope().recipients,
            ["one@example.com", "two@example.com", "hidden@example.com"]
        );
        assert_eq!(composer.body().content_type(), "text/html");
    }

    #[test]
    fn test_remove_attachment() {
        let mut composer = Composer::new("a@example.com", "");
        let id = composer.add_attachment(BackingStream::from_literal("x"));
        assert!(!composer.remove_attachment("nope"));
        assert!(composer.remove_attachment(&id));
        assert_eq!(composer.body().shape(), MimeShape::Simple);
    }
}
