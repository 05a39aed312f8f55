//! Message header table.

use crate::address::Address;
use crate::encoding::{encode_header_value, secure};
use crate::stream::BackingStream;
use crate::token::unique_token;
use std::fmt;

/// Host identity used in Message-IDs when none is configured.
pub const DEFAULT_HOST: &str = "localhost.localdomain";

/// Value of the `X-Mailer` header.
pub const MAILER: &str = concat!("mailweave ", env!("CARGO_PKG_VERSION"));

/// Address headers that only the dedicated `add_*` methods may change.
const PROTECTED: [&str; 3] = ["to", "cc", "bcc"];

/// Value stored for a header name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    /// Plain value.
    Text(String),
    /// Address list, unique by email, in insertion order.
    Addresses(Vec<Address>),
}

impl HeaderValue {
    /// Returns the value as it appears before encoding.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Addresses(list) => list
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    /// Returns true if nothing would be emitted for this value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::Addresses(list) => list.is_empty(),
        }
    }
}

/// Ordered header table of an outgoing message.
///
/// Names keep the case they were first given but compare
/// case-insensitively. `Date`, `X-Mailer`, `From` and `Message-ID` are
/// always present; `To`, `Cc` and `Bcc` can only grow through
/// [`HeaderSet::add_to`], [`HeaderSet::add_cc`] and [`HeaderSet::add_bcc`].
#[derive(Debug, Clone)]
pub struct HeaderSet {
    entries: Vec<(String, HeaderValue)>,
    host: String,
}

impl HeaderSet {
    /// Creates the header table for a message sent by `email`.
    #[must_use]
    pub fn new(email: &str, name: &str) -> Self {
        let from = Address::new(email, name).to_string();
        let mut headers = Self {
            entries: vec![
                (
                    "Date".to_string(),
                    HeaderValue::Text(chrono::Local::now().to_rfc2822()),
                ),
                ("X-Mailer".to_string(), HeaderValue::Text(MAILER.to_string())),
                ("From".to_string(), HeaderValue::Text(from)),
                ("Reply-To".to_string(), HeaderValue::Addresses(Vec::new())),
                ("To".to_string(), HeaderValue::Addresses(Vec::new())),
                ("Cc".to_string(), HeaderValue::Addresses(Vec::new())),
                ("Bcc".to_string(), HeaderValue::Addresses(Vec::new())),
            ],
            host: DEFAULT_HOST.to_string(),
        };
        headers.generate_message_id();
        headers
    }

    /// Sets the host identity and regenerates the Message-ID.
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.set_host(host);
        self
    }

    /// Returns the host identity used for Message-IDs.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Changes the host identity and regenerates the Message-ID.
    pub fn set_host(&mut self, host: impl Into<String>) {
        let host = host.into();
        let host = host.trim();
        self.host = if host.is_empty() {
            DEFAULT_HOST.to_string()
        } else {
            host.to_string()
        };
        self.generate_message_id();
    }

    /// Sets a new `Message-ID` of the form `<token@host>`.
    pub fn generate_message_id(&mut self) {
        let id = format!("<{}@{}>", unique_token(), self.host);
        self.put("Message-ID", HeaderValue::Text(id));
    }

    /// Sets a header, replacing any previous value of the same name.
    ///
    /// Returns false, leaving the table untouched, for `To`, `Cc` and `Bcc`.
    pub fn set_header(&mut self, name: &str, value: &str) -> bool {
        let name = name.trim();
        if is_protected(name) {
            tracing::debug!(name, "refusing to set address header directly");
            return false;
        }
        self.put(name, HeaderValue::Text(value.trim().to_string()));
        true
    }

    /// Sets the `From` header.
    pub fn set_from(&mut self, email: &str, name: &str) -> bool {
        self.set_header("From", &Address::new(email, name).to_string())
    }

    /// Adds a `Reply-To` address.
    pub fn add_reply_to(&mut self, email: &str, name: &str) -> bool {
        self.add_address("Reply-To", email, name)
    }

    /// Adds a `To` recipient.
    pub fn add_to(&mut self, email: &str, name: &str) -> bool {
        self.add_address("To", email, name)
    }

    /// Adds a `Cc` recipient.
    pub fn add_cc(&mut self, email: &str, name: &str) -> bool {
        self.add_address("Cc", email, name)
    }

    /// Adds a `Bcc` recipient.
    pub fn add_bcc(&mut self, email: &str, name: &str) -> bool {
        self.add_address("Bcc", email, name)
    }

    fn add_address(&mut self, field: &str, email: &str, name: &str) -> bool {
        let address = Address::new(email, name);
        match self.position(field) {
            Some(idx) => match &mut self.entries[idx].1 {
                HeaderValue::Addresses(list) => {
                    match list.iter_mut().find(|a| a.email() == address.email()) {
                        Some(existing) => *existing = address,
                        None => list.push(address),
                    }
                }
                value => *value = HeaderValue::Addresses(vec![address]),
            },
            None => self
                .entries
                .push((field.to_string(), HeaderValue::Addresses(vec![address]))),
        }
        true
    }

    /// Returns the value stored for `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&HeaderValue> {
        self.position(name).map(|idx| &self.entries[idx].1)
    }

    /// Returns the emails of all `To`, `Cc` and `Bcc` recipients, in that
    /// order.
    #[must_use]
    pub fn recipients(&self) -> Vec<&str> {
        ["To", "Cc", "Bcc"]
            .iter()
            .filter_map(|field| match self.get(field) {
                Some(HeaderValue::Addresses(list)) => Some(list.iter().map(Address::email)),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// Returns an iterator over the names and values in table order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Serializes the table into a stream positioned at the start.
    #[must_use]
    pub fn to_stream(&self) -> BackingStream {
        BackingStream::from_literal(self.to_string())
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(existing, _)| existing.eq_ignore_ascii_case(name))
    }

    fn put(&mut self, name: &str, value: HeaderValue) {
        match self.position(name) {
            Some(idx) => self.entries[idx].1 = value,
            None => self.entries.push((name.to_string(), value)),
        }
    }
}

fn is_protected(name: &str) -> bool {
    PROTECTED.iter().any(|p| p.eq_ignore_ascii_case(name))
}

/// One `Name: Value` line per non-empty header, values stripped of line
/// breaks and RFC 2047 encoded.
impl fmt::Display for HeaderSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, value) in &self.entries {
            if value.is_empty() {
                continue;
            }
            let value = encode_header_value(&secure(&value.render()));
            if value.is_empty() {
                continue;
            }
            writeln!(f, "{}: {value}", secure(name))?;
        }
        Ok(())
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
    use crate::stream::Stream;

    fn text(headers: &HeaderSet, name: &str) -> String {
        headers.get(name).map(HeaderValue::render).unwrap_or_default()
    }

    #[test]
    fn test_initial_headers() {
        let headers = HeaderSet::new("sender@example.com", "Sender");
        let names: Vec<&str> = headers.iter().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            ["Date", "X-Mailer", "From", "Reply-To", "To", "Cc", "Bcc", "Message-ID"]
        );
        assert_eq!(text(&headers, "From"), "Sender <sender@example.com>");
        assert_eq!(text(&headers, "X-Mailer"), MAILER);
        assert!(!text(&headers, "Date").is_empty());
        assert_eq!(headers.host(), DEFAULT_HOST);
    }

    #[test]
    fn test_message_id_uses_host() {
        let mut headers = HeaderSet::new("a@example.com", "").with_host("mail.example.org");
        let first = text(&headers, "Message-ID");
        assert!(first.starts_with('<'));
        assert!(first.ends_with("@mail.example.org>"));

        headers.set_host("relay.example.net");
        let second = text(&headers, "Message-ID");
        assert!(second.ends_with("@relay.example.net>"));
        assert_ne!(first, second);

        headers.set_host("  ");
        assert_eq!(headers.host(), DEFAULT_HOST);
    }

    #[test]
    fn test_set_header_trims_and_replaces() {
        let mut headers = HeaderSet::new("a@example.com", "");
        assert!(headers.set_header(" Subject ", "  First  "));
        assert!(headers.set_header("subject", "Second"));
        assert_eq!(text(&headers, "Subject"), "Second");
        assert_eq!(headers.iter().filter(|(n, _)| n.eq_ignore_ascii_case("subject")).count(), 1);
        assert_eq!(headers.iter().last().unwrap().0, "Subject");
    }

    #[test]
    fn test_set_header_keeps_position() {
        let mut headers = HeaderSet::new("a@example.com", "");
        headers.set_header("Subject", "Hi");
        headers.set_header("Priority", "1");
        headers.set_header("Subject", "Again");
        let names: Vec<&str> = headers.iter().map(|(n, _)| n).skip(8).collect();
        assert_eq!(names, ["Subject", "Priority"]);
    }

    #[test]
    fn test_protected_headers() {
        let mut headers = HeaderSet::new("a@example.com", "");
        for name in ["To", "cc", "BCC", " to "] {
            assert!(!headers.set_header(name, "evil@example.com"));
        }
        assert!(headers.recipients().is_empty());
        assert_eq!(headers.get("To"), Some(&HeaderValue::Addresses(Vec::new())));
    }

    #[test]
    fn test_add_address_deduplicates() {
        let mut headers = HeaderSet::new("a@example.com", "");
        assert!(headers.add_to("bob@example.com", "Bob"));
        assert!(headers.add_to("carol@example.com", ""));
        assert!(headers.add_to(" bob@example.com ", "Robert"));

        assert_eq!(
            text(&headers, "To"),
            "Robert <bob@example.com>, carol@example.com"
        );
    }

    #[test]
    fn test_recipients_order() {
        let mut headers = HeaderSet::new("a@example.com", "");
        headers.add_bcc("hidden@example.com", "");
        headers.add_cc("copy@example.com", "");
        headers.add_to("main@example.com", "");
        headers.add_reply_to("reply@example.com", "");
        assert_eq!(
            headers.recipients(),
            ["main@example.com", "copy@example.com", "hidden@example.com"]
        );
    }

    #[test]
    fn test_set_from() {
        let mut headers = HeaderSet::new("a@example.com", "");
        assert!(headers.set_from("boss@example.com", "The Boss"));
        assert_eq!(text(&headers, "From"), "The Boss <boss@example.com>");
    }

    #[test]
    fn test_reply_to_after_text_value() {
        let mut headers = HeaderSet::new("a@example.com", "");
        headers.set_header("Reply-To", "old@example.com");
        headers.add_reply_to("new@example.com", "");
        assert_eq!(text(&headers, "Reply-To"), "new@example.com");
    }

    #[test]
    fn test_display_skips_empty_and_encodes() {
        let mut headers = HeaderSet::new("a@example.com", "");
        headers.set_header("Subject", "Привет");
        headers.set_header("X-Empty", "   ");
        headers.set_header("X-Smuggle", "ok\r\nBcc: victim@example.com");
        headers.add_to("b@example.com", "");

        let rendered = headers.to_string();
        assert!(rendered.contains("From: a@example.com\n"));
        assert!(rendered.contains("To: b@example.com\n"));
        assert!(rendered.contains("Subject: =?UTF-8?B?0J/RgNC40LLQtdGC?=\n"));
        assert!(rendered.contains("X-Smuggle: okBcc: victim@example.com\n"));
        assert!(!rendered.contains("X-Empty"));
        assert!(!rendered.contains("Cc:"));
        assert!(!rendered.contains("Reply-To"));
        assert!(rendered.starts_with("Date: "));
    }

    #[test]
    fn test_to_stream() {
        let mut headers = HeaderSet::new("a@example.com", "");
        headers.set_header("Subject", "Streamed");
        let mut stream = headers.to_stream();
        let bytes = stream.contents().unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), headers.to_string());
    }
}
