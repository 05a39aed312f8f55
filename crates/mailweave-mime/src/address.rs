//! Email address types.

use std::fmt;

/// Mailbox used in address headers: an email plus an optional display name.
///
/// The address is not validated; it is trimmed and carried as given.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    email: String,
    name: String,
}

impl Address {
    /// Creates an address, trimming both parts.
    #[must_use]
    pub fn new(email: impl AsRef<str>, name: impl AsRef<str>) -> Self {
        Self {
            email: email.as_ref().trim().to_string(),
            name: name.as_ref().trim().to_string(),
        }
    }

    /// Creates an address without a display name.
    #[must_use]
    pub fn email_only(email: impl AsRef<str>) -> Self {
        Self::new(email, "")
    }

    /// Returns the email part.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Returns the display name, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        (!self.name.is_empty()).then_some(self.name.as_str())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}", self.email)
        } else {
            write!(f, "{} <{}>", self.name, self.email)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_email_only() {
        let addr = Address::new("john@example.com", "");
        assert_eq!(addr.to_string(), "john@example.com");
        assert_eq!(addr.name(), None);
    }

    #[test]
    fn test_with_name() {
        let addr = Address::new("john@example.com", "John Doe");
        assert_eq!(addr.to_string(), "John Doe <john@example.com>");
        assert_eq!(addr.name(), Some("John Doe"));
    }

    #[test]
    fn test_trimmed() {
        let addr = Address::new("  john@example.com\t", "  John  ");
        assert_eq!(addr.email(), "john@example.com");
        assert_eq!(addr.to_string(), "John <john@example.com>");

        let blank_name = Address::new("a@b.c", "   ");
        assert_eq!(blank_name.to_string(), "a@b.c");
        assert_eq!(blank_name, Address::email_only("a@b.c"));
    }
}
