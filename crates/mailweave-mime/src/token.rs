//! Unique tokens for boundaries, attachment ids and Message-IDs.

use rand::Rng;
use std::fmt::Write as _;

/// Returns 128 random bits as 32 lowercase hex characters.
///
/// The alphabet is safe inside a boundary parameter, a `Content-ID` and a
/// Message-ID local part without quoting.
#[must_use]
pub fn unique_token() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill(&mut bytes);
    bytes.iter().fold(String::with_capacity(32), |mut out, b| {
        let _ = write!(out, "{b:02x}");
        out
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_token_shape() {
        let token = unique_token();
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_tokens_are_distinct() {
        let tokens: HashSet<String> = (0..1000).map(|_| unique_token()).collect();
        assert_eq!(tokens.len(), 1000);
    }
}
