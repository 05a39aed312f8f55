//! Encoding helpers shared by headers and body parts.
//!
//! Supports Base64 and RFC 2047 header encoding.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Longest header value emitted verbatim.
pub const MAX_PLAIN_LENGTH: usize = 70;

/// Input bytes carried by one RFC 2047 encoded-word.
///
/// 41 bytes encode to 56 base64 characters, so a word including the
/// `=?UTF-8?B?` / `?=` delimiters is 68 characters long. Continuation lines
/// (a space plus one word) stay below 76 characters; the first line also
/// carries the header name and may run longer.
const WORD_BYTES: usize = 41;

/// Separator between encoded-words of a folded header value.
const FOLD: &str = "\n ";

/// Encodes data as Base64.
#[must_use]
pub fn encode_base64(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Removes CR and LF characters and trims surrounding whitespace, so a
/// value cannot inject extra header lines.
#[must_use]
pub fn secure(text: &str) -> String {
    text.replace(['\r', '\n'], "").trim().to_string()
}

/// Returns true if the text contains bytes outside US-ASCII.
#[must_use]
pub fn has_non_ascii(text: &str) -> bool {
    !text.is_ascii()
}

/// Encodes a header value using RFC 2047 if needed.
///
/// ASCII values up to [`MAX_PLAIN_LENGTH`] bytes are returned unchanged.
/// Anything else becomes a sequence of `=?UTF-8?B?...?=` encoded-words,
/// each covering at most 41 bytes of input without splitting a character,
/// joined by a newline and a space.
#[must_use]
pub fn encode_header_value(text: &str) -> String {
    if text.len() <= MAX_PLAIN_LENGTH && !has_non_ascii(text) {
        return text.to_string();
    }

    let mut words = Vec::new();
    let mut start = 0;
    let mut end = 0;
    for (idx, ch) in text.char_indices() {
        let next = idx + ch.len_utf8();
        if next - start > WORD_BYTES && end > start {
            words.push(encoded_word(&text[start..end]));
            start = end;
        }
        end = next;
    }
    if end > start {
        words.push(encoded_word(&text[start..end]));
    }

    words.join(FOLD)
}

fn encoded_word(chunk: &str) -> String {
    format!("=?UTF-8?B?{}?=", encode_base64(chunk.as_bytes()))
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

    #[test]
    fn test_base64_encode() {
        assert_eq!(encode_base64(b"Hello, World!"), "SGVsbG8sIFdvcmxkIQ==");
        assert_eq!(encode_base64(b""), "");
    }

    #[test]
    fn test_secure() {
        assert_eq!(secure("a\r\n multiline\r string\n!"), "a multiline string!");
        assert_eq!(secure("  padded  "), "padded");
    }

    #[test]
    fn test_encode_plain_passthrough() {
        assert_eq!(encode_header_value("Hello world"), "Hello world");
        let seventy = "x".repeat(70);
        assert_eq!(encode_header_value(&seventy), seventy);
    }

    #[test]
    fn test_encode_non_ascii() {
        assert_eq!(
            encode_header_value("( ͡° ͜ʖ ͡°)"),
            "=?UTF-8?B?KCDNocKwIM2cypYgzaHCsCk=?="
        );
    }

    #[test]
    fn test_encode_long_ascii_folds() {
        let text = "Friends, this is clean-up time and we're discounting all our silent, \
                    electric Ubiks by this much money. Yes, we're throwing away the blue-book. \
                    And remember: every Ubik on our lot has been used only as directed.";
        let expected = concat!(
            "=?UTF-8?B?RnJpZW5kcywgdGhpcyBpcyBjbGVhbi11cCB0aW1lIGFuZCB3ZSdyZSA=?=\n",
            " =?UTF-8?B?ZGlzY291bnRpbmcgYWxsIG91ciBzaWxlbnQsIGVsZWN0cmljIFViaWs=?=\n",
            " =?UTF-8?B?cyBieSB0aGlzIG11Y2ggbW9uZXkuIFllcywgd2UncmUgdGhyb3dpbmc=?=\n",
            " =?UTF-8?B?IGF3YXkgdGhlIGJsdWUtYm9vay4gQW5kIHJlbWVtYmVyOiBldmVyeSA=?=\n",
            " =?UTF-8?B?VWJpayBvbiBvdXIgbG90IGhhcyBiZWVuIHVzZWQgb25seSBhcyBkaXI=?=\n",
            " =?UTF-8?B?ZWN0ZWQu?="
        );
        assert_eq!(encode_header_value(text), expected);
    }

    #[test]
    fn test_encode_keeps_characters_whole() {
        // 40 ASCII bytes followed by a two-byte character: the character
        // must move to the next word instead of being split.
        let text = format!("{}é tail", "a".repeat(40));
        let encoded = encode_header_value(&text);
        let words: Vec<&str> = encoded.split(FOLD).collect();
        assert_eq!(words.len(), 2);
        assert_eq!(words[0], encoded_word(&"a".repeat(40)));
        assert_eq!(words[1], encoded_word("é tail"));
    }

    #[test]
    fn test_encode_empty() {
        assert_eq!(encode_header_value(""), "");
    }
}
