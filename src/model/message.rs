//! The parsed message returned by [`crate::parse`].

use serde::{Deserialize, Serialize};

use super::address::Address;
use super::attachment::Attachment;

/// A header field after unfolding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    /// Lowercased field name, used for lookups.
    pub key: String,
    /// Field name as written in the message.
    pub original_key: String,
    /// Unfolded value with whitespace runs collapsed. Encoded words are kept.
    pub value: String,
}

/// A header line as it appeared in the message, continuation lines included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawHeaderLine {
    /// Lowercased field name.
    pub key: String,
    /// Verbatim line; folded continuations are joined with `\n`.
    pub line: String,
}

/// A fully decoded message.
///
/// `headers` keeps insertion order and duplicates. Address fields are parsed
/// from the first matching header (`from`, `sender`) or from all matching
/// headers (`to`, `cc`, `bcc`, `reply_to`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub headers: Vec<Header>,

    pub header_lines: Vec<RawHeaderLine>,

    /// First address of the `From:` header.
    pub from: Option<Address>,

    /// First address of the `Sender:` header.
    pub sender: Option<Address>,

    /// Bare address from `Delivered-To:`.
    pub delivered_to: Option<String>,

    /// Bare address from `Return-Path:`.
    pub return_path: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub to: Vec<Address>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cc: Vec<Address>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bcc: Vec<Address>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reply_to: Vec<Address>,

    /// Decoded subject line (RFC 2047 encoded words resolved).
    pub subject: Option<String>,

    pub message_id: Option<String>,

    pub in_reply_to: Option<String>,

    pub references: Option<String>,

    /// ISO-8601 (`2024-01-04T10:00:00.000Z`) when parseable, otherwise the raw value.
    pub date: Option<String>,

    /// Plain-text body. Synthesized from HTML when only HTML was present.
    pub text: Option<String>,

    /// HTML body. Synthesized from text when only text was present.
    pub html: Option<String>,

    /// All attachments, including those of embedded messages.
    pub attachments: Vec<Attachment>,
}

impl Message {
    /// Value of the first header named `key` (case-insensitive).
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.key.eq_ignore_ascii_case(key))
            .map(|h| h.value.as_str())
    }

    /// Values of every header named `key`, in message order.
    pub fn header_values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |h| h.key.eq_ignore_ascii_case(key))
            .map(|h| h.value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(key: &str, value: &str) -> Header {
        Header {
            key: key.to_lowercase(),
            original_key: key.to_string(),
            value: value.to_string(),
        }
    }

    #[test]
    fn test_header_lookup_keeps_duplicates() {
        let msg = Message {
            headers: vec![
                header("Received", "first"),
                header("To", "a@b.com"),
                header("Received", "second"),
            ],
            ..Default::default()
        };
        assert_eq!(msg.header("RECEIVED"), Some("first"));
        assert_eq!(
            msg.header_values("received").collect::<Vec<_>>(),
            vec!["first", "second"]
        );
        assert_eq!(msg.header("cc"), None);
    }

    #[test]
    fn test_header_outlives_key() {
        let msg = Message {
            headers: vec![header("Subject", "kept")],
            ..Default::default()
        };
        let value = {
            let key = String::from("subject");
            msg.header(&key)
        };
        assert_eq!(value, Some("kept"));
    }
}
