//! RFC 2047 encoded-word decoding for header values.
//!
//! Adjacent words that share charset and encoding are decoded as one unit,
//! because senders routinely split a multi-byte character across two words.
//! If the joined decode produces U+FFFD the header is decoded again without
//! joining (at most once).

use std::sync::LazyLock;

use regex::Regex;

use crate::decode::base64::{decode_base64, is_base64_char};
use crate::decode::charset;

static RE_ENCODED_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"=\?([^?\s]+)\?([QqBb])\?([^?]*)\?=").expect("valid encoded word regex")
});

static RE_BROKEN_HEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"=\s+([0-9a-fA-F])").expect("valid broken hex regex"));

/// One `=?charset?X?text?=` occurrence, by byte range in the input.
struct Word<'a> {
    start: usize,
    end: usize,
    charset: &'a str,
    encoding: char,
    text: &'a str,
}

/// A run of words decoded together.
struct Unit {
    charset: String,
    encoding: char,
    text: String,
}

impl Unit {
    fn from_word(word: &Word<'_>) -> Self {
        Self {
            charset: word.charset.to_string(),
            encoding: word.encoding,
            text: word.text.to_string(),
        }
    }

    /// Whether `word` may be appended to this unit before decoding.
    fn accepts(&self, word: &Word<'_>) -> bool {
        if !self.charset.eq_ignore_ascii_case(word.charset) || self.encoding != word.encoding {
            return false;
        }
        // B-encoded text can only be concatenated on a quantum boundary.
        self.encoding == 'Q' || (self.text.len() % 4 == 0 && !self.text.ends_with('='))
    }

    fn decode(&self) -> String {
        decode_word(&self.charset, self.encoding, &self.text)
    }
}

/// Decode all encoded words in a header value.
///
/// Text outside encoded words is returned unchanged; whitespace between two
/// encoded words is dropped (RFC 2047 §6.2).
pub fn decode_words(input: &str) -> String {
    let joined = decode_words_with(input, true);
    if joined.contains('\u{FFFD}') {
        return decode_words_with(input, false);
    }
    joined
}

fn decode_words_with(input: &str, join: bool) -> String {
    let words: Vec<Word<'_>> = RE_ENCODED_WORD
        .captures_iter(input)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(Word {
                start: whole.start(),
                end: whole.end(),
                charset: caps.get(1)?.as_str(),
                encoding: caps.get(2)?.as_str().chars().next()?.to_ascii_uppercase(),
                text: caps.get(3)?.as_str(),
            })
        })
        .collect();

    if words.is_empty() {
        return input.to_string();
    }

    let mut result = String::with_capacity(input.len());
    let mut unit: Option<Unit> = None;
    let mut last_end = 0;

    for word in &words {
        let gap = &input[last_end..word.start];
        let adjacent = unit.is_some() && gap.trim().is_empty();

        match unit.as_mut() {
            Some(current) if adjacent && join && current.accepts(word) => {
                current.text.push_str(word.text);
            }
            _ => {
                if let Some(done) = unit.take() {
                    result.push_str(&done.decode());
                }
                if !adjacent {
                    result.push_str(gap);
                }
                unit = Some(Unit::from_word(word));
            }
        }
        last_end = word.end;
    }

    if let Some(done) = unit {
        result.push_str(&done.decode());
    }
    result.push_str(&input[last_end..]);
    result
}

/// Decode a single encoded word body.
pub fn decode_word(charset: &str, encoding: char, text: &str) -> String {
    let bytes = match encoding.to_ascii_uppercase() {
        'B' => {
            let cleaned: Vec<u8> = text
                .bytes()
                .filter(|&b| is_base64_char(b) || b == b'=')
                .collect();
            decode_base64(&cleaned)
        }
        _ => decode_q(text),
    };
    charset::decode_fragment(Some(charset), &bytes)
}

/// Decode RFC 2047 `Q` text: `_` and whitespace runs become one space, `=XX`
/// becomes a byte. A broken escape split by whitespace (`= 4`) is repaired.
pub fn decode_q(text: &str) -> Vec<u8> {
    let repaired = RE_BROKEN_HEX.replace_all(text, "=$1");
    let bytes = repaired.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                out.push(b' ');
                i += 1;
            }
            b if b.is_ascii_whitespace() => {
                out.push(b' ');
                while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                    i += 1;
                }
            }
            b'=' if i + 2 < bytes.len() => match hex_pair(bytes[i + 1], bytes[i + 2]) {
                Some(byte) => {
                    out.push(byte);
                    i += 3;
                }
                None => {
                    out.push(b'=');
                    i += 1;
                }
            },
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    out
}

fn hex_pair(hi: u8, lo: u8) -> Option<u8> {
    let hi = (hi as char).to_digit(16)?;
    let lo = (lo as char).to_digit(16)?;
    Some((hi * 16 + lo) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_decode_base64_encoded_word() {
        assert_eq!(decode_words("=?UTF-8?B?SG9sYSBtdW5kbw==?="), "Hola mundo");
    }

    #[test]
    fn test_decode_q_encoded_word() {
        assert_eq!(decode_words("=?ISO-8859-1?Q?caf=E9?="), "café");
    }

    #[test]
    fn test_decode_multiple_encoded_words() {
        assert_eq!(
            decode_words("=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="),
            "Hola mundo"
        );
    }

    #[test]
    fn test_decode_mixed_plain_and_encoded() {
        assert_eq!(decode_words("Re: =?UTF-8?B?SG9sYQ==?= there"), "Re: Hola there");
    }

    #[test]
    fn test_adjacent_q_words_split_mid_character() {
        let input = "=?UTF-8?Q?Caf=C3?=\n =?UTF-8?Q?=A9_con_le=C3=B1a?=";
        assert_eq!(decode_words(input), "Café con leña");
    }

    #[test]
    fn test_adjacent_q_words_no_extra_space() {
        let input = "=?UTF-8?Q?Hello?= =?UTF-8?Q?World?=";
        assert_eq!(decode_words(input), "HelloWorld");
    }

    #[test]
    fn test_adjacent_b_words_joined() {
        // 山田 / 太郎 in two separately padded-free words
        let input = "=?UTF-8?B?5bGx55Sw?=\t=?UTF-8?B?5aSq6YOO?=";
        assert_eq!(decode_words(input), "山田太郎");
    }

    #[test]
    fn test_different_charsets_not_joined() {
        let input = "=?ISO-8859-1?Q?caf=E9?= =?UTF-8?Q?_ok?=";
        assert_eq!(decode_words(input), "café ok");
    }

    #[test]
    fn test_without_joining_split_character_is_invalid() {
        let input = "=?UTF-8?Q?Caf=C3?= =?UTF-8?Q?=A9?=";
        assert_eq!(decode_words_with(input, false), "Caf\u{FFFD}\u{FFFD}");
        assert_eq!(decode_words_with(input, true), "Café");
    }

    #[test]
    fn test_invalid_after_join_retries_unjoined() {
        let input = "=?UTF-8?Q?a=C3?= =?UTF-8?Q?b?=";
        assert_eq!(decode_words(input), "a\u{FFFD}b");
    }

    #[test]
    fn test_unknown_charset_falls_back() {
        assert_eq!(decode_words("=?x-unknown?Q?M=FCller?="), "Müller");
    }

    #[test]
    fn test_rfc2231_language_in_charset() {
        assert_eq!(decode_words("=?UTF-8*en?Q?Hi?="), "Hi");
    }

    #[test]
    fn test_q_whitespace_and_broken_hex() {
        assert_eq!(decode_q("a_b  c"), b"a b c");
        assert_eq!(decode_q("=\t41"), b"A");
        assert_eq!(decode_q("=4"), b"=4");
        assert_eq!(decode_q("=ZZ"), b"=ZZ");
    }

    #[test]
    fn test_malformed_word_left_alone() {
        assert_eq!(decode_words("=?UTF-8?X?abc?="), "=?UTF-8?X?abc?=");
        assert_eq!(decode_words("cost =? 5"), "cost =? 5");
    }

    proptest! {
        #[test]
        fn test_no_encoded_words_unchanged(s in "[^=]*") {
            prop_assert_eq!(decode_words(&s), s);
        }
    }
}
