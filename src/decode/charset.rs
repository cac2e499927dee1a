//! Charset label resolution.
//!
//! Labels are looked up with `encoding_rs`. Anything it does not know decodes
//! as windows-1252, which accepts every byte, so decoding never fails.

use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};
use tracing::warn;

/// Resolve a charset label, falling back to windows-1252 for unknown labels.
///
/// `None` or an empty label means UTF-8.
pub fn resolve(label: Option<&str>) -> &'static Encoding {
    let label = match label.map(str::trim) {
        Some(l) if !l.is_empty() => l,
        _ => return UTF_8,
    };
    // RFC 2231 allows a language suffix: "utf-8*en"
    let label = label.split('*').next().unwrap_or(label);
    let label = label.trim_matches('"');

    match Encoding::for_label(label.as_bytes()) {
        Some(encoding) => encoding,
        None => {
            warn!(charset = label, "Unknown charset, falling back to windows-1252");
            WINDOWS_1252
        }
    }
}

/// Decode `bytes` using the named charset (BOM is honored and stripped).
pub fn decode_text(label: Option<&str>, bytes: &[u8]) -> String {
    let encoding = resolve(label);
    let (decoded, _) = encoding.decode_with_bom_removal(bytes);
    decoded.into_owned()
}

/// Decode `bytes` using the named charset without BOM sniffing.
///
/// Used for encoded words and RFC 2231 values, which are short fragments
/// that must not change meaning depending on their first bytes.
pub fn decode_fragment(label: Option<&str>, bytes: &[u8]) -> String {
    let encoding = resolve(label);
    let (decoded, _) = encoding.decode_without_bom_handling(bytes);
    decoded.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_utf8() {
        assert_eq!(resolve(None), UTF_8);
        assert_eq!(resolve(Some("  ")), UTF_8);
    }

    #[test]
    fn test_known_labels() {
        assert_eq!(resolve(Some("ISO-8859-1")), WINDOWS_1252);
        assert_eq!(resolve(Some("utf8")), UTF_8);
        assert_eq!(resolve(Some("\"UTF-8\"")), UTF_8);
    }

    #[test]
    fn test_language_suffix_ignored() {
        assert_eq!(resolve(Some("utf-8*en")), UTF_8);
    }

    #[test]
    fn test_unknown_falls_back_to_windows_1252() {
        assert_eq!(resolve(Some("x-no-such-charset")), WINDOWS_1252);
        assert_eq!(decode_text(Some("x-no-such-charset"), b"M\xfcller"), "Müller");
    }

    #[test]
    fn test_decode_text_strips_bom() {
        assert_eq!(decode_text(Some("utf-8"), b"\xEF\xBB\xBFhello"), "hello");
    }

    #[test]
    fn test_decode_invalid_utf8_uses_replacement() {
        assert_eq!(decode_fragment(Some("utf-8"), b"a\xffb"), "a\u{FFFD}b");
    }
}
