//! Conversions between plain text and HTML bodies.
//!
//! `html_to_text` is a fixed sequence of regex rewrites, not an HTML parser.
//! Structural rewrites (line breaks, blocks, links) run before the generic
//! tag stripper, otherwise they would be lost.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::entities::decode_html_entities;

/// Placeholder for source newlines while tags are rewritten.
const SOURCE_NEWLINE: &str = "\u{1}";

macro_rules! lazy_regex {
    ($name:ident, $pattern:expr) => {
        static $name: LazyLock<Regex> =
            LazyLock::new(|| Regex::new($pattern).expect(concat!("valid regex ", stringify!($name))));
    };
}

lazy_regex!(RE_SOURCE_NEWLINE, r"\r?\n");
lazy_regex!(RE_COMMENT, r"(?s)<!--.*?-->");
lazy_regex!(RE_BR, r"(?i)<br\b[^>]*>");
lazy_regex!(RE_BLOCK, r"(?i)</?(?:p|div|table|tr|td|th|h[1-6]|blockquote|ul|ol)\b[^>]*>");
lazy_regex!(RE_SCRIPT, r"(?is)<(script|style)\b.*?</(?:script|style)\s*>");
lazy_regex!(RE_BEFORE_BODY, r"(?is)^.*<body\b[^>]*>");
lazy_regex!(RE_HEAD, r"(?is)^.*</head\s*>");
lazy_regex!(RE_DOCTYPE, r"(?i)<!doctype\b[^>]*>");
lazy_regex!(RE_AFTER_BODY, r"(?is)</body\s*>.*$");
lazy_regex!(RE_AFTER_HTML, r"(?is)</html\s*>.*$");
lazy_regex!(
    RE_ANCHOR,
    r#"(?is)<a\b[^>]*?\bhref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))[^>]*>(.*?)</a\s*>"#
);
lazy_regex!(RE_INLINE, r"(?i)</?(?:span|em|i|strong|b|u|font)\b[^>]*>");
lazy_regex!(RE_LIST_ITEM, r"(?i)<li\b[^>]*>");
lazy_regex!(RE_HR, r"(?i)<hr\b[^>]*>");
lazy_regex!(RE_ANY_TAG, r"(?s)<[^>]*>");
lazy_regex!(RE_PLACEHOLDERS, "\u{1}+");
lazy_regex!(RE_HSPACE, r"[ \t\u{1}]+");
lazy_regex!(RE_SPACE_AROUND_NEWLINE, r" ?\n ?");
lazy_regex!(RE_MANY_NEWLINES, r"\n{3,}");

/// Render an HTML body as readable plain text.
pub fn html_to_text(html: &str) -> String {
    let text = RE_SOURCE_NEWLINE.replace_all(html, SOURCE_NEWLINE);
    let text = text.trim();

    let text = RE_COMMENT.replace_all(text, " ");
    let text = RE_SCRIPT.replace_all(&text, " ");
    let text = RE_BEFORE_BODY.replace(&text, "");
    let text = RE_HEAD.replace(&text, "");
    let text = RE_DOCTYPE.replace_all(&text, "");
    let text = RE_AFTER_BODY.replace(&text, "");
    let text = RE_AFTER_HTML.replace(&text, "");

    let text = RE_BR.replace_all(&text, "\n");
    let text = RE_BLOCK.replace_all(&text, "\n\n");
    let text = RE_ANCHOR.replace_all(&text, |caps: &Captures<'_>| render_link(caps));
    let text = RE_INLINE.replace_all(&text, "");
    let text = RE_LIST_ITEM.replace_all(&text, "\n* ");
    let text = RE_HR.replace_all(&text, "\n-------------\n");
    let text = RE_ANY_TAG.replace_all(&text, " ");

    let text = RE_PLACEHOLDERS.replace_all(&text, " ");
    let text = RE_HSPACE.replace_all(&text, " ");
    let text = RE_SPACE_AROUND_NEWLINE.replace_all(&text, "\n");
    let text = RE_MANY_NEWLINES.replace_all(&text, "\n\n");

    decode_html_entities(text.trim())
}

fn render_link(caps: &Captures<'_>) -> String {
    let href = (1..=3)
        .find_map(|i| caps.get(i))
        .map_or("", |m| m.as_str())
        .trim();
    let inner = caps.get(4).map_or("", |m| m.as_str());
    let label = RE_ANY_TAG.replace_all(inner, " ");
    let label = RE_HSPACE.replace_all(label.trim(), " ");
    let label = label.trim();

    if href.is_empty() || href.starts_with('#') || href.eq_ignore_ascii_case("javascript:void(0)") {
        return label.to_string();
    }
    if label.is_empty() {
        return href.to_string();
    }
    let bare = href
        .strip_prefix("mailto:")
        .unwrap_or(href)
        .trim_end_matches('/');
    if label == href || label == bare {
        return label.to_string();
    }
    format!("{label} ({href})")
}

/// Escape the five HTML-significant characters.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Wrap plain text in a `<div>`, escaping it and turning newlines into `<br/>`.
pub fn text_to_html(text: &str) -> String {
    let escaped = escape_html(text).replace("\r\n", "\n").replace('\n', "<br/>");
    format!("<div>{escaped}</div>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_to_html() {
        assert_eq!(
            text_to_html("a < b\nsecond & \"third\""),
            "<div>a &lt; b<br/>second &amp; &quot;third&quot;</div>"
        );
    }

    #[test]
    fn test_roundtrip_plain_ascii() {
        let original = "Hello there\nThis is line two\n\nNew paragraph";
        assert_eq!(html_to_text(&text_to_html(original)), original);
    }

    #[test]
    fn test_line_breaks_and_blocks() {
        let html = "<p>First</p><p>Second<br>line</p>";
        assert_eq!(html_to_text(html), "First\n\nSecond\nline");
    }

    #[test]
    fn test_source_newlines_are_spaces() {
        assert_eq!(html_to_text("<div>one\ntwo</div>"), "one two");
    }

    #[test]
    fn test_links() {
        let html = r#"Visit <a href="https://example.com">our <b>site</b></a> now"#;
        assert_eq!(html_to_text(html), "Visit our site (https://example.com) now");
        let same = r#"<a href='https://example.com'>https://example.com</a>"#;
        assert_eq!(html_to_text(same), "https://example.com");
        assert_eq!(html_to_text(r##"<a href="#top">Top</a>"##), "Top");
    }

    #[test]
    fn test_document_wrapper_removed() {
        let html = "<!DOCTYPE html><html><head><title>T</title><style>p{}</style></head>\
                    <body><p>Body &amp; soul</p></body></html>trailer";
        assert_eq!(html_to_text(html), "Body & soul");
    }

    #[test]
    fn test_comments_and_scripts_removed() {
        let html = "a<!-- hidden\nstuff -->b<script>alert(1)</script>c";
        assert_eq!(html_to_text(html), "a b c");
    }

    #[test]
    fn test_lists_and_rules() {
        let html = "<ul><li>one</li><li>two</li></ul><hr>end";
        assert_eq!(html_to_text(html), "* one\n* two\n\n-------------\nend");
    }

    #[test]
    fn test_entities_decoded_last() {
        assert_eq!(html_to_text("&lt;b&gt;not a tag&lt;/b&gt;"), "<b>not a tag</b>");
    }
}
