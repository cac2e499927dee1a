//! RFC 5322 header handling: folding, structured values (RFC 2045 parameters
//! with RFC 2231 continuations), and date parsing.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use regex::Regex;
use tracing::warn;

use crate::decode::charset;
use crate::model::message::{Header, RawHeaderLine};

static RE_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

static RE_CONTINUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*((\d+)\*?)?$").expect("valid continuation regex"));

/// Decode raw header bytes to a string.
///
/// Tries UTF-8 first, then falls back to windows-1252 (which accepts every byte).
pub fn decode_header_bytes(bytes: &[u8]) -> String {
    // Strip BOM if present
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);

    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Join continuation lines (starting with space or tab) onto the previous line.
///
/// Continuations are kept on separate lines joined by `\n` so the result can
/// be echoed verbatim. A continuation with nothing before it starts a line.
pub fn unfold_lines(lines: &[String]) -> Vec<String> {
    let mut result: Vec<String> = Vec::with_capacity(lines.len());

    for line in lines {
        let is_continuation = line.starts_with(' ') || line.starts_with('\t');
        match result.last_mut() {
            Some(last) if is_continuation => {
                last.push('\n');
                last.push_str(line);
            }
            _ => result.push(line.clone()),
        }
    }

    result
}

/// Split a logical header line into its raw and normalized forms.
///
/// Lines without a colon keep the whole trimmed line as the key and get an
/// empty value.
pub fn parse_header_line(raw: &str) -> (RawHeaderLine, Header) {
    let original_key = match raw.find(':') {
        Some(pos) => raw[..pos].trim(),
        None => raw.trim(),
    };
    let key = original_key.to_lowercase();

    let normalized = RE_WHITESPACE.replace_all(raw, " ");
    let value = match normalized.find(':') {
        Some(pos) => normalized[pos + 1..].trim().to_string(),
        None => String::new(),
    };

    (
        RawHeaderLine {
            key: key.clone(),
            line: raw.to_string(),
        },
        Header {
            key,
            original_key: original_key.to_string(),
            value,
        },
    )
}

/// Get the first value for a header name (case-insensitive).
pub fn get_header<'a>(headers: &'a [Header], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|h| h.key.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
}

/// A parsed `value; key=value; ...` header such as `Content-Type`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructuredHeader {
    /// The unkeyed leading token, lowercased (e.g. `"text/plain"`).
    pub value: String,
    /// Parameters with lowercased keys. RFC 2231 continuations are merged.
    pub params: BTreeMap<String, String>,
}

impl StructuredHeader {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Stage {
    Key,
    Value,
}

/// Parse a structured header value.
///
/// Quoted strings may contain `;` and `=` and honor backslash escapes.
/// Parenthesized comments are not recognized here.
pub fn parse_structured_header(input: &str) -> StructuredHeader {
    let mut response = StructuredHeader::default();
    let mut key: Option<String> = None;
    let mut value = String::new();
    let mut stage = Stage::Value;
    let mut quote = false;
    let mut escaped = false;

    for ch in input.chars() {
        match stage {
            Stage::Key => match ch {
                '=' => {
                    key = Some(value.trim().to_lowercase());
                    value.clear();
                    stage = Stage::Value;
                }
                ';' => {
                    let bare = value.trim().to_lowercase();
                    if !bare.is_empty() {
                        response.params.insert(bare, String::new());
                    }
                    value.clear();
                }
                _ => value.push(ch),
            },
            Stage::Value => {
                if escaped {
                    value.push(ch);
                    escaped = false;
                } else if ch == '\\' {
                    escaped = true;
                } else if ch == '"' {
                    quote = !quote;
                } else if !quote && ch == ';' {
                    commit(&mut key, &mut value, &mut response);
                    stage = Stage::Key;
                } else {
                    value.push(ch);
                }
            }
        }
    }

    match stage {
        Stage::Value => commit(&mut key, &mut value, &mut response),
        Stage::Key => {
            let bare = value.trim().to_lowercase();
            if !bare.is_empty() {
                response.params.insert(bare, String::new());
            }
        }
    }

    merge_continuations(&mut response.params);
    response
}

fn commit(key: &mut Option<String>, value: &mut String, response: &mut StructuredHeader) {
    let v = value.trim().to_string();
    match key.take() {
        None => response.value = v.to_lowercase(),
        Some(k) => {
            response.params.insert(k, v);
        }
    }
    value.clear();
}

/// One RFC 2231 segment of a split parameter.
struct Segment {
    index: u32,
    bytes: Vec<u8>,
}

#[derive(Default)]
struct SplitParam {
    charset: Option<String>,
    segments: Vec<Segment>,
}

/// Merge `name*0*=`, `name*1=`... into a single `name` parameter.
///
/// Extended (`*`-suffixed) segments are percent-decoded; the charset declared
/// on segment 0 (`charset'lang'value`) decodes the joined bytes.
fn merge_continuations(params: &mut BTreeMap<String, String>) {
    let split_keys: Vec<String> = params
        .keys()
        .filter(|k| RE_CONTINUATION.is_match(k))
        .cloned()
        .collect();
    if split_keys.is_empty() {
        return;
    }

    let mut merged: BTreeMap<String, SplitParam> = BTreeMap::new();

    for key in split_keys {
        let Some(caps) = RE_CONTINUATION.captures(&key) else {
            continue;
        };
        let Some(suffix) = caps.get(0) else {
            continue;
        };
        let base = key[..suffix.start()].to_string();
        let index = caps
            .get(2)
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .unwrap_or(0);
        let extended = suffix.as_str().ends_with('*');
        let Some(mut value) = params.remove(&key) else {
            continue;
        };

        let entry = merged.entry(base).or_default();
        if index == 0 && extended {
            if let Some((cs, rest)) = split_charset_prefix(&value) {
                entry.charset = Some(cs);
                value = rest;
            }
        }

        let bytes = if extended {
            percent_encoding::percent_decode_str(&value).collect()
        } else {
            value.into_bytes()
        };
        entry.segments.push(Segment { index, bytes });
    }

    for (base, mut split) in merged {
        split.segments.sort_by_key(|s| s.index);
        let joined: Vec<u8> = split
            .segments
            .into_iter()
            .flat_map(|s| s.bytes)
            .collect();
        let value = charset::decode_fragment(split.charset.as_deref(), &joined);
        params.insert(base, value);
    }
}

/// Split `charset'lang'value` into an owned charset (UTF-8 if empty) and value.
fn split_charset_prefix(value: &str) -> Option<(String, String)> {
    let mut parts = value.splitn(3, '\'');
    let charset = parts.next()?;
    let _language = parts.next()?;
    let rest = parts.next()?;
    let charset = if charset.is_empty() { "utf-8" } else { charset };
    Some((charset.to_string(), rest.to_string()))
}

/// Render a `Date:` value as ISO-8601 with millisecond precision, or return
/// the trimmed raw value when it cannot be parsed.
pub fn normalize_date(raw: &str) -> String {
    match parse_date(raw) {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Millis, true),
        None => raw.trim().to_string(),
    }
}

/// Parse an email date string in various common formats.
///
/// Supports RFC 2822, ISO 8601, and many broken real-world variants.
pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return None;
    }

    // Try chrono's RFC 2822
    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    // Try ISO 8601 / RFC 3339
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }

    // Trailing comments like "(UTC)" or "(PST)"
    let no_comment = strip_trailing_comment(trimmed);
    if let Ok(dt) = DateTime::parse_from_rfc2822(&no_comment) {
        return Some(dt.with_timezone(&Utc));
    }

    let no_dow = strip_day_of_week(&no_comment);

    // IMAP-style: "16-JUL-2025 03:01:03" → normalize to "16 Jul 2025 03:01:03"
    let no_dow_normalized = normalize_imap_date(&no_dow);

    let formats = [
        "%d %b %Y %H:%M:%S %z",
        "%d %b %Y %H:%M:%S %Z",
        "%d %b %Y %H:%M:%S",
        "%d %b %Y %H:%M %z",
        "%b %d %H:%M:%S %Y",
        "%Y-%m-%dT%H:%M:%S%z",
        "%Y-%m-%dT%H:%M:%SZ",
        "%Y-%m-%d %H:%M:%S %z",
        "%Y-%m-%d %H:%M:%S",
        "%d/%m/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
    ];

    for candidate in [&no_dow, &no_dow_normalized] {
        for fmt in &formats {
            if let Ok(dt) = DateTime::parse_from_str(candidate, fmt) {
                return Some(dt.with_timezone(&Utc));
            }
            if let Ok(ndt) = NaiveDateTime::parse_from_str(candidate, fmt) {
                return Some(Utc.from_utc_datetime(&ndt));
            }
        }
    }

    // Replace named timezones with offsets and try again
    for candidate in [&no_dow, &no_dow_normalized] {
        let replaced = replace_named_tz(candidate);
        for fmt in &formats {
            if let Ok(dt) = DateTime::parse_from_str(&replaced, fmt) {
                return Some(dt.with_timezone(&Utc));
            }
        }
    }

    warn!(date = trimmed, "Could not parse date");
    None
}

/// Drop a trailing parenthesized comment: `"... +0000 (UTC)"`.
fn strip_trailing_comment(s: &str) -> String {
    if s.ends_with(')') {
        if let Some(open) = s.rfind('(') {
            return s[..open].trim_end().to_string();
        }
    }
    s.to_string()
}

/// Normalize IMAP-style dates: `"16-JUL-2025 03:01:03"` → `"16 Jul 2025 03:01:03"`.
fn normalize_imap_date(s: &str) -> String {
    if !s.contains('-') {
        return s.to_string();
    }

    let title_months = [
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ];

    for month in &title_months {
        for variant in [month.to_uppercase(), month.to_lowercase(), month.to_string()] {
            let pattern = format!("-{variant}-");
            if s.contains(&pattern) {
                return s.replacen(&pattern, &format!(" {month} "), 1);
            }
        }
    }

    s.to_string()
}

/// Strip leading day-of-week prefix (e.g. "Thu, " or "Thu ").
fn strip_day_of_week(s: &str) -> String {
    let days = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
    for day in &days {
        if let Some(rest) = s.strip_prefix(day) {
            if rest.starts_with(',') || rest.starts_with(' ') {
                return rest.trim_start_matches(',').trim().to_string();
            }
        }
    }
    s.to_string()
}

/// Replace well-known timezone abbreviations with numeric offsets.
fn replace_named_tz(s: &str) -> String {
    let tzs = [
        ("EST", "-0500"),
        ("EDT", "-0400"),
        ("CST", "-0600"),
        ("CDT", "-0500"),
        ("MST", "-0700"),
        ("MDT", "-0600"),
        ("PST", "-0800"),
        ("PDT", "-0700"),
        ("GMT", "+0000"),
        ("UTC", "+0000"),
        ("UT", "+0000"),
        ("CET", "+0100"),
        ("CEST", "+0200"),
        ("JST", "+0900"),
    ];
    let mut result = s.to_string();
    for (name, offset) in &tzs {
        if result.ends_with(&format!(" {name}")) {
            let pos = result.len() - name.len();
            result.replace_range(pos.., offset);
            return result;
        }
    }
    result
}
