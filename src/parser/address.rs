//! Address list parsing (`From`, `To`, `Cc`, ...).
//!
//! Tolerant of the usual real-world damage: missing angle brackets, bare
//! display names, comments used as names, encoded words hiding a whole
//! address, and groups nested deeper than RFC 5322 allows.

use std::sync::LazyLock;

use regex::Regex;

use crate::model::address::{Address, Mailbox};
use crate::parser::encoded_word::decode_words;

/// Groups nested deeper than this are dropped.
const MAX_GROUP_DEPTH: usize = 50;

static RE_ANGLE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^<]*<\s*").expect("valid angle prefix regex"));

static RE_BARE_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+$").expect("valid bare address regex"));

static RE_EMBEDDED_ADDRESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*\b[^@\s]+@[^\s]+\b\s*").expect("valid embedded address regex")
});

static RE_SINGLE_ENCODED_WORD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^=\?[^?\s]+\?[QqBb]\?[^?]*\?=$").expect("valid encoded word regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Operator,
    Text,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    value: String,
    /// The closing operator is glued to the following text.
    no_break: bool,
}

impl Token {
    fn is_operator(&self, value: &str) -> bool {
        self.kind == TokenKind::Operator && self.value == value
    }
}

/// Closing character expected after an opening operator. `Some(None)` marks a
/// standalone separator.
fn operator_closer(ch: char) -> Option<Option<char>> {
    match ch {
        '"' => Some(Some('"')),
        '(' => Some(Some(')')),
        '<' => Some(Some('>')),
        ':' => Some(Some(';')),
        ',' | ';' => Some(None),
        _ => None,
    }
}

#[derive(Default)]
struct Tokenizer {
    tokens: Vec<Token>,
    expecting: Option<char>,
    escaped: bool,
    /// Index of the text token currently being extended.
    current: Option<usize>,
}

impl Tokenizer {
    fn tokenize(input: &str) -> Vec<Token> {
        let mut tokenizer = Self::default();
        let mut chars = input.chars().peekable();
        while let Some(ch) = chars.next() {
            tokenizer.check_char(ch, chars.peek().copied());
        }

        tokenizer
            .tokens
            .into_iter()
            .filter_map(|mut token| {
                let trimmed = token.value.trim();
                if trimmed.is_empty() {
                    return None;
                }
                if trimmed.len() != token.value.len() {
                    token.value = trimmed.to_string();
                }
                Some(token)
            })
            .collect()
    }

    fn push_operator(&mut self, ch: char, no_break: bool) {
        self.tokens.push(Token {
            kind: TokenKind::Operator,
            value: ch.to_string(),
            no_break,
        });
        self.current = None;
    }

    fn check_char(&mut self, ch: char, next: Option<char>) {
        if !self.escaped {
            if self.expecting == Some(ch) {
                let no_break =
                    next.is_some_and(|n| !matches!(n, ' ' | '\t' | '\r' | '\n' | ',' | ';'));
                self.push_operator(ch, no_break);
                self.expecting = None;
                return;
            }
            if self.expecting.is_none() {
                if let Some(closer) = operator_closer(ch) {
                    self.push_operator(ch, false);
                    self.expecting = closer;
                    return;
                }
            }
            if self.expecting == Some('"') && ch == '\\' {
                self.escaped = true;
                return;
            }
        }

        let index = match self.current {
            Some(index) => index,
            None => {
                self.tokens.push(Token {
                    kind: TokenKind::Text,
                    value: String::new(),
                    no_break: false,
                });
                let index = self.tokens.len() - 1;
                self.current = Some(index);
                index
            }
        };

        let ch = if ch == '\n' { ' ' } else { ch };
        if ch == ' ' || ch == '\t' || !ch.is_control() {
            self.tokens[index].value.push(ch);
        }
        self.escaped = false;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bucket {
    Address,
    Comment,
    Group,
    Text,
}

#[derive(Default)]
struct Buckets {
    address: Vec<String>,
    comment: Vec<String>,
    group: Vec<String>,
    text: Vec<String>,
    /// Parallel to `text`: the entry came from a quoted string.
    text_quoted: Vec<bool>,
}

impl Buckets {
    fn get_mut(&mut self, bucket: Bucket) -> &mut Vec<String> {
        match bucket {
            Bucket::Address => &mut self.address,
            Bucket::Comment => &mut self.comment,
            Bucket::Group => &mut self.group,
            Bucket::Text => &mut self.text,
        }
    }

    /// Use comments as the display name when nothing else is there.
    fn promote_comments(&mut self) {
        if self.text.is_empty() && !self.comment.is_empty() {
            self.text = std::mem::take(&mut self.comment);
            self.text_quoted = vec![false; self.text.len()];
        }
    }

    /// Pull a bare address out of unquoted free text.
    fn extract_address_from_text(&mut self) {
        for i in (0..self.text.len()).rev() {
            if !self.text_quoted[i] && RE_BARE_ADDRESS.is_match(&self.text[i]) {
                self.address.push(self.text.remove(i));
                self.text_quoted.remove(i);
                return;
            }
        }

        for i in (0..self.text.len()).rev() {
            if self.text_quoted[i] {
                continue;
            }
            let Some(found) = RE_EMBEDDED_ADDRESS.find(&self.text[i]) else {
                continue;
            };
            let address = found.as_str().trim().to_string();
            let rest = format!(
                "{} {}",
                &self.text[i][..found.start()],
                &self.text[i][found.end()..]
            );
            self.text[i] = rest.trim().to_string();
            self.address.push(address);
            return;
        }
    }
}

/// Parse an address list header value into mailboxes and groups.
///
/// Never fails: unparseable input yields whatever could be recovered, possibly
/// nothing.
pub fn parse_address_list(input: &str) -> Vec<Address> {
    parse_with_depth(input, 0)
}

/// Parse and flatten groups into their members.
pub fn parse_mailboxes(input: &str) -> Vec<Mailbox> {
    Address::flatten(&parse_address_list(input))
}

fn parse_with_depth(input: &str, depth: usize) -> Vec<Address> {
    if depth > MAX_GROUP_DEPTH {
        return Vec::new();
    }

    let tokens = Tokenizer::tokenize(input);
    let mut result = Vec::new();
    for entry in tokens.split(|t| t.is_operator(",") || t.is_operator(";")) {
        if entry.is_empty() {
            continue;
        }
        result.extend(parse_entry(entry, depth));
    }
    result
}

fn parse_entry(tokens: &[Token], depth: usize) -> Vec<Address> {
    let mut buckets = Buckets::default();
    let mut state = Bucket::Text;
    let mut is_group = false;
    let mut in_quotes = false;
    let mut prev: Option<&Token> = None;

    for token in tokens {
        if token.kind == TokenKind::Operator {
            match token.value.as_str() {
                "<" => {
                    state = Bucket::Address;
                    in_quotes = false;
                }
                "(" => {
                    state = Bucket::Comment;
                    in_quotes = false;
                }
                ":" => {
                    state = Bucket::Group;
                    is_group = true;
                    in_quotes = false;
                }
                "\"" => {
                    state = Bucket::Text;
                    in_quotes = !in_quotes;
                }
                _ => {
                    state = Bucket::Text;
                    in_quotes = false;
                }
            }
        } else {
            let value = if state == Bucket::Address {
                RE_ANGLE_PREFIX.replace(&token.value, "").into_owned()
            } else {
                token.value.clone()
            };

            let glued = prev.is_some_and(|p| p.no_break);
            let bucket = buckets.get_mut(state);
            if glued && !bucket.is_empty() {
                if let Some(last) = bucket.last_mut() {
                    last.push_str(&value);
                }
                if state == Bucket::Text && in_quotes {
                    if let Some(last) = buckets.text_quoted.last_mut() {
                        *last = true;
                    }
                }
            } else {
                bucket.push(value);
                if state == Bucket::Text {
                    buckets.text_quoted.push(in_quotes);
                }
            }
        }
        prev = Some(token);
    }

    buckets.promote_comments();

    if is_group {
        let name = decode_words(&buckets.text.join(" "));
        let mut members = Vec::new();
        if !buckets.group.is_empty() {
            for member in parse_with_depth(&buckets.group.join(","), depth + 1) {
                match member {
                    Address::Mailbox(mailbox) => members.push(mailbox),
                    Address::Group { group, .. } => members.extend(group),
                }
            }
        }
        return vec![Address::Group {
            name,
            group: members,
        }];
    }

    if buckets.address.is_empty() && !buckets.text.is_empty() {
        buckets.extract_address_from_text();
        buckets.promote_comments();
    }

    if buckets.address.len() > 1 {
        let extra: Vec<String> = buckets.address.drain(1..).collect();
        buckets.text.extend(extra);
    }

    let text = buckets.text.join(" ");
    let address = buckets.address.join(" ");

    if address.is_empty() && RE_SINGLE_ENCODED_WORD.is_match(text.trim()) {
        let reparsed = parse_with_depth(&decode_words(text.trim()), depth + 1);
        if !reparsed.is_empty() {
            return reparsed;
        }
    }

    let mut address = if address.is_empty() { text.clone() } else { address };
    let mut name = decode_words(if text.is_empty() { &address } else { &text });

    if address == name {
        if address.contains('@') {
            name.clear();
        } else {
            address.clear();
        }
    }

    if address.is_empty() && name.is_empty() {
        return Vec::new();
    }

    vec![Address::Mailbox(Mailbox { name, address })]
}
