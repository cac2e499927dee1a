//! Message assembly.
//!
//! Drives the line reader into a [`NodeTree`], then walks the finished tree
//! once (children before siblings) to sort parts into inline bodies,
//! attachments and embedded messages.

use std::io::Read;

use tracing::debug;

use crate::decode::charset;
use crate::error::{MimeError, Result};
use crate::model::address::Address;
use crate::model::attachment::{Attachment, AttachmentContent};
use crate::model::message::{Header, Message};
use crate::parser::address::{parse_address_list, parse_mailboxes};
use crate::parser::encoded_word::decode_words;
use crate::parser::header::{get_header, normalize_date};
use crate::parser::lines::LineReader;
use crate::parser::node::{MimeNode, NodeId, NodeTree, ROOT};
use crate::parser::options::ParseOptions;
use crate::text::flowed::decode_flowed;
use crate::text::header_block::{format_html_header, format_text_header};
use crate::text::html::{html_to_text, text_to_html};

/// Parse a complete message held in memory.
pub fn parse(input: impl AsRef<[u8]>, options: ParseOptions) -> Result<Message> {
    MessageParser::new(options).parse(input)
}

/// Read `reader` to the end, then parse.
pub fn parse_reader<R: Read>(mut reader: R, options: ParseOptions) -> Result<Message> {
    let mut buffer = Vec::new();
    reader.read_to_end(&mut buffer)?;
    parse(buffer, options)
}

/// A single-use parser.
///
/// The first call to [`MessageParser::parse`] consumes the instance; later
/// calls fail with [`MimeError::AlreadyStarted`].
#[derive(Debug, Default)]
pub struct MessageParser {
    options: ParseOptions,
    started: bool,
    /// Depth of the root part; non-zero for embedded messages.
    root_depth: u32,
}

impl MessageParser {
    pub fn new(options: ParseOptions) -> Self {
        Self {
            options,
            started: false,
            root_depth: 0,
        }
    }

    fn embedded(options: ParseOptions, root_depth: u32) -> Self {
        Self {
            root_depth,
            ..Self::new(options)
        }
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Parse raw message bytes. Strings are taken as UTF-8.
    pub fn parse(&mut self, input: impl AsRef<[u8]>) -> Result<Message> {
        if self.started {
            return Err(MimeError::AlreadyStarted);
        }
        self.started = true;

        let input = input.as_ref();
        let mut tree = NodeTree::new(self.options.max_nesting_depth, self.options.max_headers_size)
            .with_root_depth(self.root_depth);
        for line in LineReader::new(input) {
            tree.feed(line.bytes)?;
        }
        tree.finish();

        let mut collector = BodyCollector::new(&self.options, &tree);
        collector.walk(&mut tree, ROOT, None, false)?;
        let (text, html) = collector.resolve_bodies();

        let root = tree.node_mut(ROOT);
        let headers = std::mem::take(&mut root.headers);
        let header_lines = std::mem::take(&mut root.header_lines);

        debug!(
            bytes = input.len(),
            parts = tree.len(),
            attachments = collector.attachments.len(),
            "Parsed message"
        );

        let mut message = Message {
            header_lines,
            text,
            html,
            attachments: collector.attachments,
            ..Default::default()
        };
        fill_header_fields(&mut message, &headers);
        message.headers = headers;
        Ok(message)
    }
}

/// Inline bodies sharing one logical position in the message.
///
/// Parts of one `multipart/alternative` share a slot, so that their plain and
/// HTML renderings are not both emitted.
#[derive(Debug, Default)]
struct TextSlot {
    key: Option<NodeId>,
    plain: Vec<String>,
    html: Vec<String>,
}

struct BodyCollector<'a> {
    options: &'a ParseOptions,
    force_rfc822_attachments: bool,
    slots: Vec<TextSlot>,
    attachments: Vec<Attachment>,
}

impl<'a> BodyCollector<'a> {
    fn new(options: &'a ParseOptions, tree: &NodeTree) -> Self {
        // Bounce and abuse reports carry the original message as evidence.
        let is_report = tree.iter().any(|node| {
            !node.is_multipart()
                && matches!(
                    node.mime_type(),
                    "message/delivery-status" | "message/feedback-report"
                )
        });
        Self {
            options,
            force_rfc822_attachments: options.force_rfc822_attachments || is_report,
            slots: Vec::new(),
            attachments: Vec::new(),
        }
    }

    fn walk(
        &mut self,
        tree: &mut NodeTree,
        id: NodeId,
        alternative: Option<NodeId>,
        related: bool,
    ) -> Result<()> {
        if let Some(kind) = tree.node(id).multipart.clone() {
            let alternative = if kind == "alternative" {
                Some(id)
            } else {
                alternative
            };
            let related = related || kind == "related";
            for child in tree.node(id).children.clone() {
                self.walk(tree, child, alternative, related)?;
            }
            return Ok(());
        }

        let content = tree.node_mut(id).content.take().unwrap_or_default();
        let node = tree.node(id);

        if self.is_inline_message(node) {
            return self.embed_message(node, &content);
        }
        if is_inline_text(node) {
            self.add_text(node, alternative.unwrap_or(id), &content);
            return Ok(());
        }
        if !content.is_empty() {
            let attachment = self.build_attachment(node, content, related);
            self.attachments.push(attachment);
        }
        Ok(())
    }

    fn is_inline_message(&self, node: &MimeNode) -> bool {
        if self.force_rfc822_attachments || node.mime_type() != "message/rfc822" {
            return false;
        }
        match node.disposition_value().filter(|d| !d.is_empty()) {
            Some(disposition) => disposition == "inline",
            None => !self.options.rfc822_attachments,
        }
    }

    fn slot_mut(&mut self, key: NodeId) -> &mut TextSlot {
        let index = match self.slots.iter().position(|s| s.key == Some(key)) {
            Some(index) => index,
            None => {
                self.slots.push(TextSlot {
                    key: Some(key),
                    ..Default::default()
                });
                self.slots.len() - 1
            }
        };
        &mut self.slots[index]
    }

    fn add_text(&mut self, node: &MimeNode, key: NodeId, content: &[u8]) {
        let mut text = charset::decode_text(node.content_type.param("charset"), content);
        let is_html = node.mime_type() == "text/html";

        let flowed = node
            .content_type
            .param("format")
            .is_some_and(|f| f.eq_ignore_ascii_case("flowed"));
        if !is_html && flowed {
            let delsp = node
                .content_type
                .param("delsp")
                .is_some_and(|d| d.eq_ignore_ascii_case("yes"));
            text = decode_flowed(&text, delsp);
        }

        let slot = self.slot_mut(key);
        if is_html {
            slot.html.push(text);
        } else {
            slot.plain.push(text);
        }
    }

    /// Parse an inline `message/rfc822` part and splice it into this message:
    /// a header summary followed by its bodies, plus all of its attachments.
    ///
    /// The embedded root sits one level below `node`, so a chain of embedded
    /// messages is bounded by the same nesting limit as multipart parts.
    fn embed_message(&mut self, node: &MimeNode, content: &[u8]) -> Result<()> {
        let depth = node.depth + 1;
        let limit = self.options.max_nesting_depth;
        if depth > limit {
            return Err(MimeError::NestingTooDeep { limit });
        }
        debug!(depth, "Parsing embedded message");
        let embedded = MessageParser::embedded(self.options.clone(), depth).parse(content)?;

        let mut slot = TextSlot {
            key: None,
            plain: vec![format_text_header(&embedded)],
            html: vec![format_html_header(&embedded)],
        };
        slot.plain.extend(embedded.text);
        slot.html.extend(embedded.html);
        self.slots.push(slot);
        self.attachments.extend(embedded.attachments);
        Ok(())
    }

    fn build_attachment(&self, node: &MimeNode, content: Vec<u8>, related: bool) -> Attachment {
        let filename = node
            .disposition
            .as_ref()
            .and_then(|d| d.param("filename"))
            .or_else(|| node.content_type.param("name"))
            .filter(|name| !name.is_empty())
            .map(decode_words);

        let mime_type = node.mime_type().to_string();
        let (method, content) = if is_calendar(&mime_type) {
            let method = node
                .content_type
                .param("method")
                .map(|m| m.trim().to_ascii_uppercase())
                .filter(|m| !m.is_empty());
            let text = normalize_calendar(node.content_type.param("charset"), &content);
            (method, text.into_bytes())
        } else {
            (None, content)
        };

        Attachment {
            filename,
            disposition: node
                .disposition_value()
                .filter(|d| !d.is_empty())
                .map(str::to_string),
            related,
            content_id: node.content_id.clone(),
            description: node.description.as_deref().map(decode_words),
            method,
            content: AttachmentContent::encode(content, self.options.attachment_encoding),
            mime_type,
        }
    }

    /// Join each slot, filling in whichever representation is missing.
    fn resolve_bodies(&mut self) -> (Option<String>, Option<String>) {
        if self.slots.is_empty() {
            return (None, None);
        }

        let mut text_parts = Vec::with_capacity(self.slots.len());
        let mut html_parts = Vec::with_capacity(self.slots.len());
        for slot in self.slots.drain(..) {
            let text = if slot.plain.is_empty() {
                join_converted(&slot.html, html_to_text)
            } else {
                slot.plain.join("\n")
            };
            let html = if slot.html.is_empty() {
                join_converted(&slot.plain, text_to_html)
            } else {
                slot.html.join("\n")
            };
            text_parts.push(text);
            html_parts.push(html);
        }
        (Some(text_parts.join("\n")), Some(html_parts.join("\n")))
    }
}

fn join_converted(parts: &[String], convert: fn(&str) -> String) -> String {
    parts
        .iter()
        .map(|part| convert(part))
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_inline_text(node: &MimeNode) -> bool {
    matches!(node.mime_type(), "text/plain" | "text/html")
        && node.disposition_value() != Some("attachment")
}

fn is_calendar(mime_type: &str) -> bool {
    matches!(mime_type, "text/calendar" | "application/ics")
}

/// Calendar data as UTF-8 with `\n` line endings and one trailing newline.
fn normalize_calendar(label: Option<&str>, content: &[u8]) -> String {
    let text = charset::decode_text(label, content);
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut text = text.trim_end_matches('\n').to_string();
    text.push('\n');
    text
}

/// First address of the first `key` header.
fn first_address(headers: &[Header], key: &str) -> Option<Address> {
    get_header(headers, key).and_then(|value| parse_address_list(value).into_iter().next())
}

/// Addresses of every `key` header, in order.
fn all_addresses(headers: &[Header], key: &str) -> Vec<Address> {
    headers
        .iter()
        .filter(|h| h.key == key)
        .flat_map(|h| parse_address_list(&h.value))
        .collect()
}

/// Bare address of the first mailbox in the first `key` header.
fn bare_address(headers: &[Header], key: &str) -> Option<String> {
    get_header(headers, key)
        .and_then(|value| parse_mailboxes(value).into_iter().next())
        .map(|mailbox| mailbox.address)
        .filter(|address| !address.is_empty())
}

fn decoded(headers: &[Header], key: &str) -> Option<String> {
    get_header(headers, key).map(decode_words)
}

fn fill_header_fields(message: &mut Message, headers: &[Header]) {
    message.from = first_address(headers, "from");
    message.sender = first_address(headers, "sender");
    message.delivered_to = bare_address(headers, "delivered-to");
    message.return_path = bare_address(headers, "return-path");
    message.to = all_addresses(headers, "to");
    message.cc = all_addresses(headers, "cc");
    message.bcc = all_addresses(headers, "bcc");
    message.reply_to = all_addresses(headers, "reply-to");
    message.subject = decoded(headers, "subject");
    message.message_id = decoded(headers, "message-id");
    message.in_reply_to = decoded(headers, "in-reply-to");
    message.references = decoded(headers, "references");
    message.date = get_header(headers, "date").map(normalize_date);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::address::Mailbox;
    use crate::model::attachment::AttachmentEncoding;

    fn parse_default(input: &str) -> Message {
        parse(input, ParseOptions::default()).expect("parse")
    }

    #[test]
    fn test_simple_message() {
        let msg = parse_default(
            "From: \"Ann\" <ann@example.com>\r\n\
             To: bob@example.com, Cy <cy@example.com>\r\n\
             Subject: =?utf-8?Q?Caf=C3=A9?=\r\n\
             Date: Thu, 4 Jan 2024 10:00:00 +0000\r\n\
             \r\n\
             Hello\r\n",
        );
        assert_eq!(
            msg.from,
            Some(Address::Mailbox(Mailbox::new("Ann", "ann@example.com")))
        );
        assert_eq!(msg.to.len(), 2);
        assert_eq!(msg.subject.as_deref(), Some("Café"));
        assert_eq!(msg.date.as_deref(), Some("2024-01-04T10:00:00.000Z"));
        assert_eq!(msg.text.as_deref(), Some("Hello\n"));
        assert_eq!(msg.html.as_deref(), Some("<div>Hello<br/></div>"));
        assert!(msg.attachments.is_empty());
    }

    #[test]
    fn test_reuse_is_rejected() {
        let mut parser = MessageParser::default();
        parser.parse("Subject: a\n\nbody").expect("first parse");
        assert!(matches!(
            parser.parse("Subject: b\n\nbody"),
            Err(MimeError::AlreadyStarted)
        ));
    }

    #[test]
    fn test_repeated_recipient_headers_are_merged() {
        let msg = parse_default("To: a@b.com\nCc: c@d.com\nTo: e@f.com, g@h.com\n\nx");
        let to: Vec<_> = msg.to.iter().filter_map(Address::address).collect();
        assert_eq!(to, vec!["a@b.com", "e@f.com", "g@h.com"]);
        assert_eq!(msg.cc.len(), 1);
    }

    #[test]
    fn test_delivered_to_and_return_path() {
        let msg = parse_default(
            "Delivered-To: inbox@example.com\nReturn-Path: <bounce@example.com>\n\nx",
        );
        assert_eq!(msg.delivered_to.as_deref(), Some("inbox@example.com"));
        assert_eq!(msg.return_path.as_deref(), Some("bounce@example.com"));
    }

    #[test]
    fn test_alternative_parts_share_a_slot() {
        let msg = parse_default(
            "Content-Type: multipart/alternative; boundary=alt\n\n\
             --alt\nContent-Type: text/plain\n\nPlain body\n\
             --alt\nContent-Type: text/html\n\n<p>HTML body</p>\n--alt--\n",
        );
        assert_eq!(msg.text.as_deref(), Some("Plain body\n"));
        assert_eq!(msg.html.as_deref(), Some("<p>HTML body</p>\n"));
    }

    #[test]
    fn test_html_only_synthesizes_text() {
        let msg = parse_default("Content-Type: text/html\n\n<p>Hi &amp; bye</p>\n");
        assert_eq!(msg.text.as_deref(), Some("Hi & bye"));
    }

    #[test]
    fn test_flowed_text() {
        let msg = parse_default(
            "Content-Type: text/plain; format=flowed; delsp=no\n\nOne \ntwo\n",
        );
        assert_eq!(msg.text.as_deref(), Some("One two\n"));
    }

    #[test]
    fn test_text_charset_decoding() {
        let msg = parse(
            &b"Content-Type: text/plain; charset=iso-8859-1\n\ncaf\xe9\n"[..],
            ParseOptions::default(),
        )
        .expect("parse");
        assert_eq!(msg.text.as_deref(), Some("café\n"));
    }

    #[test]
    fn test_related_attachment() {
        let msg = parse_default(
            "Content-Type: multipart/related; boundary=r\n\n\
             --r\nContent-Type: text/html\n\n<img src=\"cid:logo\">\n\
             --r\nContent-Type: image/png; name=logo.png\nContent-ID: <logo>\n\
             Content-Transfer-Encoding: base64\n\niVBORw0=\n--r--\n",
        );
        assert_eq!(msg.attachments.len(), 1);
        let att = &msg.attachments[0];
        assert!(att.related);
        assert_eq!(att.content_id.as_deref(), Some("<logo>"));
        assert_eq!(att.filename.as_deref(), Some("logo.png"));
        assert_eq!(att.mime_type, "image/png");
    }

    #[test]
    fn test_calendar_attachment() {
        let msg = parse_default(
            "Content-Type: multipart/mixed; boundary=m\n\n\
             --m\n\nSee invite\n\
             --m\nContent-Type: text/calendar; method=request; charset=utf-8\n\n\
             BEGIN:VCALENDAR\nEND:VCALENDAR\n\n\n--m--\n",
        );
        let att = &msg.attachments[0];
        assert_eq!(att.method.as_deref(), Some("REQUEST"));
        assert_eq!(
            att.content,
            AttachmentContent::Bytes(b"BEGIN:VCALENDAR\nEND:VCALENDAR\n".to_vec())
        );
    }

    #[test]
    fn test_attachment_encoding_base64() {
        let options = ParseOptions {
            attachment_encoding: AttachmentEncoding::Base64,
            ..Default::default()
        };
        let msg = parse(
            "Content-Type: application/octet-stream\nContent-Disposition: attachment; filename=a.bin\n\nabc\n",
            options,
        )
        .expect("parse");
        assert_eq!(msg.attachments[0].content, AttachmentContent::Base64("YWJjCg==".into()));
        assert_eq!(msg.attachments[0].encoding(), Some("base64"));
        assert!(msg.text.is_none());
    }

    #[test]
    fn test_inline_rfc822_is_embedded() {
        let msg = parse_default(
            "Content-Type: multipart/mixed; boundary=m\n\n\
             --m\n\nOuter\n\
             --m\nContent-Type: message/rfc822\n\n\
             From: inner@example.com\nSubject: Inner\n\nInner body\n--m--\n",
        );
        let text = msg.text.expect("text");
        assert!(text.starts_with("Outer\n"));
        assert!(text.contains("Subject: Inner"));
        assert!(text.ends_with("Inner body\n"));
        assert!(msg.attachments.is_empty());
        assert!(msg
            .html
            .expect("html")
            .contains("<div class=\"mime-email-header\">"));
    }

    #[test]
    fn test_rfc822_forced_to_attachment_by_report() {
        let msg = parse_default(
            "Content-Type: multipart/report; boundary=r\n\n\
             --r\n\nDelivery failed\n\
             --r\nContent-Type: message/delivery-status\n\nStatus: 5.0.0\n\
             --r\nContent-Type: message/rfc822\n\nSubject: original\n\nhello\n--r--\n",
        );
        let types: Vec<&str> = msg.attachments.iter().map(|a| a.mime_type.as_str()).collect();
        assert_eq!(types, vec!["message/delivery-status", "message/rfc822"]);
        assert_eq!(msg.text.as_deref(), Some("Delivery failed\n"));
    }

    #[test]
    fn test_rfc822_attachments_option() {
        let options = ParseOptions {
            rfc822_attachments: true,
            ..Default::default()
        };
        let input = "Content-Type: multipart/mixed; boundary=m\n\n\
                     --m\nContent-Type: message/rfc822\n\nSubject: inner\n\nbody\n\
                     --m\nContent-Type: message/rfc822\nContent-Disposition: inline\n\n\
                     Subject: shown\n\nvisible\n--m--\n";
        let msg = parse(input, options).expect("parse");
        assert_eq!(msg.attachments.len(), 1);
        assert!(msg.text.expect("text").contains("visible"));
    }

    #[test]
    fn test_embedded_message_shares_nesting_limit() {
        let options = ParseOptions {
            max_nesting_depth: 2,
            ..Default::default()
        };
        let input = "Content-Type: multipart/mixed; boundary=a\n\n\
                     --a\nContent-Type: message/rfc822\n\n\
                     Content-Type: multipart/mixed; boundary=b\n\n--b\n\ndeep\n--b--\n--a--\n";
        let err = parse(input, options).unwrap_err();
        assert!(matches!(err, MimeError::NestingTooDeep { .. }));
    }

    fn rfc822_chain(levels: usize) -> String {
        let mut input = "Content-Type: message/rfc822\n\n".repeat(levels);
        input.push_str("Subject: innermost\n\nbottom\n");
        input
    }

    #[test]
    fn test_embedded_chain_within_limit() {
        let options = ParseOptions {
            max_nesting_depth: 5,
            ..Default::default()
        };
        let msg = parse(rfc822_chain(5), options).expect("parse");
        let text = msg.text.expect("text");
        assert!(text.contains("Subject: innermost"));
        assert!(text.ends_with("bottom\n"));
    }

    #[test]
    fn test_embedded_chain_beyond_limit_is_fatal() {
        let options = ParseOptions {
            max_nesting_depth: 5,
            ..Default::default()
        };
        let err = parse(rfc822_chain(50), options).unwrap_err();
        assert!(matches!(err, MimeError::NestingTooDeep { limit: 5 }));
    }

    #[test]
    fn test_related_without_content_id() {
        let msg = parse_default(
            "Content-Type: multipart/related; boundary=r\n\n\
             --r\nContent-Type: text/html\n\n<p>hi</p>\n\
             --r\nContent-Type: image/png; name=chart.png\n\
             Content-Transfer-Encoding: base64\n\niVBORw0=\n--r--\n",
        );
        assert_eq!(msg.attachments.len(), 1);
        assert!(msg.attachments[0].related);
        assert_eq!(msg.attachments[0].content_id, None);
    }

    #[test]
    fn test_parse_reader() {
        let data: &[u8] = b"Subject: from reader\n\nbody\n";
        let msg = parse_reader(data, ParseOptions::default()).expect("parse");
        assert_eq!(msg.subject.as_deref(), Some("from reader"));
    }

    #[test]
    fn test_header_lines_are_kept_verbatim() {
        let msg = parse_default("Subject: folded\n  line\nX-Test:  a\n\nbody");
        assert_eq!(msg.header_lines[0].line, "Subject: folded\n  line");
        assert_eq!(msg.headers[0].value, "folded line");
        assert_eq!(msg.header("x-test"), Some("a"));
    }
}
