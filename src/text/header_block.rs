//! Header summaries printed in front of an embedded message's body.

use crate::model::address::Address;
use crate::model::message::Message;

use super::html::escape_html;

fn join_addresses(list: &[Address]) -> String {
    list.iter()
        .map(Address::display)
        .collect::<Vec<_>>()
        .join(", ")
}

/// `(label, value)` rows for the fields that are present, in display order.
fn header_rows(message: &Message) -> Vec<(&'static str, String)> {
    let mut rows = Vec::new();
    if let Some(from) = &message.from {
        rows.push(("From", from.display()));
    }
    if let Some(subject) = &message.subject {
        rows.push(("Subject", subject.clone()));
    }
    if let Some(date) = &message.date {
        rows.push(("Date", date.clone()));
    }
    for (label, list) in [("To", &message.to), ("Cc", &message.cc), ("Bcc", &message.bcc)] {
        if !list.is_empty() {
            rows.push((label, join_addresses(list)));
        }
    }
    rows
}

/// Plain-text header block: a dashed rule, one aligned `Key: value` line per
/// field, and a closing rule.
pub fn format_text_header(message: &Message) -> String {
    let rows = header_rows(message);
    let width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0) + 1;

    let lines: Vec<String> = rows
        .iter()
        .map(|(label, value)| format!("{:<width$} {value}", format!("{label}:")))
        .collect();

    let rule_len = lines
        .iter()
        .map(|l| l.chars().count())
        .max()
        .unwrap_or(0)
        .clamp(20, 76);
    let rule = "-".repeat(rule_len);

    let mut out = String::new();
    out.push_str(&rule);
    out.push('\n');
    for line in &lines {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str(&rule);
    out.push('\n');
    out
}

/// HTML header block with one escaped row per field.
pub fn format_html_header(message: &Message) -> String {
    let mut out = String::from("<div class=\"mime-email-header\">\n");
    for (label, value) in header_rows(message) {
        out.push_str(&format!(
            "<div class=\"mime-email-header-row\">\
             <span class=\"mime-email-header-key\">{label}</span> \
             <span class=\"mime-email-header-value\">{}</span></div>\n",
            escape_html(&value)
        ));
    }
    out.push_str("</div>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::address::Mailbox;

    fn sample() -> Message {
        Message {
            from: Some(Mailbox::new("Ann", "ann@example.com").into()),
            subject: Some("Q3 <report>".into()),
            to: vec![
                Mailbox::new("", "bob@example.com").into(),
                Mailbox::new("Cy", "cy@example.com").into(),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_text_header_aligned() {
        let block = format_text_header(&sample());
        let lines: Vec<&str> = block.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].chars().all(|c| c == '-'));
        assert_eq!(lines[1], "From:    Ann <ann@example.com>");
        assert_eq!(lines[2], "Subject: Q3 <report>");
        assert_eq!(lines[3], "To:      bob@example.com, Cy <cy@example.com>");
        assert_eq!(lines[4], lines[0]);
    }

    #[test]
    fn test_html_header_escaped() {
        let block = format_html_header(&sample());
        assert!(block.starts_with("<div class=\"mime-email-header\">"));
        assert!(block.contains("Q3 &lt;report&gt;"));
        assert!(block.contains("Ann &lt;ann@example.com&gt;"));
        assert!(!block.contains("Cc"));
    }
}
