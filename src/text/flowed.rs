//! `format=flowed` text (RFC 3676).

/// Signature separator; never treated as a soft break.
const SIGNATURE_MARKER: &str = "-- ";

/// Rejoin soft-wrapped lines.
///
/// A line ending in a space continues on the next line. With `delsp` that
/// trailing space is removed on join. Space-stuffing (one leading space) is
/// removed from every resulting line.
pub fn decode_flowed(text: &str, delsp: bool) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut continues = false;

    for line in text.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);

        match lines.last_mut() {
            Some(last) if continues => {
                if delsp && last.ends_with(' ') {
                    last.pop();
                }
                last.push_str(line);
            }
            _ => lines.push(line.to_string()),
        }

        continues = line.ends_with(' ') && line != SIGNATURE_MARKER;
    }

    lines
        .iter()
        .map(|line| line.strip_prefix(' ').unwrap_or(line))
        .collect::<Vec<_>>()
        .join("\n")
}
