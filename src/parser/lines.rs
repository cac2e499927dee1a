//! Line splitting over an in-memory message buffer.
//!
//! This is the only place where `\n` versus `\r\n` is resolved; everything
//! above it sees lines with their terminators removed.

/// A line borrowed from the input buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawLine<'a> {
    /// Line content without trailing `\r`/`\n` bytes.
    pub bytes: &'a [u8],
    /// `true` when this line reaches the end of the buffer.
    pub is_final: bool,
}

/// Read one line starting at `position`.
///
/// Returns `(line, new_position, is_final)`. Trailing `\r` and `\n` bytes are
/// excluded from `line` but consumed. Bytes inside the line (NUL, lone `\r`
/// followed by text, 8-bit data) are left untouched.
pub fn read_line(buffer: &[u8], position: usize) -> (&[u8], usize, bool) {
    let start = position.min(buffer.len());
    let rest = &buffer[start..];

    let (consumed, mut end) = match rest.iter().position(|&b| b == b'\n') {
        Some(nl) => (nl + 1, nl),
        None => (rest.len(), rest.len()),
    };
    while end > 0 && rest[end - 1] == b'\r' {
        end -= 1;
    }

    let new_position = start + consumed;
    (&rest[..end], new_position, new_position >= buffer.len())
}

/// Iterator over all lines of a buffer.
#[derive(Debug, Clone)]
pub struct LineReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> LineReader<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }
}

impl<'a> Iterator for LineReader<'a> {
    type Item = RawLine<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.buffer.len() {
            return None;
        }
        let (bytes, position, is_final) = read_line(self.buffer, self.position);
        self.position = position;
        Some(RawLine { bytes, is_final })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_line_lf() {
        let buf = b"one\ntwo\n";
        assert_eq!(read_line(buf, 0), (&b"one"[..], 4, false));
        assert_eq!(read_line(buf, 4), (&b"two"[..], 8, true));
    }

    #[test]
    fn test_read_line_crlf_and_unterminated() {
        let buf = b"one\r\ntwo";
        assert_eq!(read_line(buf, 0), (&b"one"[..], 5, false));
        assert_eq!(read_line(buf, 5), (&b"two"[..], 8, true));
    }

    #[test]
    fn test_inner_cr_kept() {
        let buf = b"a\rb\r\r\n";
        assert_eq!(read_line(buf, 0), (&b"a\rb"[..], 6, true));
    }

    #[test]
    fn test_iterator_mixed_endings() {
        let lines: Vec<_> = LineReader::new(b"Subject: x\r\n\nbody\r\n\x00bin")
            .map(|l| l.bytes.to_vec())
            .collect();
        assert_eq!(
            lines,
            vec![
                b"Subject: x".to_vec(),
                b"".to_vec(),
                b"body".to_vec(),
                b"\x00bin".to_vec()
            ]
        );
    }

    #[test]
    fn test_final_flag_only_on_last() {
        let flags: Vec<bool> = LineReader::new(b"a\nb\nc\n").map(|l| l.is_final).collect();
        assert_eq!(flags, vec![false, false, true]);
    }

    #[test]
    fn test_empty_buffer() {
        assert_eq!(LineReader::new(b"").count(), 0);
    }
}
