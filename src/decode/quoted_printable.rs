//! Quoted-printable decoder for Content-Transfer-Encoding (RFC 2045 §6.7).

/// Raw text is decoded once this many bytes have been buffered.
const CHUNK_SIZE: usize = 100 * 1024;

const HEX_DECODE: [i8; 256] = {
    let mut t = [-1i8; 256];
    let mut i = 0u8;
    while i < 10 {
        t[(b'0' + i) as usize] = i as i8;
        i += 1;
    }
    let mut i = 0u8;
    while i < 6 {
        t[(b'A' + i) as usize] = (10 + i) as i8;
        t[(b'a' + i) as usize] = (10 + i) as i8;
        i += 1;
    }
    t
};

fn hex_value(b: Option<&u8>) -> Option<u8> {
    let v = HEX_DECODE[*b? as usize];
    (v >= 0).then_some(v as u8)
}

/// Decode a complete quoted-printable buffer into `out`.
///
/// Soft line breaks (`=\r\n`, `=\n`) vanish, `=XX` becomes one byte, and an
/// `=` not followed by two hex digits is kept literally.
pub fn decode_into(input: &[u8], out: &mut Vec<u8>) {
    let mut i = 0;
    while i < input.len() {
        let b = input[i];
        if b != b'=' {
            out.push(b);
            i += 1;
            continue;
        }
        let rest = &input[i + 1..];
        if rest.starts_with(b"\r\n") {
            i += 3;
            continue;
        }
        if rest.starts_with(b"\n") {
            i += 2;
            continue;
        }
        match (hex_value(rest.first()), hex_value(rest.get(1))) {
            (Some(hi), Some(lo)) => {
                out.push((hi << 4) | lo);
                i += 3;
            }
            _ => {
                out.push(b'=');
                i += 1;
            }
        }
    }
}

/// Length of a trailing sequence that could still become an escape or a
/// soft line break once more input arrives: `=`, `=X` (hex) or `=\r`.
fn pending_tail_len(buf: &[u8]) -> usize {
    match buf {
        [.., b'='] => 1,
        [.., b'=', b'\r'] => 2,
        [.., b'=', x] if HEX_DECODE[*x as usize] >= 0 => 2,
        _ => 0,
    }
}

/// Incremental quoted-printable body decoder.
///
/// Text is buffered across lines and decoded in chunks; a chunk never ends
/// inside an escape or soft line break, so the result does not depend on
/// where the input was split.
#[derive(Debug)]
pub struct QuotedPrintableDecoder {
    buffer: Vec<u8>,
    decoded: Vec<u8>,
    chunk_size: usize,
}

impl Default for QuotedPrintableDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl QuotedPrintableDecoder {
    pub fn new() -> Self {
        Self::with_chunk_size(CHUNK_SIZE)
    }

    pub(crate) fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            buffer: Vec::new(),
            decoded: Vec::new(),
            chunk_size: chunk_size.max(1),
        }
    }

    /// Feed one body line (terminator already stripped); a `\n` is implied.
    pub fn update(&mut self, line: &[u8]) {
        self.push(line);
        self.push(b"\n");
    }

    /// Feed raw encoded bytes with no implied terminator.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
        if self.buffer.len() < self.chunk_size {
            return;
        }

        let keep = pending_tail_len(&self.buffer);
        if keep == self.buffer.len() {
            return;
        }
        let tail = self.buffer.split_off(self.buffer.len() - keep);
        decode_into(&self.buffer, &mut self.decoded);
        self.buffer = tail;
    }

    /// Decode the buffered remainder and return the full decoded body.
    pub fn finalize(mut self) -> Vec<u8> {
        if !self.buffer.is_empty() {
            decode_into(&self.buffer, &mut self.decoded);
        }
        self.decoded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn decode_all(input: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        decode_into(input, &mut out);
        out
    }

    #[test]
    fn test_decode_escapes() {
        assert_eq!(decode_all(b"caf=C3=A9"), "café".as_bytes());
        assert_eq!(decode_all(b"a=3Db"), b"a=b");
        assert_eq!(decode_all(b"lower=c3=a9"), "loweré".as_bytes());
    }

    #[test]
    fn test_soft_line_breaks() {
        assert_eq!(decode_all(b"long =\nline"), b"long line");
        assert_eq!(decode_all(b"long =\r\nline"), b"long line");
    }

    #[test]
    fn test_invalid_escape_passes_through() {
        assert_eq!(decode_all(b"1=G2"), b"1=G2");
        assert_eq!(decode_all(b"end="), b"end=");
        assert_eq!(decode_all(b"x=4"), b"x=4");
    }

    #[test]
    fn test_decoder_lines() {
        let mut dec = QuotedPrintableDecoder::new();
        dec.update(b"Hola =");
        dec.update(b"mundo=21");
        assert_eq!(dec.finalize(), b"Hola mundo!\n");
    }

    #[test]
    fn test_decoder_empty() {
        assert!(QuotedPrintableDecoder::new().finalize().is_empty());
    }

    #[test]
    fn test_pending_tail() {
        assert_eq!(pending_tail_len(b"abc="), 1);
        assert_eq!(pending_tail_len(b"abc=4"), 2);
        assert_eq!(pending_tail_len(b"abc=\r"), 2);
        assert_eq!(pending_tail_len(b"abc=G"), 0);
        assert_eq!(pending_tail_len(b"abc"), 0);
    }

    #[test]
    fn test_byte_at_a_time_matches_whole() {
        let input = b"Caf=C3=A9 =\r\ncon le=C3=B1a =3D ok=\nfin=ZZ=";
        let mut whole = QuotedPrintableDecoder::new();
        whole.push(input);
        let mut split = QuotedPrintableDecoder::with_chunk_size(1);
        for b in input.iter() {
            split.push(std::slice::from_ref(b));
        }
        assert_eq!(split.finalize(), whole.finalize());
    }

    proptest! {
        #[test]
        fn test_chunking_invariance(
            input in proptest::collection::vec(
                prop_oneof![
                    Just(b'='), Just(b'\r'), Just(b'\n'), Just(b'A'),
                    Just(b'f'), Just(b'3'), Just(b'G'), Just(b' '),
                ],
                0..200,
            ),
            step in 1usize..7,
        ) {
            let mut whole = QuotedPrintableDecoder::new();
            whole.push(&input);
            let mut split = QuotedPrintableDecoder::with_chunk_size(1);
            for piece in input.chunks(step) {
                split.push(piece);
            }
            prop_assert_eq!(split.finalize(), whole.finalize());
        }
    }
}
