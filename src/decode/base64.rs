//! Base64 decoding for `Content-Transfer-Encoding: base64` and RFC 2047 `B` words.

/// Buffered characters are decoded once this many have accumulated.
const CHUNK_SIZE: usize = 100 * 1024;

const INVALID: u8 = 0xFF;

const DECODE_TABLE: [u8; 256] = {
    let mut t = [INVALID; 256];
    let mut i = 0u8;
    while i < 26 {
        t[(b'A' + i) as usize] = i;
        t[(b'a' + i) as usize] = 26 + i;
        i += 1;
    }
    let mut i = 0u8;
    while i < 10 {
        t[(b'0' + i) as usize] = 52 + i;
        i += 1;
    }
    t[b'+' as usize] = 62;
    t[b'/' as usize] = 63;
    t
};

/// `true` for characters of the standard alphabet (padding excluded).
pub fn is_base64_char(b: u8) -> bool {
    DECODE_TABLE[b as usize] != INVALID
}

/// Number of bytes `input` decodes to.
///
/// Unpadded input is accepted: a trailing group of 3 or 2 characters yields
/// 2 or 1 bytes. A single dangling character carries no full byte.
pub fn decoded_len(input: &[u8]) -> usize {
    let len = input.len();
    let mut out = len.div_ceil(4) * 3;
    match len % 4 {
        3 => out -= 1,
        2 => out -= 2,
        1 => out -= 3,
        _ => {
            if input.last() == Some(&b'=') {
                out -= 1;
                if len >= 2 && input[len - 2] == b'=' {
                    out -= 1;
                }
            }
        }
    }
    out
}

/// Decode a base64 string with the 4-character to 3-byte table algorithm.
///
/// Characters outside the alphabet count as zero bits; callers strip them
/// first when they can appear (body decoding does, encoded words rarely
/// contain them).
pub fn decode_base64(input: &[u8]) -> Vec<u8> {
    let out_len = decoded_len(input);
    let mut out = Vec::with_capacity(out_len + 3);

    for group in input.chunks(4) {
        let mut quad = [0u8; 4];
        for (slot, &c) in quad.iter_mut().zip(group) {
            let v = DECODE_TABLE[c as usize];
            *slot = if v == INVALID { 0 } else { v };
        }
        out.push((quad[0] << 2) | (quad[1] >> 4));
        out.push((quad[1] << 4) | (quad[2] >> 2));
        out.push((quad[2] << 6) | quad[3]);
    }

    out.truncate(out_len);
    out
}

/// Incremental base64 body decoder.
///
/// Only alphabet characters are buffered, so folding and padding are
/// irrelevant. Decoding happens in 4-aligned chunks; the remainder waits for
/// the next line.
#[derive(Debug)]
pub struct Base64Decoder {
    remainder: Vec<u8>,
    decoded: Vec<u8>,
    chunk_size: usize,
}

impl Default for Base64Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Base64Decoder {
    pub fn new() -> Self {
        Self::with_chunk_size(CHUNK_SIZE)
    }

    pub(crate) fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            remainder: Vec::new(),
            decoded: Vec::new(),
            chunk_size: chunk_size.max(4),
        }
    }

    /// Feed one body line (terminator already stripped).
    pub fn update(&mut self, line: &[u8]) {
        self.remainder
            .extend(line.iter().copied().filter(|&b| is_base64_char(b)));

        if self.remainder.len() >= self.chunk_size {
            let aligned = self.remainder.len() / 4 * 4;
            let tail = self.remainder.split_off(aligned);
            self.decoded.extend(decode_base64(&self.remainder));
            self.remainder = tail;
        }
    }

    /// Decode whatever is left and return the full decoded body.
    pub fn finalize(mut self) -> Vec<u8> {
        if !self.remainder.is_empty() {
            self.decoded.extend(decode_base64(&self.remainder));
        }
        self.decoded
    }
}
