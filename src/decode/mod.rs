//! Content-transfer decoders and charset handling.
//!
//! Every decoder receives body lines with their terminators already stripped
//! and yields the decoded bytes once, at `finalize()`.

pub mod base64;
pub mod charset;
pub mod quoted_printable;

use self::base64::Base64Decoder;
use self::quoted_printable::QuotedPrintableDecoder;

/// Copies lines verbatim, restoring a `\n` after each one.
///
/// Used for `7bit`, `8bit`, `binary` and any unknown encoding.
#[derive(Debug, Default)]
pub struct PassThroughDecoder {
    content: Vec<u8>,
}

impl PassThroughDecoder {
    pub fn update(&mut self, line: &[u8]) {
        self.content.extend_from_slice(line);
        self.content.push(b'\n');
    }

    pub fn finalize(self) -> Vec<u8> {
        self.content
    }
}

/// The decoder selected by a part's `Content-Transfer-Encoding`.
#[derive(Debug)]
pub enum ContentDecoder {
    PassThrough(PassThroughDecoder),
    Base64(Base64Decoder),
    QuotedPrintable(QuotedPrintableDecoder),
}

impl ContentDecoder {
    /// Pick a decoder for an encoding name (case-insensitive, whitespace-trimmed).
    pub fn for_encoding(encoding: &str) -> Self {
        let encoding = encoding.trim();
        if encoding.eq_ignore_ascii_case("base64") {
            Self::Base64(Base64Decoder::new())
        } else if encoding.eq_ignore_ascii_case("quoted-printable") {
            Self::QuotedPrintable(QuotedPrintableDecoder::new())
        } else {
            Self::PassThrough(PassThroughDecoder::default())
        }
    }

    pub fn update(&mut self, line: &[u8]) {
        match self {
            Self::PassThrough(d) => d.update(line),
            Self::Base64(d) => d.update(line),
            Self::QuotedPrintable(d) => d.update(line),
        }
    }

    pub fn finalize(self) -> Vec<u8> {
        match self {
            Self::PassThrough(d) => d.finalize(),
            Self::Base64(d) => d.finalize(),
            Self::QuotedPrintable(d) => d.finalize(),
        }
    }
}
