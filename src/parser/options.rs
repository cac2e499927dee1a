//! Parser configuration.

use serde::{Deserialize, Serialize};

use crate::model::attachment::AttachmentEncoding;

pub const DEFAULT_MAX_NESTING_DEPTH: u32 = 256;
pub const DEFAULT_MAX_HEADERS_SIZE: usize = 2 * 1024 * 1024;

/// Limits and output choices for a single parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Deepest allowed MIME part. The root is depth 0.
    pub max_nesting_depth: u32,

    /// Largest accepted header block of a single part, in bytes.
    pub max_headers_size: usize,

    /// Representation of attachment content.
    pub attachment_encoding: AttachmentEncoding,

    /// Treat `message/rfc822` parts without an explicit inline disposition as
    /// attachments.
    pub rfc822_attachments: bool,

    /// Never expand `message/rfc822` parts into the body.
    pub force_rfc822_attachments: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
            max_headers_size: DEFAULT_MAX_HEADERS_SIZE,
            attachment_encoding: AttachmentEncoding::ArrayBuffer,
            rfc822_attachments: false,
            force_rfc822_attachments: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ParseOptions::default();
        assert_eq!(options.max_nesting_depth, 256);
        assert_eq!(options.max_headers_size, 2_097_152);
        assert_eq!(options.attachment_encoding, AttachmentEncoding::ArrayBuffer);
        assert!(!options.rfc822_attachments);
        assert!(!options.force_rfc822_attachments);
    }
}
