//! Decoded attachments.
//!
//! Unlike inline text parts, attachment content is handed out in the output
//! encoding chosen through [`AttachmentEncoding`].

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::decode::base64::decode_base64;
use crate::error::MimeError;

/// How attachment content is represented in the parsed [`crate::Message`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentEncoding {
    /// Raw decoded bytes.
    #[default]
    ArrayBuffer,
    /// Standard base64 text.
    Base64,
    /// UTF-8 decoded text. Only meaningful for textual attachments.
    Utf8,
}

impl FromStr for AttachmentEncoding {
    type Err = MimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "arraybuffer" | "binary" | "bytes" => Ok(Self::ArrayBuffer),
            "base64" => Ok(Self::Base64),
            "utf8" | "utf-8" => Ok(Self::Utf8),
            _ => Err(MimeError::UnsupportedAttachmentEncoding(s.to_string())),
        }
    }
}

impl std::fmt::Display for AttachmentEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ArrayBuffer => "arraybuffer",
            Self::Base64 => "base64",
            Self::Utf8 => "utf8",
        };
        f.write_str(name)
    }
}

/// Attachment payload in its output encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttachmentContent {
    Bytes(Vec<u8>),
    Base64(String),
    Utf8(String),
}

impl AttachmentContent {
    /// Wrap decoded bytes according to `encoding`.
    pub fn encode(bytes: Vec<u8>, encoding: AttachmentEncoding) -> Self {
        use base64::Engine;

        match encoding {
            AttachmentEncoding::ArrayBuffer => Self::Bytes(bytes),
            AttachmentEncoding::Base64 => {
                Self::Base64(base64::engine::general_purpose::STANDARD.encode(bytes))
            }
            AttachmentEncoding::Utf8 => Self::Utf8(String::from_utf8_lossy(&bytes).into_owned()),
        }
    }

    /// Recover the decoded bytes regardless of representation.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Bytes(bytes) => bytes.clone(),
            Self::Base64(text) => decode_base64(text.as_bytes()),
            Self::Utf8(text) => text.as_bytes().to_vec(),
        }
    }
}

/// A non-inline MIME part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Filename from `Content-Disposition` (or the `name` Content-Type parameter), decoded.
    pub filename: Option<String>,

    /// Lowercased MIME type (e.g. `"image/jpeg"`, `"application/pdf"`).
    pub mime_type: String,

    /// `Content-Disposition` value (`"attachment"`, `"inline"`).
    pub disposition: Option<String>,

    /// `Content-ID` for parts referenced from HTML.
    pub content_id: Option<String>,

    /// `Content-Description`.
    pub description: Option<String>,

    /// Calendar method (`REQUEST`, `CANCEL`, ...) for `text/calendar` parts.
    pub method: Option<String>,

    /// `true` if the part lives under a `multipart/related` node.
    pub related: bool,

    /// Decoded content.
    pub content: AttachmentContent,
}

impl Attachment {
    /// Name of the output encoding applied to `content`, if any.
    pub fn encoding(&self) -> Option<&'static str> {
        match self.content {
            AttachmentContent::Bytes(_) => None,
            AttachmentContent::Base64(_) => Some("base64"),
            AttachmentContent::Utf8(_) => Some("utf8"),
        }
    }

    /// Decoded size in bytes.
    pub fn size(&self) -> usize {
        match &self.content {
            AttachmentContent::Bytes(bytes) => bytes.len(),
            AttachmentContent::Utf8(text) => text.len(),
            AttachmentContent::Base64(text) => {
                crate::decode::base64::decoded_len(text.trim_end().as_bytes())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_from_str() {
        assert_eq!(
            "ArrayBuffer".parse::<AttachmentEncoding>().unwrap(),
            AttachmentEncoding::ArrayBuffer
        );
        assert_eq!(
            "base64".parse::<AttachmentEncoding>().unwrap(),
            AttachmentEncoding::Base64
        );
        assert_eq!(
            "utf-8".parse::<AttachmentEncoding>().unwrap(),
            AttachmentEncoding::Utf8
        );
    }

    #[test]
    fn test_unsupported_encoding_is_error() {
        let err = "hex".parse::<AttachmentEncoding>().unwrap_err();
        assert!(matches!(err, MimeError::UnsupportedAttachmentEncoding(ref s) if s == "hex"));
    }

    #[test]
    fn test_content_encode_and_size() {
        let data = b"%PDF-1.4 \x00\xff".to_vec();
        let b64 = AttachmentContent::encode(data.clone(), AttachmentEncoding::Base64);
        assert_eq!(b64.to_bytes(), data);

        let att = Attachment {
            filename: Some("a.pdf".into()),
            mime_type: "application/pdf".into(),
            disposition: Some("attachment".into()),
            content_id: None,
            description: None,
            method: None,
            related: false,
            content: b64,
        };
        assert_eq!(att.size(), data.len());
        assert_eq!(att.encoding(), Some("base64"));
    }

    #[test]
    fn test_utf8_content() {
        let content = AttachmentContent::encode(b"hello".to_vec(), AttachmentEncoding::Utf8);
        assert_eq!(content, AttachmentContent::Utf8("hello".into()));
    }
}
