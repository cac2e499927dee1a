//! Centralized error types for mimeShell.
//!
//! Only structural limits are errors. Malformed content (unknown charsets,
//! broken base64, bad escapes, unparseable dates) is recovered where it is
//! found and never reaches this type.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mimeShell library.
#[derive(Error, Debug)]
pub enum MimeError {
    /// A MIME part would be nested deeper than the configured limit.
    #[error("Maximum nesting depth of {limit} exceeded")]
    NestingTooDeep { limit: u32 },

    /// The header block of a single part exceeds the configured size.
    #[error("Header block exceeds the maximum size of {limit} bytes")]
    HeadersTooLarge { limit: usize },

    /// The requested attachment output encoding is not known.
    #[error("Unsupported attachment encoding: {0}")]
    UnsupportedAttachmentEncoding(String),

    /// `parse()` was called a second time on the same parser instance.
    #[error("Parser instance was already used for a message")]
    AlreadyStarted,

    /// I/O error with the associated path (or `<stream>` for readers).
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias for `Result<T, MimeError>`.
pub type Result<T> = std::result::Result<T, MimeError>;

impl MimeError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Allow `?` on `std::io::Error` when no path context is available.
impl From<std::io::Error> for MimeError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<stream>"),
            source,
        }
    }
}
