//! `mimeShell`: a tolerant MIME email decoder.
//!
//! Turns raw RFC 822/2045/2046/2047/2183/2231/3676 message bytes into a
//! [`Message`] with decoded headers, addresses, text and HTML bodies, and
//! attachments (including those of embedded messages).
//!
//! ```
//! let msg = mimeshell::parse(
//!     "From: Ann <ann@example.com>\nSubject: Hi\n\nHello\n",
//!     mimeshell::ParseOptions::default(),
//! )
//! .unwrap();
//! assert_eq!(msg.subject.as_deref(), Some("Hi"));
//! assert_eq!(msg.text.as_deref(), Some("Hello\n"));
//! ```

pub mod config;
pub mod decode;
pub mod error;
pub mod export;
pub mod model;
pub mod parser;
pub mod text;

pub use error::{MimeError, Result};
pub use model::address::{Address, Mailbox};
pub use model::attachment::{Attachment, AttachmentContent, AttachmentEncoding};
pub use model::message::{Header, Message, RawHeaderLine};
pub use parser::{parse, parse_reader, MessageParser, ParseOptions};
