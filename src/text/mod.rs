//! Body text transforms: HTML entities, HTML/text conversion, flowed text,
//! and embedded-message header blocks.

pub mod entities;
pub mod flowed;
pub mod header_block;
pub mod html;

pub use entities::decode_html_entities;
pub use flowed::decode_flowed;
pub use html::{escape_html, html_to_text, text_to_html};
