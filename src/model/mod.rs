//! Output data model: messages, addresses, and attachments.

pub mod address;
pub mod attachment;
pub mod message;
