//! Export functionality: decoded attachments.

pub mod attachment;
