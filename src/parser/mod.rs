//! MIME message parsing: line splitting, headers, encoded words, address
//! lists, the part tree, and message assembly.

pub mod address;
pub mod encoded_word;
pub mod header;
pub mod lines;
pub mod message;
pub mod node;
pub mod options;

pub use address::parse_address_list;
pub use encoded_word::decode_words;
pub use message::{parse, parse_reader, MessageParser};
pub use options::ParseOptions;
