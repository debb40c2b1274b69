//! Email parsing: streaming MBOX segmenter, message model adapter, header
//! decoding and body decoding.

pub mod header;
pub mod mbox;
pub mod message;
pub mod mime;
