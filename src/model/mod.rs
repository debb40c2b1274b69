//! Core data model: raw records, structured messages, addresses and matches.

pub mod address;
pub mod message;
pub mod record;
