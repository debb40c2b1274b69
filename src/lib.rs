//! `mboxscan`: streaming search over MBOX files of any size.
//!
//! The mailbox is split message by message without building an index
//! ([`parser::mbox`]), each message is turned into ordered headers plus a
//! flat or multipart body ([`parser::message`]), and a pattern is applied to
//! headers and plain-text parts ([`search`]). Results go to a
//! [`report::MatchSink`]. [`pipeline`] ties the stages together.

pub mod config;
pub mod error;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod report;
pub mod search;
