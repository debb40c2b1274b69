//! Structured view of a single message.

use super::record::MessageKey;
use crate::parser::mime;

/// One header field. Names keep their original case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Case-insensitive name comparison.
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// A leaf of the body tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyPart {
    /// Lowercased MIME type, e.g. `text/plain`.
    pub content_type: String,
    /// `charset` parameter of the part's content type.
    pub charset: Option<String>,
    /// Lowercased `Content-Transfer-Encoding`.
    pub transfer_encoding: Option<String>,
    /// The part's own headers (empty for a flat body, whose headers are the
    /// message headers).
    pub headers: Vec<Header>,
    /// Undecoded payload bytes.
    pub payload: Vec<u8>,
}

impl BodyPart {
    /// Whether the part carries plain text that the scanner searches.
    pub fn is_plain_text(&self) -> bool {
        self.content_type == "text/plain"
    }

    /// Payload with transfer encoding and charset resolved.
    pub fn text(&self) -> String {
        mime::decode_body(
            &self.payload,
            self.transfer_encoding.as_deref(),
            self.charset.as_deref(),
        )
    }
}

/// Message body: one flat part, or the parts of a `multipart/*` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Flat(BodyPart),
    Multipart(Vec<BodyPart>),
}

/// A parsed message: ordered headers plus body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuredMessage {
    /// Offset of the source record in the mailbox.
    pub offset: u64,
    /// Headers in original order; duplicates are kept.
    pub headers: Vec<Header>,
    pub body: Body,
}

impl StructuredMessage {
    /// First value of header `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|h| h.is(name))
            .map(|h| h.value.as_str())
    }

    /// From / Subject / Date, as reported alongside matches.
    pub fn key(&self) -> MessageKey {
        MessageKey {
            from: self.header("from").map(String::from),
            subject: self.header("subject").map(String::from),
            date: self.header("date").map(String::from),
        }
    }

    /// Searchable parts with their index in the body: the flat body (index
    /// 0), or the `text/plain` parts of a multipart body.
    pub fn searchable_parts(&self) -> Vec<(usize, &BodyPart)> {
        match &self.body {
            Body::Flat(part) => vec![(0, part)],
            Body::Multipart(parts) => parts
                .iter()
                .enumerate()
                .filter(|(_, p)| p.is_plain_text())
                .collect(),
        }
    }

    /// Parts whose text is shown for a matching message.
    pub fn text_parts(&self) -> Vec<&BodyPart> {
        self.searchable_parts()
            .into_iter()
            .map(|(_, part)| part)
            .collect()
    }
}
