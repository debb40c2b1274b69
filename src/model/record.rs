//! Records passed between pipeline stages.

use serde::Serialize;

/// Raw bytes of exactly one message, as cut by the segmenter.
///
/// Starts with the message's own `From ` separator line (when present) and
/// never contains the separator of the following message, so concatenating
/// every record of a mailbox in order reproduces the file byte for byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// Byte offset of the record inside the source.
    pub offset: u64,
    /// Message bytes, line terminators included.
    pub bytes: Vec<u8>,
}

/// The headers a match is reported under.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MessageKey {
    pub from: Option<String>,
    pub subject: Option<String>,
    pub date: Option<String>,
}

/// Where in a message a pattern hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchLocation {
    /// A header value matched.
    Header { name: String, value: String },
    /// A searchable body part matched. `part` is the index in the body
    /// (always 0 for a flat body); `text` is the full searched text.
    Body { part: usize, text: String },
}

/// Byte range of the first hit inside the searched text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// One reported hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchRecord {
    /// Offset of the message inside the mailbox.
    pub offset: u64,
    pub key: MessageKey,
    pub location: MatchLocation,
    pub span: Span,
}

impl MatchRecord {
    /// The matched slice of the searched text.
    pub fn matched_text(&self) -> &str {
        let text = match &self.location {
            MatchLocation::Header { value, .. } => value,
            MatchLocation::Body { text, .. } => text,
        };
        text.get(self.span.start..self.span.end).unwrap_or("")
    }

    pub fn is_header(&self) -> bool {
        matches!(self.location, MatchLocation::Header { .. })
    }
}
