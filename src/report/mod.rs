//! Rendering of match records.
//!
//! The scanner only produces [`MatchRecord`]s; a [`MatchSink`] decides how
//! they are shown. [`TextSink`] prints the classic human-readable report,
//! [`JsonSink`] one JSON object per matching message.

pub mod summary;

use std::io::Write;

use serde::Serialize;

use crate::error::{MboxError, Result};
use crate::model::message::StructuredMessage;
use crate::model::record::{MatchLocation, MatchRecord, MessageKey};

/// Width of the rule framing a full-message dump.
const RULE_WIDTH: usize = 50;

/// Consumer of scan results.
pub trait MatchSink {
    /// Called once for every message with at least one match, with the
    /// matches in report order.
    fn report(&mut self, message: &StructuredMessage, matches: &[MatchRecord]) -> Result<()>;

    /// Called once after the last message.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Map a failed write on the report output.
pub(crate) fn output_error(e: std::io::Error) -> MboxError {
    MboxError::io("<output>", e)
}

/// Human-readable report.
///
/// Each match is announced on its own line, then the whole message is dumped
/// between two rules:
///
/// ```text
/// Found match in header: Subject: Hello there
///
/// Entire header and message for matched email:
/// --------------------------------------------------
/// Subject: Hello there
/// From: bob@example.com
/// Date: Mon, 1 Jan 2024 00:00:00 +0000
/// whatever
/// --------------------------------------------------
/// ```
pub struct TextSink<W: Write> {
    out: W,
}

impl<W: Write> TextSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_report(&mut self, message: &StructuredMessage, matches: &[MatchRecord]) -> std::io::Result<()> {
        for m in matches {
            match &m.location {
                MatchLocation::Header { name, value } => {
                    writeln!(self.out, "Found match in header: {name}: {value}")?
                }
                MatchLocation::Body { text, .. } => {
                    writeln!(self.out, "Found match in message:\n{text}")?
                }
            }
        }

        let rule = "-".repeat(RULE_WIDTH);
        let key = message.key();
        writeln!(self.out, "\nEntire header and message for matched email:\n{rule}")?;
        writeln!(self.out, "Subject: {}", key.subject.as_deref().unwrap_or(""))?;
        writeln!(self.out, "From: {}", key.from.as_deref().unwrap_or(""))?;
        writeln!(self.out, "Date: {}", key.date.as_deref().unwrap_or(""))?;
        for (index, body_part) in message.searchable_parts() {
            // Parts the scanner matched were already decoded.
            let scanned = matches.iter().find_map(|m| match &m.location {
                MatchLocation::Body { part, text } if *part == index => Some(text.as_str()),
                _ => None,
            });
            match scanned {
                Some(text) => writeln!(self.out, "{text}")?,
                None => writeln!(self.out, "{}", body_part.text())?,
            }
        }
        writeln!(self.out, "{rule}")
    }
}

impl<W: Write> MatchSink for TextSink<W> {
    fn report(&mut self, message: &StructuredMessage, matches: &[MatchRecord]) -> Result<()> {
        self.write_report(message, matches).map_err(output_error)
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush().map_err(output_error)
    }
}

/// One JSON object per matching message, one per line.
pub struct JsonSink<W: Write> {
    out: W,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    offset: u64,
    #[serde(flatten)]
    key: MessageKey,
    matches: &'a [MatchRecord],
}

impl<W: Write> JsonSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> MatchSink for JsonSink<W> {
    fn report(&mut self, message: &StructuredMessage, matches: &[MatchRecord]) -> Result<()> {
        let report = JsonReport {
            offset: message.offset,
            key: message.key(),
            matches,
        };
        serde_json::to_writer(&mut self.out, &report)
            .map_err(|e| output_error(e.into()))?;
        writeln!(self.out).map_err(output_error)
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush().map_err(output_error)
    }
}

/// Sink that keeps every match in memory. Used by tests and library callers
/// that post-process results.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub matches: Vec<MatchRecord>,
    /// Number of messages reported.
    pub messages: usize,
}

impl MatchSink for CollectingSink {
    fn report(&mut self, _message: &StructuredMessage, matches: &[MatchRecord]) -> Result<()> {
        self.messages += 1;
        self.matches.extend_from_slice(matches);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::message::{Body, BodyPart, Header};
    use crate::model::record::Span;

    fn message() -> StructuredMessage {
        StructuredMessage {
            offset: 100,
            headers: vec![
                Header::new("From", "bob@example.com"),
                Header::new("Subject", "Hello there"),
            ],
            body: Body::Flat(BodyPart {
                content_type: "text/plain".into(),
                charset: None,
                transfer_encoding: None,
                headers: Vec::new(),
                payload: b"whatever".to_vec(),
            }),
        }
    }

    fn header_match() -> MatchRecord {
        MatchRecord {
            offset: 100,
            key: message().key(),
            location: MatchLocation::Header {
                name: "Subject".into(),
                value: "Hello there".into(),
            },
            span: Span { start: 0, end: 5 },
        }
    }

    #[test]
    fn test_text_sink_format() {
        let mut sink = TextSink::new(Vec::new());
        sink.report(&message(), &[header_match()]).unwrap();
        let out = String::from_utf8(sink.into_inner()).unwrap();
        let rule = "-".repeat(50);
        let expected = format!(
            "Found match in header: Subject: Hello there\n\
             \nEntire header and message for matched email:\n{rule}\n\
             Subject: Hello there\n\
             From: bob@example.com\n\
             Date: \n\
             whatever\n\
             {rule}\n"
        );
        assert_eq!(out, expected);
    }

    #[test]
    fn test_text_sink_body_match() {
        let mut m = header_match();
        m.location = MatchLocation::Body {
            part: 0,
            text: "whatever".into(),
        };
        let mut sink = TextSink::new(Vec::new());
        sink.report(&message(), &[m]).unwrap();
        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert!(out.starts_with("Found match in message:\nwhatever\n"));
    }

    #[test]
    fn test_text_sink_reuses_scanned_text() {
        let mut m = header_match();
        m.location = MatchLocation::Body {
            part: 0,
            text: "already decoded".into(),
        };
        let mut sink = TextSink::new(Vec::new());
        sink.report(&message(), &[m]).unwrap();
        let out = String::from_utf8(sink.into_inner()).unwrap();
        let dump = out.split_once("Date: \n").unwrap().1;
        assert!(dump.starts_with("already decoded\n"), "got: {dump}");
        assert!(!out.contains("whatever"));
    }

    #[test]
    fn test_json_sink_one_line_per_message() {
        let mut sink = JsonSink::new(Vec::new());
        sink.report(&message(), &[header_match()]).unwrap();
        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(out.lines().count(), 1);

        let value: serde_json::Value = serde_json::from_str(out.trim()).unwrap();
        assert_eq!(value["offset"], 100);
        assert_eq!(value["subject"], "Hello there");
        assert_eq!(value["matches"][0]["location"]["kind"], "header");
        assert_eq!(value["matches"][0]["span"]["end"], 5);
    }

    #[test]
    fn test_collecting_sink() {
        let mut sink = CollectingSink::default();
        sink.report(&message(), &[header_match(), header_match()])
            .unwrap();
        assert_eq!(sink.messages, 1);
        assert_eq!(sink.matches.len(), 2);
    }
}
