//! Applies a pattern to one structured message.
//!
//! Headers are searched first, in order; each matching header yields one
//! header match. The body is searched only when no header matched, so a
//! message is never reported twice. A flat body is always searched; for a
//! multipart body only `text/plain` parts are, in part order, one match per
//! matching part.

use crate::model::message::StructuredMessage;
use crate::model::record::{MatchLocation, MatchRecord};

use super::pattern::Pattern;

/// Scan `message` and return its matches in report order.
pub fn scan_message(message: &StructuredMessage, pattern: &Pattern) -> Vec<MatchRecord> {
    let key = message.key();
    let mut matches = Vec::new();

    for header in &message.headers {
        if let Some(span) = pattern.find(&header.value) {
            matches.push(MatchRecord {
                offset: message.offset,
                key: key.clone(),
                location: MatchLocation::Header {
                    name: header.name.clone(),
                    value: header.value.clone(),
                },
                span,
            });
        }
    }

    if !matches.is_empty() {
        return matches;
    }

    for (part, body_part) in message.searchable_parts() {
        let text = body_part.text();
        if let Some(span) = pattern.find(&text) {
            matches.push(MatchRecord {
                offset: message.offset,
                key: key.clone(),
                location: MatchLocation::Body { part, text },
                span,
            });
        }
    }

    matches
}
