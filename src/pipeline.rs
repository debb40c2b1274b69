//! Mailbox-wide drivers: segment, parse, then search or extract.
//!
//! Every driver pulls one record at a time from an [`MboxReader`], so at most
//! one message is held in memory. A message that fails to parse is skipped
//! with a warning and counted; an I/O error aborts the run.

use std::io::{Read, Seek, Write};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::model::message::StructuredMessage;
use crate::parser::mbox::MboxReader;
use crate::parser::message::parse_message;
use crate::report::summary::{self, SummaryFormat};
use crate::report::MatchSink;
use crate::search::{scan_message, Pattern};

/// Progress callback: `(bytes_consumed, total_bytes)`.
pub type Progress<'a> = &'a dyn Fn(u64, u64);

/// Report progress at most every 4 MB.
const PROGRESS_INTERVAL: u64 = 4 * 1024 * 1024;

/// Counters for one pass over a mailbox.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    /// Records read from the mailbox.
    pub messages: u64,
    /// Messages skipped because they failed to parse.
    pub skipped: u64,
    /// Messages with at least one match (or one extracted item).
    pub matched: u64,
    /// Individual matches (or extracted items).
    pub matches: u64,
    /// Bytes consumed.
    pub bytes: u64,
}

/// Visit every parseable message of the mailbox, in order.
///
/// `visit` returns `Ok(true)` to continue and `Ok(false)` to stop early.
pub fn for_each_message<R, F>(
    reader: &mut MboxReader<R>,
    progress: Option<Progress<'_>>,
    mut visit: F,
) -> Result<ScanStats>
where
    R: Read + Seek,
    F: FnMut(&StructuredMessage, &mut ScanStats) -> Result<bool>,
{
    let mut stats = ScanStats::default();
    let start = reader.cursor();
    let total = reader.source_len().unwrap_or(0);
    let mut last_progress = start;

    while let Some(record) = reader.next_record()? {
        stats.messages += 1;
        stats.bytes = reader.cursor() - start;

        if let Some(cb) = progress {
            if reader.cursor() - last_progress >= PROGRESS_INTERVAL {
                cb(reader.cursor(), total);
                last_progress = reader.cursor();
            }
        }

        let message = match parse_message(&record) {
            Ok(message) => message,
            Err(e) if e.is_recoverable() => {
                warn!(offset = record.offset, error = %e, "Skipping malformed message");
                stats.skipped += 1;
                continue;
            }
            Err(e) => return Err(e),
        };
        drop(record);

        if !visit(&message, &mut stats)? {
            debug!(offset = message.offset, "Scan stopped by caller");
            break;
        }
    }

    if let Some(cb) = progress {
        cb(reader.cursor(), total);
    }

    info!(
        path = %reader.path().display(),
        messages = stats.messages,
        skipped = stats.skipped,
        bytes = stats.bytes,
        "Scan complete"
    );
    Ok(stats)
}

/// Search every message for `pattern`, handing matches to `sink`.
pub fn search<R: Read + Seek>(
    reader: &mut MboxReader<R>,
    pattern: &Pattern,
    sink: &mut dyn MatchSink,
    progress: Option<Progress<'_>>,
) -> Result<ScanStats> {
    debug!(pattern = pattern.as_str(), "Searching mailbox");
    let stats = for_each_message(reader, progress, |message, stats| {
        let matches = scan_message(message, pattern);
        if !matches.is_empty() {
            stats.matched += 1;
            stats.matches += matches.len() as u64;
            sink.report(message, &matches)?;
        }
        Ok(true)
    })?;
    sink.finish()?;
    Ok(stats)
}

/// Write one summary line per message.
pub fn summarize<R: Read + Seek, W: Write>(
    reader: &mut MboxReader<R>,
    out: &mut W,
    format: SummaryFormat,
    progress: Option<Progress<'_>>,
) -> Result<ScanStats> {
    let stats = for_each_message(reader, progress, |message, stats| {
        summary::write_summary(out, message, format)?;
        stats.matched += 1;
        stats.matches += 1;
        Ok(true)
    })?;
    out.flush().map_err(crate::report::output_error)?;
    Ok(stats)
}

/// Write every `From`/`To`/`Cc`/`Bcc` address of every message.
pub fn extract_addresses<R: Read + Seek, W: Write>(
    reader: &mut MboxReader<R>,
    out: &mut W,
    progress: Option<Progress<'_>>,
) -> Result<ScanStats> {
    let stats = for_each_message(reader, progress, |message, stats| {
        let written = summary::write_addresses(out, message)?;
        if written > 0 {
            stats.matched += 1;
            stats.matches += written as u64;
        }
        Ok(true)
    })?;
    out.flush().map_err(crate::report::output_error)?;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::record::MatchLocation;
    use crate::report::CollectingSink;
    use crate::search::PatternOptions;
    use std::io::Cursor;

    const MAILBOX: &str = "From alice@example.com Mon Jan 1 00:00:00 2024\n\
From: alice@example.com\n\
Subject: Hi\n\
\n\
no match here\n\
From bob@example.com Mon Jan 1 00:00:00 2024\n\
From: bob@example.com\n\
Subject: Hello there\n\
\n\
whatever\n";

    fn reader(data: &str) -> MboxReader<Cursor<Vec<u8>>> {
        MboxReader::new(Cursor::new(data.as_bytes().to_vec()))
    }

    fn hello() -> Pattern {
        Pattern::new(
            "hello",
            PatternOptions {
                ignore_case: true,
                literal: false,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_search_end_to_end() {
        let mut sink = CollectingSink::default();
        let stats = search(&mut reader(MAILBOX), &hello(), &mut sink, None).unwrap();

        assert_eq!(stats.messages, 2);
        assert_eq!(stats.matched, 1);
        assert_eq!(sink.matches.len(), 1);
        assert_eq!(
            sink.matches[0].location,
            MatchLocation::Header {
                name: "Subject".into(),
                value: "Hello there".into()
            }
        );
        assert_eq!(sink.matches[0].key.from.as_deref(), Some("bob@example.com"));
    }

    #[test]
    fn test_malformed_message_is_skipped() {
        let data = format!(
            "From x@y\nthis line is not a header\n\nhello in body\n{MAILBOX}"
        );
        let mut sink = CollectingSink::default();
        let stats = search(&mut reader(&data), &hello(), &mut sink, None).unwrap();
        assert_eq!(stats.messages, 3);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.matched, 1);
    }

    #[test]
    fn test_early_stop() {
        let mut seen = 0;
        let stats = for_each_message(&mut reader(MAILBOX), None, |_, _| {
            seen += 1;
            Ok(false)
        })
        .unwrap();
        assert_eq!(seen, 1);
        assert_eq!(stats.messages, 1);
    }

    #[test]
    fn test_progress_reports_final_position() {
        let calls = std::cell::RefCell::new(Vec::new());
        let cb = |pos: u64, total: u64| calls.borrow_mut().push((pos, total));
        for_each_message(&mut reader(MAILBOX), Some(&cb), |_, _| Ok(true)).unwrap();
        let calls = calls.into_inner();
        assert_eq!(calls.last().map(|c| c.0), Some(MAILBOX.len() as u64));
    }

    #[test]
    fn test_stats_count_bytes_from_start_offset() {
        let second = MAILBOX.find("From bob@").unwrap() as u64;
        let mut r = reader(MAILBOX).with_offset(second);
        let stats = for_each_message(&mut r, None, |_, _| Ok(true)).unwrap();
        assert_eq!(stats.messages, 1);
        assert_eq!(stats.bytes, MAILBOX.len() as u64 - second);
        assert_eq!(r.cursor(), MAILBOX.len() as u64);
    }

    #[test]
    fn test_summarize() {
        let mut out = Vec::new();
        let stats = summarize(&mut reader(MAILBOX), &mut out, SummaryFormat::Tsv, None).unwrap();
        assert_eq!(stats.messages, 2);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "alice@example.com\tHi\t\nbob@example.com\tHello there\t\n"
        );
    }

    #[test]
    fn test_extract_addresses() {
        let mut out = Vec::new();
        let stats = extract_addresses(&mut reader(MAILBOX), &mut out, None).unwrap();
        assert_eq!(stats.matches, 2);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "<alice@example.com>\n<bob@example.com>\n"
        );
    }
}
