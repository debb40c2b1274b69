//! Streaming MBOX segmenter.
//!
//! Splits an MBOX source into one [`RawRecord`] per call, reading line by line
//! through a large buffer. Never loads the whole file and never builds an
//! index: the only state carried between calls is the cursor `last_pos`.
//!
//! A line is a separator iff it starts with the exact bytes `From ` and the
//! current record already holds content. Body lines starting with an
//! unescaped `From ` are therefore treated as separators too (mboxo
//! behaviour); `>From ` lines are left untouched.
//!
//! A message larger than the configured maximum is truncated with a warning.
//! The cursor still advances past all of its bytes, so segmentation of the
//! following messages is unaffected, but that one record no longer
//! reproduces its slice of the file.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{MboxError, Result};
use crate::model::record::RawRecord;

/// Size of the internal read buffer (1 MB for fast sequential reads on modern SSDs).
pub const READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Default maximum message size in bytes (256 MB).
pub const MAX_MESSAGE_SIZE: usize = 256 * 1024 * 1024;

/// Separator prefix, compared on raw bytes before any decoding.
const SEPARATOR: &[u8] = b"From ";

/// Forward-only reader yielding one raw message per call.
///
/// The reader owns its byte source and the cursor `last_pos`, which always
/// points at the start of the next unconsumed message (or at end of file)
/// and never moves backwards. Once the source is exhausted, or a read fails,
/// the source is dropped and every further call returns `None`.
pub struct MboxReader<R> {
    path: PathBuf,
    reader: Option<BufReader<R>>,
    /// Start of the next unconsumed message.
    last_pos: u64,
    /// Logical position of `reader`, when known.
    pos: Option<u64>,
    len: Option<u64>,
    max_message_size: usize,
    line_buf: Vec<u8>,
}

impl MboxReader<File> {
    /// Open an MBOX file with the default read buffer.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_capacity(path, READ_BUFFER_SIZE)
    }

    /// Open an MBOX file with a read buffer of `capacity` bytes.
    pub fn open_with_capacity(path: impl AsRef<Path>, capacity: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                MboxError::FileNotFound(path.clone())
            } else {
                MboxError::io(&path, e)
            }
        })?;
        let len = file.metadata().map_err(|e| MboxError::io(&path, e))?.len();

        let mut reader = Self::with_capacity(capacity, file);
        reader.path = path;
        reader.len = Some(len);
        Ok(reader)
    }
}

impl<R: Read + Seek> MboxReader<R> {
    /// Wrap any seekable byte source. Reading starts at offset 0.
    pub fn new(inner: R) -> Self {
        Self::with_capacity(READ_BUFFER_SIZE, inner)
    }

    /// Wrap a seekable byte source with a read buffer of `capacity` bytes.
    pub fn with_capacity(capacity: usize, inner: R) -> Self {
        Self {
            path: PathBuf::from("<stream>"),
            reader: Some(BufReader::with_capacity(capacity.max(1), inner)),
            last_pos: 0,
            pos: None,
            len: None,
            max_message_size: MAX_MESSAGE_SIZE,
            line_buf: Vec::with_capacity(4096),
        }
    }

    /// Start segmenting at `offset` instead of the beginning of the source.
    ///
    /// Used to scan one partition of a large mailbox from a known separator
    /// offset. The cursor can only move forward: offsets before the current
    /// position are ignored.
    pub fn with_offset(mut self, offset: u64) -> Self {
        if offset > self.last_pos {
            self.last_pos = offset;
        }
        self
    }

    /// Keep at most `max` bytes of any one message.
    pub fn with_max_message_size(mut self, max: usize) -> Self {
        self.max_message_size = max;
        self
    }

    /// Offset of the next unconsumed message.
    pub fn cursor(&self) -> u64 {
        self.last_pos
    }

    /// Total size of the source in bytes, when known.
    pub fn source_len(&self) -> Option<u64> {
        self.len
    }

    /// Path of the underlying file (`<stream>` for in-memory sources).
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the source has been released.
    pub fn is_finished(&self) -> bool {
        self.reader.is_none()
    }

    /// Read the next message.
    ///
    /// Returns `Ok(None)` once the source is exhausted. On an I/O error the
    /// partially read message is discarded and the sequence ends.
    pub fn next_record(&mut self) -> Result<Option<RawRecord>> {
        let Some(reader) = self.reader.as_mut() else {
            return Ok(None);
        };

        let start = self.last_pos;
        let mut bytes = Vec::with_capacity(64 * 1024);
        let max = self.max_message_size;
        let outcome = seek_to(reader, self.pos, start)
            .and_then(|_| scan_message(reader, &mut self.line_buf, &mut bytes, max));

        let scan = match outcome {
            Ok(scan) => scan,
            Err(e) => {
                self.reader = None;
                self.pos = None;
                return Err(MboxError::io(&self.path, e));
            }
        };

        let end = start + scan.consumed;
        match scan.stop {
            Stop::Separator { line_len } => {
                self.last_pos = end;
                self.pos = Some(end + line_len as u64);
            }
            Stop::Eof if scan.consumed == 0 => {
                debug!(offset = start, "End of mailbox, releasing source");
                self.reader = None;
                self.pos = None;
                return Ok(None);
            }
            Stop::Eof => {
                self.last_pos = end;
                self.pos = Some(end);
            }
        }

        if scan.consumed > bytes.len() as u64 {
            warn!(
                offset = start,
                length = scan.consumed,
                max_size = max,
                "Message exceeds maximum size, truncating"
            );
        }
        debug!(offset = start, length = scan.consumed, "Read message");
        Ok(Some(RawRecord {
            offset: start,
            bytes,
        }))
    }
}

impl<R: Read + Seek> Iterator for MboxReader<R> {
    type Item = Result<RawRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

/// Outcome of one [`scan_message`] call.
struct Scan {
    stop: Stop,
    /// Bytes of the message read from the source, kept or not.
    consumed: u64,
}

/// Why [`scan_message`] stopped.
enum Stop {
    /// A separator line was read; it belongs to the next message.
    Separator { line_len: usize },
    Eof,
}

/// Move `reader` to absolute offset `target`.
///
/// When the current position is known, a relative seek keeps the buffered
/// data alive if `target` falls inside it (the common case: stepping back
/// over the separator line that ended the previous message).
fn seek_to<R: Read + Seek>(
    reader: &mut BufReader<R>,
    current: Option<u64>,
    target: u64,
) -> io::Result<()> {
    match current {
        Some(pos) if pos == target => Ok(()),
        Some(pos) => {
            let delta = if target >= pos {
                i64::try_from(target - pos)
            } else {
                i64::try_from(pos - target).map(|d| -d)
            }
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "seek distance too large"))?;
            reader.seek_relative(delta)
        }
        None => reader.seek(SeekFrom::Start(target)).map(|_| ()),
    }
}

/// Accumulate lines into `record` until the next separator or end of stream,
/// keeping at most `max` bytes.
fn scan_message<R: BufRead>(
    reader: &mut R,
    line: &mut Vec<u8>,
    record: &mut Vec<u8>,
    max: usize,
) -> io::Result<Scan> {
    let mut consumed = 0u64;
    loop {
        line.clear();
        let n = reader.read_until(b'\n', line)?;
        if n == 0 {
            return Ok(Scan {
                stop: Stop::Eof,
                consumed,
            });
        }
        if is_mbox_separator(line) && consumed > 0 {
            return Ok(Scan {
                stop: Stop::Separator { line_len: n },
                consumed,
            });
        }
        consumed += n as u64;
        let room = max.saturating_sub(record.len()).min(n);
        record.extend_from_slice(&line[..room]);
    }
}

/// Check whether a line is an MBOX separator (`From ` at the very start).
pub fn is_mbox_separator(line: &[u8]) -> bool {
    line.starts_with(SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn reader(data: &[u8]) -> MboxReader<Cursor<Vec<u8>>> {
        MboxReader::new(Cursor::new(data.to_vec()))
    }

    fn collect(data: &[u8]) -> Vec<RawRecord> {
        reader(data).map(|r| r.unwrap()).collect()
    }

    const TWO: &[u8] = b"From a@x Mon Jan 1 00:00:00 2024\nSubject: one\n\nbody one\n\nFrom b@x Mon Jan 1 00:00:00 2024\nSubject: two\n\nbody two\n";

    #[test]
    fn test_is_mbox_separator() {
        assert!(is_mbox_separator(
            b"From user@example.com Thu Jan 01 00:00:00 2024\n"
        ));
        assert!(!is_mbox_separator(b"from user@example.com\n")); // lowercase
        assert!(!is_mbox_separator(b">From user@example.com\n")); // escaped
        assert!(!is_mbox_separator(b"From:user@example.com\n"));
        assert!(!is_mbox_separator(b"Subject: From here\n"));
    }

    #[test]
    fn test_splits_on_separator() {
        let records = collect(TWO);
        assert_eq!(records.len(), 2);
        assert!(records[0].bytes.starts_with(b"From a@x"));
        assert!(records[0].bytes.ends_with(b"body one\n\n"));
        assert!(records[1].bytes.starts_with(b"From b@x"));
        assert_eq!(records[1].offset, records[0].bytes.len() as u64);
    }

    #[test]
    fn test_concatenation_reproduces_input() {
        let records = collect(TWO);
        let joined: Vec<u8> = records.iter().flat_map(|r| r.bytes.clone()).collect();
        assert_eq!(joined, TWO);
    }

    #[test]
    fn test_leading_separator_does_not_emit_empty_record() {
        let records = collect(b"From a@x\nbody\n");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].offset, 0);
    }

    #[test]
    fn test_content_before_first_separator_is_a_record() {
        let records = collect(b"garbage\nFrom a@x\nbody\n");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].bytes, b"garbage\n");
        assert_eq!(records[1].offset, 8);
    }

    #[test]
    fn test_unescaped_from_in_body_splits() {
        let data = b"From a@x\nSubject: s\n\nhello\nFrom the start\n";
        assert_eq!(collect(data).len(), 2);
    }

    #[test]
    fn test_escaped_from_in_body_does_not_split() {
        let data = b"From a@x\nSubject: s\n\nhello\n>From the start\n";
        let records = collect(data);
        assert_eq!(records.len(), 1);
        assert!(records[0].bytes.ends_with(b">From the start\n"));
    }

    #[test]
    fn test_empty_source() {
        let mut r = reader(b"");
        assert!(r.next_record().unwrap().is_none());
        assert!(r.is_finished());
        assert!(r.next_record().unwrap().is_none());
    }

    #[test]
    fn test_missing_final_newline() {
        let records = collect(b"From a@x\nbody without newline");
        assert_eq!(records.len(), 1);
        assert!(records[0].bytes.ends_with(b"newline"));
    }

    #[test]
    fn test_oversized_message_is_truncated_but_skipped_whole() {
        let first_len = TWO
            .windows(8)
            .position(|w| w == b"\nFrom b@")
            .map(|p| p + 1)
            .unwrap();
        let records: Vec<_> = reader(TWO)
            .with_max_message_size(20)
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].bytes, &TWO[..20]);
        assert_eq!(records[1].offset, first_len as u64);
        assert!(records[1].bytes.starts_with(b"From b@x"));
        assert_eq!(records[1].bytes.len(), 20);
    }

    #[test]
    fn test_cursor_is_monotonic() {
        let mut r = reader(TWO);
        let mut last = r.cursor();
        while let Some(rec) = r.next_record().unwrap() {
            assert!(r.cursor() >= last);
            assert_eq!(r.cursor(), rec.offset + rec.bytes.len() as u64);
            last = r.cursor();
        }
        assert_eq!(last, TWO.len() as u64);
    }

    #[test]
    fn test_with_offset_starts_mid_file() {
        let first_len = collect(TWO)[0].bytes.len() as u64;
        let records: Vec<_> = reader(TWO)
            .with_offset(first_len)
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(records.len(), 1);
        assert!(records[0].bytes.starts_with(b"From b@x"));
        assert_eq!(records[0].offset, first_len);
    }

    #[test]
    fn test_tiny_buffer_still_splits_correctly() {
        let records: Vec<_> = MboxReader::with_capacity(3, Cursor::new(TWO.to_vec()))
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(records.len(), 2);
        let joined: Vec<u8> = records.iter().flat_map(|r| r.bytes.clone()).collect();
        assert_eq!(joined, TWO);
    }

    struct FailingSource {
        data: Cursor<Vec<u8>>,
        fail_after: u64,
    }

    impl Read for FailingSource {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.data.position() >= self.fail_after {
                return Err(io::Error::new(io::ErrorKind::Other, "disk on fire"));
            }
            let room = (self.fail_after - self.data.position()) as usize;
            let n = buf.len().min(room);
            self.data.read(&mut buf[..n])
        }
    }

    impl Seek for FailingSource {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            self.data.seek(pos)
        }
    }

    #[test]
    fn test_io_error_ends_sequence() {
        let source = FailingSource {
            data: Cursor::new(TWO.to_vec()),
            fail_after: 20,
        };
        let mut r = MboxReader::with_capacity(8, source);
        let err = r.next_record().unwrap_err();
        assert!(matches!(err, MboxError::Io { .. }));
        assert!(r.is_finished());
        assert!(r.next().is_none());
    }
}
