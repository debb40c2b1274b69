//! Centralized error types for mboxscan.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mboxscan library.
#[derive(Error, Debug)]
pub enum MboxError {
    /// I/O error with the associated file path. Always fatal for a scan.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified file does not exist.
    #[error("MBOX file not found: {0}")]
    FileNotFound(PathBuf),

    /// One message could not be turned into a structured message.
    ///
    /// Scans skip the message and keep going.
    #[error("Parse error at offset {offset}: {reason}")]
    Parse { offset: u64, reason: String },

    /// The search pattern supplied by the caller does not compile.
    #[error("Invalid search pattern: {0}")]
    Pattern(String),
}

/// Convenience alias for `Result<T, MboxError>`.
pub type Result<T> = std::result::Result<T, MboxError>;

impl MboxError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a `Parse` variant for the message starting at `offset`.
    pub fn parse(offset: u64, reason: impl Into<String>) -> Self {
        Self::Parse {
            offset,
            reason: reason.into(),
        }
    }

    /// Whether the error only concerns a single message.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }
}

/// Allow `?` on `std::io::Error` when no path context is available
/// (readers built over in-memory sources).
impl From<std::io::Error> for MboxError {
    fn from(source: std::io::Error) -> Self {
        Self::Io {
            path: PathBuf::from("<stream>"),
            source,
        }
    }
}

impl From<regex::Error> for MboxError {
    fn from(err: regex::Error) -> Self {
        Self::Pattern(err.to_string())
    }
}
