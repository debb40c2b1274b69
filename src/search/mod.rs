//! Content search: pattern compilation and per-message scanning.

pub mod pattern;
pub mod scanner;

pub use pattern::{Pattern, PatternOptions};
pub use scanner::scan_message;
