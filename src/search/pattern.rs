//! Compiled search patterns.

use regex::{Regex, RegexBuilder};

use crate::error::{MboxError, Result};
use crate::model::record::Span;

/// How a pattern string is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternOptions {
    /// Case-insensitive matching.
    pub ignore_case: bool,
    /// Treat the pattern as a literal string rather than a regex.
    pub literal: bool,
}

impl Default for PatternOptions {
    fn default() -> Self {
        Self {
            ignore_case: true,
            literal: false,
        }
    }
}

/// A compiled pattern applied to header values and body text.
#[derive(Debug, Clone)]
pub struct Pattern {
    regex: Regex,
    source: String,
}

impl Pattern {
    /// Compile `source`. Fails with [`MboxError::Pattern`] on invalid syntax,
    /// before any scanning starts.
    pub fn new(source: &str, options: PatternOptions) -> Result<Self> {
        if source.is_empty() {
            return Err(MboxError::Pattern("pattern is empty".to_string()));
        }
        let expr = if options.literal {
            regex::escape(source)
        } else {
            source.to_string()
        };
        let regex = RegexBuilder::new(&expr)
            .case_insensitive(options.ignore_case)
            .build()?;
        Ok(Self {
            regex,
            source: source.to_string(),
        })
    }

    /// The pattern as supplied by the caller.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Byte span of the first hit in `text`.
    pub fn find(&self, text: &str) -> Option<Span> {
        self.regex.find(text).map(|m| Span {
            start: m.start(),
            end: m.end(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(ignore_case: bool, literal: bool) -> PatternOptions {
        PatternOptions {
            ignore_case,
            literal,
        }
    }

    #[test]
    fn test_case_insensitive() {
        let p = Pattern::new("hello", opts(true, false)).unwrap();
        assert_eq!(p.find("Say HELLO there"), Some(Span { start: 4, end: 9 }));
    }

    #[test]
    fn test_case_sensitive() {
        let p = Pattern::new("hello", opts(false, false)).unwrap();
        assert!(p.find("HELLO").is_none());
        assert!(p.find("hello").is_some());
    }

    #[test]
    fn test_regex_syntax() {
        let p = Pattern::new(r"inv(oice)?\s+#\d+", PatternOptions::default()).unwrap();
        assert!(p.find("Your Invoice #1234").is_some());
    }

    #[test]
    fn test_literal_escapes_metacharacters() {
        let p = Pattern::new("a.b(c)", opts(false, true)).unwrap();
        assert!(p.find("x a.b(c) y").is_some());
        assert!(p.find("axb(c)").is_none());
        assert_eq!(p.as_str(), "a.b(c)");
    }

    #[test]
    fn test_invalid_pattern() {
        let err = Pattern::new("(unclosed", PatternOptions::default()).unwrap_err();
        assert!(matches!(err, MboxError::Pattern(_)));
    }

    #[test]
    fn test_empty_pattern_rejected() {
        assert!(Pattern::new("", PatternOptions::default()).is_err());
    }
}
