//! Address-list parsing for `From`, `To`, `Cc` and `Bcc` headers (RFC 5322 §3.4).

use serde::Serialize;

/// A parsed `(display_name, address)` pair.
///
/// # Examples
/// - `"\"Alice Smith\" <alice@x.com>"` → `display_name = "Alice Smith"`, `address = "alice@x.com"`
/// - `"bob@y.com"` → `display_name = ""`, `address = "bob@y.com"`
/// - `"bob@y.com (Bob)"` → `display_name = "Bob"`, `address = "bob@y.com"`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailAddress {
    /// Human-readable display name (may be empty).
    pub display_name: String,
    /// The bare address (`user@domain`).
    pub address: String,
}

impl EmailAddress {
    pub fn new(display_name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            address: address.into(),
        }
    }

    /// Parse a single mailbox: `addr`, `<addr>`, `Name <addr>`,
    /// `"Quoted, Name" <addr>` or `addr (Comment)`.
    ///
    /// Anything unrecognised ends up verbatim in `address`.
    pub fn parse(raw: &str) -> Self {
        let (text, comment) = strip_comments(raw);
        let trimmed = text.trim();

        if let Some(open) = find_unquoted(trimmed, '<') {
            if let Some(close) = trimmed[open..].find('>') {
                let address = trimmed[open + 1..open + close].trim().to_string();
                let mut display_name = unquote(&trimmed[..open]);
                if display_name.is_empty() {
                    display_name = comment;
                }
                return Self {
                    display_name,
                    address,
                };
            }
        }

        Self {
            display_name: comment,
            address: unquote(trimmed),
        }
    }

    /// Parse an address list.
    ///
    /// Commas inside quotes, angle brackets and comments do not split.
    /// Group syntax (`Team: a@x, b@y;`) is flattened into its members.
    /// Empty entries are dropped.
    pub fn parse_list(raw: &str) -> Vec<Self> {
        let mut results = Vec::new();
        let mut current = String::new();
        let mut in_quotes = false;
        let mut in_angle = false;
        let mut comment_depth = 0usize;
        let mut escaped = false;

        let mut flush = |current: &mut String| {
            let addr = Self::parse(current);
            if !addr.address.is_empty() {
                results.push(addr);
            }
            current.clear();
        };

        for ch in raw.chars() {
            if escaped {
                escaped = false;
                current.push(ch);
                continue;
            }
            match ch {
                '\\' if in_quotes || comment_depth > 0 => {
                    escaped = true;
                    current.push(ch);
                }
                '"' if comment_depth == 0 => {
                    in_quotes = !in_quotes;
                    current.push(ch);
                }
                '(' if !in_quotes => {
                    comment_depth += 1;
                    current.push(ch);
                }
                ')' if !in_quotes && comment_depth > 0 => {
                    comment_depth -= 1;
                    current.push(ch);
                }
                '<' if !in_quotes && comment_depth == 0 => {
                    in_angle = true;
                    current.push(ch);
                }
                '>' if !in_quotes && comment_depth == 0 => {
                    in_angle = false;
                    current.push(ch);
                }
                // Group display name: drop it, keep the members.
                ':' if !in_quotes && !in_angle && comment_depth == 0 => current.clear(),
                ',' | ';' if !in_quotes && !in_angle && comment_depth == 0 => flush(&mut current),
                _ => current.push(ch),
            }
        }
        flush(&mut current);

        results
    }

    /// Format for display: `"Display Name <address>"` or `"<address>"`.
    pub fn display(&self) -> String {
        if self.display_name.is_empty() {
            format!("<{}>", self.address)
        } else {
            format!("{} <{}>", self.display_name, self.address)
        }
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

/// Remove `( … )` comments outside quotes, returning the remaining text and
/// the first comment's content.
fn strip_comments(raw: &str) -> (String, String) {
    let mut text = String::with_capacity(raw.len());
    let mut comment = String::new();
    let mut first_comment: Option<String> = None;
    let mut depth = 0usize;
    let mut in_quotes = false;
    let mut escaped = false;

    for ch in raw.chars() {
        if escaped {
            escaped = false;
            if depth > 0 {
                comment.push(ch);
            } else {
                text.push(ch);
            }
            continue;
        }
        match ch {
            '\\' if in_quotes => {
                escaped = true;
                text.push(ch);
            }
            '"' if depth == 0 => {
                in_quotes = !in_quotes;
                text.push(ch);
            }
            '(' if !in_quotes => {
                if depth > 0 {
                    comment.push(ch);
                }
                depth += 1;
            }
            ')' if !in_quotes && depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    if first_comment.is_none() {
                        first_comment = Some(comment.trim().to_string());
                    }
                    comment.clear();
                } else {
                    comment.push(ch);
                }
            }
            _ if depth > 0 => comment.push(ch),
            _ => text.push(ch),
        }
    }

    (text, first_comment.unwrap_or_default())
}

/// Position of `needle` outside double quotes.
fn find_unquoted(s: &str, needle: char) -> Option<usize> {
    let mut in_quotes = false;
    let mut escaped = false;
    for (i, ch) in s.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            c if c == needle && !in_quotes => return Some(i),
            _ => {}
        }
    }
    None
}

/// Trim, strip surrounding double quotes and resolve `\"` escapes.
fn unquote(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        let inner = &trimmed[1..trimmed.len() - 1];
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(ch) = chars.next() {
            if ch == '\\' {
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            } else {
                out.push(ch);
            }
        }
        out.trim().to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_address() {
        let addr = EmailAddress::parse("user@example.com");
        assert_eq!(addr, EmailAddress::new("", "user@example.com"));
    }

    #[test]
    fn test_parse_angle_address() {
        let addr = EmailAddress::parse("<user@example.com>");
        assert_eq!(addr, EmailAddress::new("", "user@example.com"));
    }

    #[test]
    fn test_parse_name_and_address() {
        let addr = EmailAddress::parse("User One <user1@example.com>");
        assert_eq!(addr, EmailAddress::new("User One", "user1@example.com"));
    }

    #[test]
    fn test_parse_comment_as_display_name() {
        let addr = EmailAddress::parse("bob@y.com (Bob Jones)");
        assert_eq!(addr, EmailAddress::new("Bob Jones", "bob@y.com"));
    }

    #[test]
    fn test_parse_list_quoted_name_and_bare() {
        let list = EmailAddress::parse_list("\"Alice Smith\" <alice@x.com>, bob@y.com");
        assert_eq!(
            list,
            vec![
                EmailAddress::new("Alice Smith", "alice@x.com"),
                EmailAddress::new("", "bob@y.com"),
            ]
        );
    }

    #[test]
    fn test_parse_list_with_quoted_comma() {
        let list = EmailAddress::parse_list("\"Last, First\" <a@b.com>, other@c.com");
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].display_name, "Last, First");
        assert_eq!(list[0].address, "a@b.com");
    }

    #[test]
    fn test_parse_list_escaped_quote() {
        let list = EmailAddress::parse_list(r#""Bob \"The Builder\"" <bob@b.com>"#);
        assert_eq!(list[0].display_name, "Bob \"The Builder\"");
    }

    #[test]
    fn test_parse_list_group() {
        let list = EmailAddress::parse_list("Team: a@x.com, b@y.com;, c@z.com");
        let addrs: Vec<_> = list.iter().map(|a| a.address.as_str()).collect();
        assert_eq!(addrs, vec!["a@x.com", "b@y.com", "c@z.com"]);
    }

    #[test]
    fn test_parse_list_empty_group() {
        assert!(EmailAddress::parse_list("undisclosed-recipients:;").is_empty());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            EmailAddress::new("Alice", "alice@example.com").display(),
            "Alice <alice@example.com>"
        );
        assert_eq!(
            EmailAddress::new("", "alice@example.com").to_string(),
            "<alice@example.com>"
        );
    }
}
