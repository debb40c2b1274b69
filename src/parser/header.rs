//! RFC 5322 header parsing: folding, content-type parameters and RFC 2047
//! encoded-words.

use base64::Engine as _;
use tracing::warn;

use crate::model::message::Header;
use crate::parser::mime::LENIENT_BASE64;

/// Decode raw header bytes to a string.
///
/// Tries UTF-8 first, then falls back to Windows-1252 (which accepts every byte).
pub fn decode_header_bytes(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}

/// Decode a raw header block line by line.
///
/// Each line gets its own UTF-8 / Windows-1252 decision, so one legacy
/// 8-bit header does not garble its UTF-8 neighbours.
pub fn decode_header_block(bytes: &[u8]) -> String {
    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }
    bytes
        .split_inclusive(|&b| b == b'\n')
        .map(decode_header_bytes)
        .collect()
}

/// Parse a header block into ordered `(name, value)` pairs.
///
/// Continuation lines (starting with space or tab) are appended to the
/// previous value after a single space. Names keep their case; duplicates
/// are preserved in order.
///
/// Fails on a continuation line with nothing to continue, and on a line that
/// is not `Name: value` with a valid field name.
pub fn parse_header_block(text: &str) -> Result<Vec<Header>, String> {
    let mut result: Vec<Header> = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            continue;
        }

        if line.starts_with(' ') || line.starts_with('\t') {
            let Some(last) = result.last_mut() else {
                return Err(format!(
                    "header line {} is a continuation with no preceding field",
                    idx + 1
                ));
            };
            let piece = line.trim();
            if !piece.is_empty() {
                if !last.value.is_empty() {
                    last.value.push(' ');
                }
                last.value.push_str(piece);
            }
            continue;
        }

        let Some(colon_pos) = line.find(':') else {
            return Err(format!(
                "header line {} has no field separator: {:?}",
                idx + 1,
                truncate(line, 60)
            ));
        };

        let name = line[..colon_pos].trim_end();
        if !is_valid_field_name(name) {
            return Err(format!(
                "header line {} has an invalid field name: {:?}",
                idx + 1,
                truncate(name, 60)
            ));
        }

        let value = line[colon_pos + 1..].trim();
        result.push(Header::new(name, value));
    }

    Ok(result)
}

/// Field names are printable US-ASCII, excluding space and colon.
fn is_valid_field_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| (33..=126).contains(&b) && b != b':')
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// First value for a header name (case-insensitive).
pub fn get_header<'a>(headers: &'a [Header], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|h| h.is(name))
        .map(|h| h.value.as_str())
}

/// A parsed `Content-Type` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    /// Lowercased `type/subtype`.
    pub mime_type: String,
    /// Parameters with lowercased names; values unquoted, case preserved.
    pub params: Vec<(String, String)>,
}

impl ContentType {
    /// Parse `type/subtype; name=value; name="quoted value"`.
    pub fn parse(value: &str) -> Self {
        let mut pieces = split_params(value).into_iter();
        let mime_type = pieces
            .next()
            .map(|s| s.trim().to_ascii_lowercase())
            .unwrap_or_default();

        let params = pieces
            .filter_map(|piece| {
                let (name, value) = piece.split_once('=')?;
                let name = name.trim().to_ascii_lowercase();
                if name.is_empty() {
                    return None;
                }
                Some((name, unquote_param(value.trim())))
            })
            .collect();

        Self { mime_type, params }
    }

    /// Value of parameter `name` (case-insensitive).
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_multipart(&self) -> bool {
        self.mime_type.starts_with("multipart/")
    }
}

/// Split on `;` outside double quotes.
fn split_params(value: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;

    for (i, ch) in value.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match ch {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                pieces.push(&value[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    pieces.push(&value[start..]);
    pieces
}

fn unquote_param(value: &str) -> String {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        let inner = &value[1..value.len() - 1];
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
        out
    } else {
        value.to_string()
    }
}

/// Decode RFC 2047 encoded-words in a header value.
///
/// Example: `"=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="` → `"Hola mundo"`
///
/// If decoding fails for any token, the original text is preserved.
pub fn decode_encoded_words(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut remaining = input;
    let mut last_was_encoded = false;

    while let Some(start) = remaining.find("=?") {
        let before = &remaining[..start];
        // Whitespace between two adjacent encoded words is dropped (RFC 2047 §6.2)
        if !last_was_encoded || !before.trim().is_empty() {
            result.push_str(before);
        }

        let after_start = &remaining[start + 2..];
        match try_decode_one_word(after_start) {
            Some((text, consumed)) => {
                result.push_str(&text);
                remaining = &after_start[consumed..];
                last_was_encoded = true;
            }
            None => {
                result.push_str("=?");
                remaining = after_start;
                last_was_encoded = false;
            }
        }
    }

    result.push_str(remaining);
    result
}

/// Decode `charset?encoding?text?=`; returns the text and the bytes consumed
/// after the leading `=?`.
fn try_decode_one_word(s: &str) -> Option<(String, usize)> {
    let (charset, rest) = s.split_once('?')?;
    let (encoding, rest) = rest.split_once('?')?;
    let end = rest.find("?=")?;
    let encoded_text = &rest[..end];

    // Encoded words never contain whitespace; bail out on false positives.
    if charset.is_empty() || encoded_text.contains(char::is_whitespace) {
        return None;
    }

    let consumed = charset.len() + 1 + encoding.len() + 1 + end + 2;

    let bytes = match encoding {
        "B" | "b" => LENIENT_BASE64.decode(encoded_text).ok()?,
        "Q" | "q" => decode_q_encoding(encoded_text),
        _ => return None,
    };

    // RFC 2231 language suffix: `UTF-8*en`
    let charset = charset.split('*').next().unwrap_or(charset);
    Some((decode_charset(charset, &bytes), consumed))
}

/// Decode Q-encoding (RFC 2047): underscores → spaces, `=XX` → byte.
fn decode_q_encoding(input: &str) -> Vec<u8> {
    let mut result = Vec::with_capacity(input.len());
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                result.push(b' ');
                i += 1;
            }
            b'=' if i + 2 < bytes.len() => {
                match hex_pair(bytes[i + 1], bytes[i + 2]) {
                    Some(byte) => {
                        result.push(byte);
                        i += 3;
                    }
                    None => {
                        result.push(b'=');
                        i += 1;
                    }
                }
            }
            b => {
                result.push(b);
                i += 1;
            }
        }
    }
    result
}

/// Combine two ASCII hex digits into a byte.
pub(crate) fn hex_pair(hi: u8, lo: u8) -> Option<u8> {
    let hi = (hi as char).to_digit(16)?;
    let lo = (lo as char).to_digit(16)?;
    Some((hi * 16 + lo) as u8)
}

/// Decode bytes using a named charset.
pub fn decode_charset(charset: &str, bytes: &[u8]) -> String {
    match charset.trim().to_ascii_lowercase().as_str() {
        "utf-8" | "utf8" | "us-ascii" | "ascii" => String::from_utf8_lossy(bytes).into_owned(),
        _ => {
            if let Some(encoding) = encoding_rs::Encoding::for_label(charset.trim().as_bytes()) {
                let (decoded, _, _) = encoding.decode(bytes);
                decoded.into_owned()
            } else {
                warn!(charset, "Unknown charset, falling back to UTF-8 lossy");
                String::from_utf8_lossy(bytes).into_owned()
            }
        }
    }
}
