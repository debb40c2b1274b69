//! Body decoding: content-transfer-encoding and charset resolution.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use tracing::debug;

use crate::parser::header::{decode_charset, decode_header_bytes, hex_pair};

/// Base64 engine that accepts missing or superfluous padding, as found in
/// real-world mail.
pub(crate) const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Turn a part payload into text.
///
/// `base64` and `quoted-printable` payloads are decoded first; anything else
/// (`7bit`, `8bit`, `binary`, absent) is used as-is. The bytes are then
/// decoded with `charset`, or as UTF-8 with a Windows-1252 fallback when no
/// charset is declared. Undecodable base64 falls back to the raw payload.
pub fn decode_body(payload: &[u8], transfer_encoding: Option<&str>, charset: Option<&str>) -> String {
    let decoded = match transfer_encoding.map(str::trim) {
        Some(enc) if enc.eq_ignore_ascii_case("base64") => decode_base64_body(payload),
        Some(enc) if enc.eq_ignore_ascii_case("quoted-printable") => {
            Some(decode_quoted_printable(payload))
        }
        _ => None,
    };
    let bytes = decoded.as_deref().unwrap_or(payload);

    match charset {
        Some(cs) if !cs.trim().is_empty() => decode_charset(cs, bytes),
        _ => decode_header_bytes(bytes),
    }
}

fn decode_base64_body(payload: &[u8]) -> Option<Vec<u8>> {
    let cleaned: Vec<u8> = payload
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    match LENIENT_BASE64.decode(&cleaned) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            debug!(error = %e, "Invalid base64 body, searching raw payload");
            None
        }
    }
}

/// Decode quoted-printable (RFC 2045 §6.7).
///
/// `=XX` becomes a byte, `=` at end of line is a soft break, and trailing
/// whitespace on encoded lines is dropped. Malformed escapes pass through.
pub fn decode_quoted_printable(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());

    for line in input.split_inclusive(|&b| b == b'\n') {
        let (content, newline): (&[u8], &[u8]) = if let Some(c) = line.strip_suffix(b"\r\n") {
            (c, b"\r\n")
        } else if let Some(c) = line.strip_suffix(b"\n") {
            (c, b"\n")
        } else {
            (line, b"")
        };
        let content = trim_trailing_space(content);

        let (content, soft_break) = match content.strip_suffix(b"=") {
            Some(c) => (c, true),
            None => (content, false),
        };

        let mut i = 0;
        while i < content.len() {
            if content[i] == b'=' && i + 2 < content.len() {
                if let Some(byte) = hex_pair(content[i + 1], content[i + 2]) {
                    out.push(byte);
                    i += 3;
                    continue;
                }
            }
            out.push(content[i]);
            i += 1;
        }

        if !soft_break {
            out.extend_from_slice(newline);
        }
    }

    out
}

fn trim_trailing_space(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .rposition(|&b| b != b' ' && b != b'\t')
        .map_or(0, |p| p + 1);
    &line[..end]
}
