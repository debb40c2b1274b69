//! Turns a [`RawRecord`] into a [`StructuredMessage`].
//!
//! The record is split on its first blank line into a header block and a
//! body. `multipart/*` bodies with a boundary are cut into parts one level
//! deep; each part gets its own header/body split. Nested multiparts stay
//! opaque parts.

use tracing::warn;

use crate::error::{MboxError, Result};
use crate::model::message::{Body, BodyPart, Header, StructuredMessage};
use crate::model::record::RawRecord;
use crate::parser::header::{self, ContentType};
use crate::parser::mbox::is_mbox_separator;

const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// Parse one raw record.
///
/// Fails with [`MboxError::Parse`] when the top-level header block is
/// malformed. Part-level problems never fail the message: they degrade to a
/// flat body or a headerless part, with a warning.
pub fn parse_message(record: &RawRecord) -> Result<StructuredMessage> {
    let bytes = skip_from_line(&record.bytes);
    let (header_bytes, body_bytes) = split_header_body(bytes);

    let headers = header::parse_header_block(&header::decode_header_block(header_bytes))
        .map_err(|reason| MboxError::parse(record.offset, reason))?;

    let body = build_body(&headers, body_bytes, record.offset);

    Ok(StructuredMessage {
        offset: record.offset,
        headers,
        body,
    })
}

/// Skip the `From ` separator line (and a UTF-8 BOM before it) at the start
/// of a record.
fn skip_from_line(data: &[u8]) -> &[u8] {
    let unbommed = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);

    if is_mbox_separator(unbommed) {
        return match unbommed.iter().position(|&b| b == b'\n') {
            Some(pos) => &unbommed[pos + 1..],
            None => &[],
        };
    }
    data
}

/// Split at the first line consisting only of a line terminator.
///
/// Without a blank line the whole input is the header block.
fn split_header_body(data: &[u8]) -> (&[u8], &[u8]) {
    let mut offset = 0;
    for line in data.split_inclusive(|&b| b == b'\n') {
        if line == b"\n" || line == b"\r\n" {
            return (&data[..offset], &data[offset + line.len()..]);
        }
        offset += line.len();
    }
    (data, &[])
}

fn build_body(headers: &[Header], body: &[u8], offset: u64) -> Body {
    let content_type = header::get_header(headers, "content-type").map(ContentType::parse);

    if let Some(ct) = content_type.as_ref().filter(|ct| ct.is_multipart()) {
        match ct.param("boundary").filter(|b| !b.is_empty()) {
            Some(boundary) => match split_multipart(body, boundary) {
                Some(raw_parts) => {
                    return Body::Multipart(
                        raw_parts.into_iter().map(|p| parse_part(p, offset)).collect(),
                    )
                }
                None => warn!(
                    offset,
                    boundary, "Multipart boundary never appears in body, treating as flat"
                ),
            },
            None => warn!(
                offset,
                content_type = %ct.mime_type,
                "Multipart message without boundary, treating as flat"
            ),
        }
    }

    Body::Flat(make_part(content_type.as_ref(), headers, Vec::new(), body))
}

/// Parse one multipart part into its headers and payload.
fn parse_part(raw: &[u8], offset: u64) -> BodyPart {
    let (header_bytes, payload) = split_header_body(raw);

    match header::parse_header_block(&header::decode_header_block(header_bytes)) {
        Ok(headers) => {
            let ct = header::get_header(&headers, "content-type").map(ContentType::parse);
            make_part(ct.as_ref(), &headers, headers.clone(), payload)
        }
        Err(reason) => {
            warn!(offset, %reason, "Malformed part headers, treating part as plain text");
            make_part(None, &[], Vec::new(), raw)
        }
    }
}

fn make_part(
    content_type: Option<&ContentType>,
    headers: &[Header],
    own_headers: Vec<Header>,
    payload: &[u8],
) -> BodyPart {
    let mime_type = content_type
        .map(|ct| ct.mime_type.as_str())
        .filter(|m| !m.is_empty())
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();

    BodyPart {
        content_type: mime_type,
        charset: content_type
            .and_then(|ct| ct.param("charset"))
            .map(String::from),
        transfer_encoding: header::get_header(headers, "content-transfer-encoding")
            .map(|v| v.trim().to_ascii_lowercase()),
        headers: own_headers,
        payload: payload.to_vec(),
    }
}

/// Cut a multipart body on `--boundary` lines.
///
/// The preamble before the first delimiter and the epilogue after the close
/// delimiter `--boundary--` are dropped. The line break preceding each
/// delimiter belongs to the delimiter. Returns `None` when no delimiter line
/// exists at all.
fn split_multipart<'a>(body: &'a [u8], boundary: &str) -> Option<Vec<&'a [u8]>> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();

    let mut parts = Vec::new();
    let mut part_start: Option<usize> = None;
    let mut seen_delimiter = false;
    let mut offset = 0;

    for line in body.split_inclusive(|&b| b == b'\n') {
        let line_start = offset;
        offset += line.len();

        let trimmed = trim_line_end(line);
        let Some(rest) = trimmed.strip_prefix(delimiter) else {
            continue;
        };
        let is_close = rest == b"--";
        if !rest.is_empty() && !is_close {
            continue;
        }

        seen_delimiter = true;
        if let Some(start) = part_start.take() {
            parts.push(strip_final_newline(&body[start..line_start]));
        }
        if is_close {
            return Some(parts);
        }
        part_start = Some(offset);
    }

    // Missing close delimiter: the last part runs to the end.
    if let Some(start) = part_start {
        parts.push(&body[start..]);
    }

    seen_delimiter.then_some(parts)
}

/// Drop the line terminator and transport padding.
fn trim_line_end(line: &[u8]) -> &[u8] {
    let end = line
        .iter()
        .rposition(|&b| !matches!(b, b'\n' | b'\r' | b' ' | b'\t'))
        .map_or(0, |p| p + 1);
    &line[..end]
}

fn strip_final_newline(part: &[u8]) -> &[u8] {
    part.strip_suffix(b"\r\n")
        .or_else(|| part.strip_suffix(b"\n"))
        .unwrap_or(part)
}
