//! Per-message extracts: one-line summaries and address lists.

use std::io::Write;

use serde::Serialize;

use crate::error::Result;
use crate::model::address::EmailAddress;
use crate::model::message::StructuredMessage;
use crate::parser::header::decode_encoded_words;

use super::output_error;

/// Headers whose values are address lists.
const ADDRESS_HEADERS: [&str; 4] = ["from", "to", "cc", "bcc"];

/// From / Subject / Date of one message, encoded-words decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub offset: u64,
    pub from: Option<String>,
    pub subject: Option<String>,
    pub date: Option<String>,
}

impl Summary {
    pub fn of(message: &StructuredMessage) -> Self {
        let decoded = |name: &str| message.header(name).map(decode_encoded_words);
        Self {
            offset: message.offset,
            from: decoded("from"),
            subject: decoded("subject"),
            date: message.header("date").map(String::from),
        }
    }

    /// `From\tSubject\tDate`; missing headers are empty fields.
    ///
    /// Control characters inside a field (a decoded tab or line break) become
    /// spaces, so every line has exactly three fields.
    pub fn to_line(&self) -> String {
        format!(
            "{}\t{}\t{}",
            tsv_field(self.from.as_deref()),
            tsv_field(self.subject.as_deref()),
            tsv_field(self.date.as_deref())
        )
    }
}

fn tsv_field(value: Option<&str>) -> String {
    value
        .unwrap_or("")
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect()
}

/// Output flavour for [`write_summary`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SummaryFormat {
    #[default]
    Tsv,
    Json,
}

/// Write the summary of `message` as one line.
pub fn write_summary<W: Write>(
    out: &mut W,
    message: &StructuredMessage,
    format: SummaryFormat,
) -> Result<()> {
    let summary = Summary::of(message);
    match format {
        SummaryFormat::Tsv => writeln!(out, "{}", summary.to_line()).map_err(output_error),
        SummaryFormat::Json => {
            serde_json::to_writer(&mut *out, &summary).map_err(|e| output_error(e.into()))?;
            writeln!(out).map_err(output_error)
        }
    }
}

/// Addresses from the first `From`, `To`, `Cc` and `Bcc` headers, in that
/// order. Display names have encoded-words decoded.
pub fn message_addresses(message: &StructuredMessage) -> Vec<EmailAddress> {
    ADDRESS_HEADERS
        .iter()
        .filter_map(|name| message.header(name))
        .filter(|value| !value.trim().is_empty())
        .flat_map(EmailAddress::parse_list)
        .map(|mut addr| {
            addr.display_name = decode_encoded_words(&addr.display_name);
            addr
        })
        .collect()
}

/// Write one `Display Name <address>` line per address of `message`.
pub fn write_addresses<W: Write>(out: &mut W, message: &StructuredMessage) -> Result<usize> {
    let addresses = message_addresses(message);
    for addr in &addresses {
        writeln!(out, "{addr}").map_err(output_error)?;
    }
    Ok(addresses.len())
}
