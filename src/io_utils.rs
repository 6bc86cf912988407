//! I/O utilities for source format detection, text decoding and delimited text.
//!
//! All byte-level work of inventory-lens flows through this module:
//!
//! - **Format detection**: workbook containers are recognised by their magic
//!   bytes (ZIP for `xlsx`/`ods`, CFB for legacy `xls`); anything else is
//!   treated as delimited text.
//! - **Encoding**: text sources are decoded via `encoding_rs`, defaulting to
//!   UTF-8 (a byte-order mark overrides the label).
//! - **Delimiters**: explicit override, `.tsv` extension, or sniffing the
//!   first lines of the text.
//! - **Reader/writer construction**: flexible CSV readers (title rows above a
//!   table are shorter than the table) and always-quoting CSV writers.

use std::{io::Write, path::Path};

use anyhow::{Result, anyhow};
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8, UTF_16BE, UTF_16LE};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

const SNIFF_CANDIDATES: &[u8] = b",;\t|";
const SNIFF_LINES: usize = 10;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const CFB_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Workbook,
    DelimitedText,
    Binary,
}

/// Classifies a source. A byte-order mark or a UTF-16 `encoding` marks text
/// before NUL bytes are taken as a sign of binary content.
pub fn detect_format(bytes: &[u8], encoding: &'static Encoding) -> SourceFormat {
    if bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(CFB_MAGIC) {
        SourceFormat::Workbook
    } else if Encoding::for_bom(bytes).is_some() || encoding == UTF_16LE || encoding == UTF_16BE {
        SourceFormat::DelimitedText
    } else if bytes.contains(&0) {
        SourceFormat::Binary
    } else {
        SourceFormat::DelimitedText
    }
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, actual, had_errors) = encoding.decode(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            actual.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

/// Picks the delimiter for a text source named `name`.
pub fn resolve_input_delimiter(name: &str, provided: Option<u8>, text: &str) -> u8 {
    if let Some(delimiter) = provided {
        return delimiter;
    }
    match Path::new(name).extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => sniff_delimiter(text),
    }
}

/// Chooses the candidate delimiter that appears most often in the first lines.
pub fn sniff_delimiter(text: &str) -> u8 {
    let sample = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .take(SNIFF_LINES)
        .collect::<Vec<_>>();
    let mut best = (DEFAULT_CSV_DELIMITER, 0usize);
    for &candidate in SNIFF_CANDIDATES {
        let hits = sample
            .iter()
            .map(|line| line.bytes().filter(|b| *b == candidate).count())
            .sum::<usize>();
        if hits > best.1 {
            best = (candidate, hits);
        }
    }
    best.0
}

pub fn open_csv_reader(text: &str, delimiter: u8) -> csv::Reader<&[u8]> {
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(false)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(text.as_bytes())
}

pub fn open_csv_writer<W: Write>(writer: W, delimiter: u8) -> csv::Writer<W> {
    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Always)
        .double_quote(true);
    builder.from_writer(writer)
}

pub fn resolve_output_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    if let Some(delim) = provided {
        return delim;
    }
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    }
}

pub fn is_delimited_path(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some(ext) if ext.eq_ignore_ascii_case("csv") || ext.eq_ignore_ascii_case("tsv")
    )
}

pub fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        other => (other as char).to_string(),
    }
}
