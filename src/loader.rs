//! Tabular source loading.
//!
//! A [`Source`] is a named byte blob: a workbook (`xlsx`, `xlsm`, `xls`,
//! `ods`) or a delimited text file. [`load`] turns it into a [`SheetSet`] with
//! one normalized [`Table`] per sheet:
//!
//! 1. the sheet is read headerless into a grid of cells;
//! 2. the header row is guessed with [`detect_header_row`] (first of the
//!    leading rows with enough filled cells, else row 0);
//! 3. header names are trimmed, columns without a header cell are dropped and
//!    duplicate names are suffixed (`.1`, `.2`, ...).
//!
//! The header guess targets the common "title block above the table" layout.
//! It is a best-effort default, not a guarantee.
//!
//! A sheet that fails to parse becomes an error-marker table; the other sheets
//! of the same source are unaffected.

use std::{
    collections::HashSet,
    io::Cursor,
    path::{Path, PathBuf},
};

use calamine::{Data, DataType, Range, Reader, open_workbook_auto_from_rs};
use chrono::{NaiveDateTime, Timelike};
use encoding_rs::{Encoding, UTF_8};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    data::{EXACT_FLOAT_LIMIT, Value, text_cell},
    io_utils::{self, SourceFormat},
    table::{Column, SheetSet, Table, TableError},
};

const DEFAULT_SCAN_ROWS: usize = 10;
const DEFAULT_MIN_FILLED: usize = 4;
const DEFAULT_TEXT_SHEET: &str = "Sheet1";

type Grid = Vec<Vec<Option<Value>>>;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Reading {path:?} failed: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Source '{0}' is empty")]
    Empty(String),
    #[error("Source '{0}' is neither a spreadsheet workbook nor delimited text")]
    UnsupportedFormat(String),
    #[error("Cannot open workbook '{name}': {source}")]
    Workbook {
        name: String,
        #[source]
        source: calamine::Error,
    },
    #[error("Cannot decode '{name}': {message}")]
    Decode { name: String, message: String },
}

/// Raw source bytes plus the name they came with (file name or upload name).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl Source {
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, LoadError> {
        let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self { name, bytes })
    }

    fn text_sheet_name(&self) -> String {
        Path::new(&self.name)
            .file_stem()
            .map(|stem| stem.to_string_lossy().trim().to_string())
            .filter(|stem| !stem.is_empty())
            .unwrap_or_else(|| DEFAULT_TEXT_SHEET.to_string())
    }
}

/// Thresholds of the header-row guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderDetection {
    /// Leading rows inspected.
    pub scan_rows: usize,
    /// Non-null cells a row needs to count as the header.
    pub min_filled: usize,
}

impl Default for HeaderDetection {
    fn default() -> Self {
        Self {
            scan_rows: DEFAULT_SCAN_ROWS,
            min_filled: DEFAULT_MIN_FILLED,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    pub header: HeaderDetection,
    /// Delimiter for text sources; sniffed when `None`.
    pub delimiter: Option<u8>,
    /// Encoding for text sources.
    pub encoding: &'static Encoding,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            header: HeaderDetection::default(),
            delimiter: None,
            encoding: UTF_8,
        }
    }
}

/// Loads every sheet of `source` with default options.
pub fn load(source: &Source) -> Result<SheetSet, LoadError> {
    load_with(source, &LoadOptions::default())
}

pub fn load_with(source: &Source, options: &LoadOptions) -> Result<SheetSet, LoadError> {
    if source.bytes.is_empty() {
        return Err(LoadError::Empty(source.name.clone()));
    }
    let sheets = match io_utils::detect_format(&source.bytes, options.encoding) {
        SourceFormat::Workbook => load_workbook(source, options)?,
        SourceFormat::DelimitedText => load_delimited(source, options)?,
        SourceFormat::Binary => return Err(LoadError::UnsupportedFormat(source.name.clone())),
    };
    info!(
        "Loaded {} sheet(s) from '{}'",
        sheets.len(),
        source.name
    );
    Ok(sheets)
}

fn load_workbook(source: &Source, options: &LoadOptions) -> Result<SheetSet, LoadError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(source.bytes.as_slice()))
        .map_err(|err| LoadError::Workbook {
            name: source.name.clone(),
            source: err,
        })?;
    let mut sheets = SheetSet::new();
    for name in workbook.sheet_names() {
        let table = match workbook.worksheet_range(&name) {
            Ok(range) => normalize_or_mark(&name, &range_grid(&range), &options.header),
            Err(err) => {
                warn!("Sheet '{name}' in '{}' could not be parsed: {err}", source.name);
                Table::error_marker(err.to_string())
            }
        };
        sheets.insert(name, table);
    }
    Ok(sheets)
}

fn load_delimited(source: &Source, options: &LoadOptions) -> Result<SheetSet, LoadError> {
    let text =
        io_utils::decode_bytes(&source.bytes, options.encoding).map_err(|err| LoadError::Decode {
            name: source.name.clone(),
            message: err.to_string(),
        })?;
    let delimiter = io_utils::resolve_input_delimiter(&source.name, options.delimiter, &text);
    debug!(
        "Reading '{}' as delimited text (delimiter '{}')",
        source.name,
        io_utils::printable_delimiter(delimiter)
    );
    let name = source.text_sheet_name();
    let table = match delimited_grid(&text, delimiter) {
        Ok(grid) => normalize_or_mark(&name, &grid, &options.header),
        Err(err) => {
            warn!("Sheet '{name}' in '{}' could not be parsed: {err}", source.name);
            Table::error_marker(err.to_string())
        }
    };
    let mut sheets = SheetSet::new();
    sheets.insert(name, table);
    Ok(sheets)
}

fn normalize_or_mark(name: &str, grid: &[Vec<Option<Value>>], header: &HeaderDetection) -> Table {
    match normalize_sheet(grid, header) {
        Ok(table) => {
            debug!(
                "Sheet '{name}': {} column(s), {} row(s)",
                table.column_count(),
                table.row_count()
            );
            table
        }
        Err(err) => {
            warn!("Sheet '{name}' could not be normalized: {err}");
            Table::error_marker(err.to_string())
        }
    }
}

/// Index of the first of the leading `scan_rows` rows holding at least
/// `min_filled` non-null cells; 0 when no row qualifies.
pub fn detect_header_row(grid: &[Vec<Option<Value>>], detection: &HeaderDetection) -> usize {
    grid.iter()
        .take(detection.scan_rows)
        .position(|row| row.iter().filter(|cell| cell.is_some()).count() >= detection.min_filled)
        .unwrap_or(0)
}

/// Turns a headerless grid into a table using the detected header row.
pub fn normalize_sheet(
    grid: &[Vec<Option<Value>>],
    detection: &HeaderDetection,
) -> Result<Table, TableError> {
    if grid.is_empty() {
        return Ok(Table::empty());
    }
    let header_row = detect_header_row(grid, detection);
    debug!("Using row {header_row} as header");
    let width = grid.iter().map(Vec::len).max().unwrap_or(0);
    let header = &grid[header_row];

    let mut kept = Vec::with_capacity(width);
    let mut names = Vec::with_capacity(width);
    for col in 0..width {
        let name = header
            .get(col)
            .and_then(|cell| cell.as_ref())
            .map(|value| value.as_display().trim().to_string())
            .filter(|name| !name.is_empty());
        match name {
            Some(name) => {
                kept.push(col);
                names.push(name);
            }
            None => debug!("Dropping unnamed column at position {}", col + 1),
        }
    }

    let body = &grid[header_row + 1..];
    let columns = kept
        .into_iter()
        .zip(dedupe_names(names))
        .map(|(col, name)| {
            let cells = body
                .iter()
                .map(|row| row.get(col).cloned().flatten())
                .collect();
            Column::new(name, cells)
        })
        .collect();
    Table::new(columns)
}

fn dedupe_names(names: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::with_capacity(names.len());
    let mut unique = Vec::with_capacity(names.len());
    for name in names {
        let mut candidate = name.clone();
        let mut suffix = 1;
        while seen.contains(&candidate) {
            candidate = format!("{name}.{suffix}");
            suffix += 1;
        }
        seen.insert(candidate.clone());
        unique.push(candidate);
    }
    unique
}

fn delimited_grid(text: &str, delimiter: u8) -> Result<Grid, csv::Error> {
    let mut reader = io_utils::open_csv_reader(text, delimiter);
    let mut grid = Vec::new();
    for record in reader.records() {
        let record = record?;
        grid.push(record.iter().map(text_cell).collect());
    }
    Ok(grid)
}

fn range_grid(range: &Range<Data>) -> Grid {
    let Some((row_offset, col_offset)) = range.start() else {
        return Vec::new();
    };
    let (row_offset, col_offset) = (row_offset as usize, col_offset as usize);
    let mut grid: Grid = vec![Vec::new(); row_offset];
    for row in range.rows() {
        let mut cells = vec![None; col_offset];
        cells.extend(row.iter().map(convert_cell));
        grid.push(cells);
    }
    grid
}

fn convert_cell(cell: &Data) -> Option<Value> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => text_cell(s),
        Data::Int(i) => Some(Value::Integer(*i)),
        Data::Float(f) => Some(number_value(*f)),
        Data::Bool(b) => Some(Value::Boolean(*b)),
        Data::DateTime(_) | Data::DateTimeIso(_) => Some(
            cell.as_datetime()
                .map(datetime_value)
                .unwrap_or_else(|| Value::String(cell.to_string())),
        ),
        Data::DurationIso(s) => Some(Value::String(s.clone())),
    }
}

fn number_value(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < EXACT_FLOAT_LIMIT {
        Value::Integer(value as i64)
    } else {
        Value::Float(value)
    }
}

fn datetime_value(value: NaiveDateTime) -> Value {
    if value.num_seconds_from_midnight() == 0 && value.nanosecond() == 0 {
        Value::Date(value.date())
    } else {
        Value::DateTime(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(value: &str) -> Option<Value> {
        Some(Value::String(value.to_string()))
    }

    fn row(values: &[&str]) -> Vec<Option<Value>> {
        values.iter().map(|v| text_cell(v)).collect()
    }

    #[test]
    fn detect_header_row_skips_blank_and_title_rows() {
        let grid = vec![
            row(&["", "", "", "", "", ""]),
            row(&["", "", "", "", "", ""]),
            row(&["", "", "", "", "", ""]),
            row(&["Inventory 2024", "", "", "", "", ""]),
            row(&["Item", "Brand", "Model", "User", "Status", "Date"]),
            row(&["Laptop", "Dell", "5420", "ana", "EM USO", "2024-01-05"]),
        ];
        assert_eq!(detect_header_row(&grid, &HeaderDetection::default()), 4);
    }

    #[test]
    fn detect_header_row_defaults_to_first_row() {
        let grid = vec![row(&["a", "b"]), row(&["1", "2"])];
        assert_eq!(detect_header_row(&grid, &HeaderDetection::default()), 0);
    }

    #[test]
    fn detect_header_row_only_scans_leading_rows() {
        let mut grid = vec![row(&["title"]); 10];
        grid.push(row(&["a", "b", "c", "d"]));
        assert_eq!(detect_header_row(&grid, &HeaderDetection::default()), 0);
        let wider = HeaderDetection {
            scan_rows: 11,
            min_filled: 4,
        };
        assert_eq!(detect_header_row(&grid, &wider), 10);
    }

    #[test]
    fn normalize_sheet_drops_unnamed_and_dedupes() {
        let grid = vec![
            row(&["Report"]),
            row(&[" Item ", "", "Item", "Status", "Brand"]),
            row(&["Mouse", "stray", "x", "EM USO", "HP"]),
            row(&["Cable"]),
        ];
        let detection = HeaderDetection {
            scan_rows: 10,
            min_filled: 3,
        };
        let table = normalize_sheet(&grid, &detection).unwrap();
        assert_eq!(table.headers(), vec!["Item", "Item.1", "Status", "Brand"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.cell(0, 3), text("HP").as_ref());
        assert_eq!(table.cell(1, 0), text("Cable").as_ref());
        assert_eq!(table.cell(1, 3), None);
    }

    #[test]
    fn normalize_sheet_of_empty_grid_is_empty() {
        let table = normalize_sheet(&[], &HeaderDetection::default()).unwrap();
        assert_eq!(table.column_count(), 0);
    }

    #[test]
    fn number_value_narrows_integral_floats() {
        assert_eq!(number_value(42.0), Value::Integer(42));
        assert_eq!(number_value(1.25), Value::Float(1.25));
        assert_eq!(number_value(1e300), Value::Float(1e300));
    }

    #[test]
    fn datetime_value_keeps_time_when_present() {
        let midnight = chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(datetime_value(midnight), Value::Date(midnight.date()));
        let later = midnight.with_hour(9).unwrap();
        assert_eq!(datetime_value(later), Value::DateTime(later));
    }

    #[test]
    fn load_rejects_empty_and_binary_sources() {
        let empty = Source::from_bytes("empty.csv", Vec::new());
        assert!(matches!(load(&empty), Err(LoadError::Empty(_))));
        let binary = Source::from_bytes("blob.bin", vec![1u8, 0, 2, 0]);
        assert!(matches!(load(&binary), Err(LoadError::UnsupportedFormat(_))));
    }

    #[test]
    fn load_reads_semicolon_text_under_file_stem() {
        let source = Source::from_bytes(
            "estoque.csv",
            "Ativo;Marca;Modelo;Status\nNotebook;Dell;5420;EM USO\n",
        );
        let sheets = load(&source).unwrap();
        assert_eq!(sheets.names(), vec!["estoque"]);
        let table = sheets.get("estoque").unwrap();
        assert_eq!(table.headers(), vec!["Ativo", "Marca", "Modelo", "Status"]);
        assert_eq!(table.cell(0, 1), text("Dell").as_ref());
    }

    #[test]
    fn load_reports_corrupt_workbook() {
        let source = Source::from_bytes("broken.xlsx", b"PK\x03\x04 not really a zip".to_vec());
        assert!(matches!(load(&source), Err(LoadError::Workbook { .. })));
    }
}
