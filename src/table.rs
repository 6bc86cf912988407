//! In-memory table model.
//!
//! A [`Table`] is an ordered list of named [`Column`]s whose cells are
//! `Option<Value>` (null is `None`). Every column of a table holds the same
//! number of cells and column names are unique; [`Table::new`] refuses to build
//! anything else. A [`SheetSet`] keeps the tables of one source in workbook
//! order.

use std::collections::HashSet;

use thiserror::Error;

use crate::data::Value;

pub const ERROR_COLUMN: &str = "_error";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableError {
    #[error("Column '{column}' holds {actual} row(s) but the table has {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },
    #[error("Duplicate column name '{0}'")]
    DuplicateColumn(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub cells: Vec<Option<Value>>,
}

impl Column {
    pub fn new(name: impl Into<String>, cells: Vec<Option<Value>>) -> Self {
        Self {
            name: name.into(),
            cells,
        }
    }

    /// String forms of the cells, null cells stay `None`.
    pub fn display_values(&self) -> impl Iterator<Item = Option<String>> + '_ {
        self.cells
            .iter()
            .map(|cell| cell.as_ref().map(Value::as_display))
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
    row_count: usize,
    /// Set only by [`Table::error_marker`].
    failed: bool,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Result<Self, TableError> {
        let row_count = columns.first().map(|c| c.cells.len()).unwrap_or(0);
        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if column.cells.len() != row_count {
                return Err(TableError::LengthMismatch {
                    column: column.name.clone(),
                    expected: row_count,
                    actual: column.cells.len(),
                });
            }
            if !seen.insert(column.name.as_str()) {
                return Err(TableError::DuplicateColumn(column.name.clone()));
            }
        }
        Ok(Self {
            columns,
            row_count,
            failed: false,
        })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Placeholder for a sheet that could not be parsed.
    pub fn error_marker(message: impl Into<String>) -> Self {
        Self {
            columns: vec![Column::new(
                ERROR_COLUMN,
                vec![Some(Value::String(message.into()))],
            )],
            row_count: 1,
            failed: true,
        }
    }

    pub fn is_error_marker(&self) -> bool {
        self.failed
    }

    /// Message carried by an error-marker table.
    pub fn error_message(&self) -> Option<String> {
        if !self.is_error_marker() {
            return None;
        }
        self.columns
            .first()
            .and_then(|column| column.cells.first())
            .and_then(|cell| cell.as_ref().map(Value::as_display))
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() || self.row_count == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn headers(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&Value> {
        self.columns
            .get(column)
            .and_then(|c| c.cells.get(row))
            .and_then(|cell| cell.as_ref())
    }

    pub fn row(&self, row: usize) -> impl Iterator<Item = Option<&Value>> + '_ {
        self.columns
            .iter()
            .map(move |c| c.cells.get(row).and_then(|cell| cell.as_ref()))
    }

    /// Builds a table holding the given rows, in the given order, with the same columns.
    pub fn select_rows(&self, rows: &[usize]) -> Table {
        let columns = self
            .columns
            .iter()
            .map(|column| Column {
                name: column.name.clone(),
                cells: rows
                    .iter()
                    .map(|&idx| column.cells.get(idx).cloned().flatten())
                    .collect(),
            })
            .collect();
        Table {
            columns,
            row_count: rows.len(),
            failed: self.failed,
        }
    }

    /// Rows rendered as strings, null cells as empty strings.
    pub fn display_rows(&self, limit: Option<usize>) -> Vec<Vec<String>> {
        let take = limit.unwrap_or(self.row_count).min(self.row_count);
        (0..take)
            .map(|row| {
                self.row(row)
                    .map(|cell| cell.map(Value::as_display).unwrap_or_default())
                    .collect()
            })
            .collect()
    }
}

/// Tables of one source keyed by sheet name, in source order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SheetSet {
    sheets: Vec<(String, Table)>,
}

impl SheetSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sheet; a repeated name replaces the earlier table in place.
    pub fn insert(&mut self, name: impl Into<String>, table: Table) {
        let name = name.into();
        match self.sheets.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, slot)) => *slot = table,
            None => self.sheets.push((name, table)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Table> {
        self.sheets
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, table)| table)
    }

    pub fn names(&self) -> Vec<&str> {
        self.sheets.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Table)> {
        self.sheets.iter().map(|(name, table)| (name.as_str(), table))
    }

    pub fn len(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    /// First sheet named in `preferred` (case-insensitive), else the first sheet.
    pub fn default_sheet(&self, preferred: &[String]) -> Option<&str> {
        preferred
            .iter()
            .find_map(|wanted| {
                self.sheets
                    .iter()
                    .find(|(name, _)| name.trim().eq_ignore_ascii_case(wanted.trim()))
            })
            .or_else(|| self.sheets.first())
            .map(|(name, _)| name.as_str())
    }
}
