//! Summary figures for a (filtered) table: total rows, status buckets,
//! top categories and a monthly series. Every part that depends on a role is
//! `None` when that role is unassigned.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    data::Value,
    roles::{Role, RoleAssignment},
    table::{Column, Table},
};

const DEFAULT_TOP_CATEGORIES: usize = 15;

/// Status spellings per bucket, compared trimmed and upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusVocabulary {
    pub in_use: Vec<String>,
    pub in_stock: Vec<String>,
    pub reserved: Vec<String>,
}

impl Default for StatusVocabulary {
    fn default() -> Self {
        Self {
            in_use: vec!["EM USO".to_string(), "IN USE".to_string()],
            in_stock: vec!["EM ESTOQUE".to_string(), "IN STOCK".to_string()],
            reserved: vec!["RESERVADO".to_string(), "RESERVED".to_string()],
        }
    }
}

impl StatusVocabulary {
    fn classify(&self, value: &Value) -> StatusBucket {
        if value.is_blank() {
            return StatusBucket::Blank;
        }
        let folded = fold_status(&value.as_display());
        let matches = |terms: &[String]| terms.iter().any(|term| fold_status(term) == folded);
        if matches(&self.in_use) {
            StatusBucket::InUse
        } else if matches(&self.in_stock) {
            StatusBucket::InStock
        } else if matches(&self.reserved) {
            StatusBucket::Reserved
        } else {
            StatusBucket::Other
        }
    }
}

fn fold_status(value: &str) -> String {
    value.trim().to_uppercase()
}

enum StatusBucket {
    InUse,
    InStock,
    Reserved,
    Other,
    Blank,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryOptions {
    pub status: StatusVocabulary,
    pub top_categories: usize,
}

impl Default for SummaryOptions {
    fn default() -> Self {
        Self {
            status: StatusVocabulary::default(),
            top_categories: DEFAULT_TOP_CATEGORIES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct StatusCounts {
    pub in_use: usize,
    pub in_stock: usize,
    pub reserved: usize,
    /// Non-blank values outside the vocabulary.
    pub other: usize,
    /// Null cells.
    pub unknown: usize,
    /// Values that are empty once trimmed.
    pub blank: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyCount {
    /// First day of the month.
    pub month: NaiveDate,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub status: Option<StatusCounts>,
    /// Top categories in ascending count order.
    pub categories: Option<Vec<CategoryCount>>,
    pub monthly: Option<Vec<MonthlyCount>>,
}

pub fn summarize(table: &Table, roles: &RoleAssignment) -> Summary {
    summarize_with(table, roles, &SummaryOptions::default())
}

pub fn summarize_with(table: &Table, roles: &RoleAssignment, options: &SummaryOptions) -> Summary {
    Summary {
        total: table.row_count(),
        status: role_column(table, roles, Role::Status)
            .map(|c| status_counts(c, &options.status)),
        categories: role_column(table, roles, Role::Item)
            .map(|c| top_categories(c, options.top_categories)),
        monthly: role_column(table, roles, Role::Date).map(monthly_counts),
    }
}

fn role_column<'t>(table: &'t Table, roles: &RoleAssignment, role: Role) -> Option<&'t Column> {
    roles.column(role).and_then(|name| table.column(name))
}

pub fn status_counts(column: &Column, vocabulary: &StatusVocabulary) -> StatusCounts {
    let mut counts = StatusCounts::default();
    for cell in &column.cells {
        let Some(value) = cell else {
            counts.unknown += 1;
            continue;
        };
        match vocabulary.classify(value) {
            StatusBucket::InUse => counts.in_use += 1,
            StatusBucket::InStock => counts.in_stock += 1,
            StatusBucket::Reserved => counts.reserved += 1,
            StatusBucket::Other => counts.other += 1,
            StatusBucket::Blank => counts.blank += 1,
        }
    }
    counts
}

/// The `top` most frequent values, returned smallest count first.
pub fn top_categories(column: &Column, top: usize) -> Vec<CategoryCount> {
    column
        .display_values()
        .flatten()
        .counts()
        .into_iter()
        .sorted_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)))
        .take(top)
        .rev()
        .map(|(category, count)| CategoryCount { category, count })
        .collect()
}

/// Row counts per calendar month; values that are not dates are skipped.
pub fn monthly_counts(column: &Column) -> Vec<MonthlyCount> {
    let mut months: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for month in column.cells.iter().flatten().filter_map(Value::to_month) {
        *months.entry(month).or_insert(0) += 1;
    }
    months
        .into_iter()
        .map(|(month, count)| MonthlyCount { month, count })
        .collect()
}
