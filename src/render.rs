//! Plain-text rendering for the command line: elastic tables for views and
//! the sections of a summary.

use std::{borrow::Cow, fmt::Write as _};

use crate::{summary::Summary, table::Table};

const COLUMN_GAP: &str = "  ";
const MIN_RULE_WIDTH: usize = 3;
pub const NO_DATA: &str = "no data for this view";

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let widths = column_widths(headers, rows);
    let rule_widths = widths
        .iter()
        .map(|w| (*w).max(MIN_RULE_WIDTH))
        .collect::<Vec<_>>();
    let rule = rule_widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>();

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));
    let _ = writeln!(output, "{}", format_row(&rule, &rule_widths));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

/// Table of the first `limit` rows (all when `None`) followed by a row count line.
pub fn render_view(table: &Table, limit: Option<usize>) -> String {
    if table.column_count() == 0 {
        return format!("{NO_DATA}\n");
    }
    let rows = table.display_rows(limit);
    let mut output = render_table(&table.headers(), &rows);
    if rows.len() < table.row_count() {
        let _ = writeln!(output, "({} of {} rows shown)", rows.len(), table.row_count());
    } else {
        let _ = writeln!(output, "({} rows)", table.row_count());
    }
    output
}

pub fn render_summary(summary: &Summary) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Total assets: {}", summary.total);

    output.push_str("\nStatus\n");
    match &summary.status {
        Some(status) => {
            let _ = writeln!(output, "In use: {}", status.in_use);
            let _ = writeln!(output, "In stock: {}", status.in_stock);
            let _ = writeln!(output, "Reserved: {}", status.reserved);
            let _ = writeln!(output, "Other: {}", status.other);
            let _ = writeln!(output, "Blank: {}", status.blank);
            let _ = writeln!(output, "Unknown: {}", status.unknown);
        }
        None => push_no_data(&mut output),
    }

    output.push_str("\nTop categories\n");
    match summary.categories.as_deref() {
        Some(categories) if !categories.is_empty() => {
            let rows = categories
                .iter()
                .map(|entry| vec![entry.category.clone(), entry.count.to_string()])
                .collect::<Vec<_>>();
            output.push_str(&render_table(&labels(&["category", "count"]), &rows));
        }
        _ => push_no_data(&mut output),
    }

    output.push_str("\nBy month\n");
    match summary.monthly.as_deref() {
        Some(months) if !months.is_empty() => {
            let rows = months
                .iter()
                .map(|entry| {
                    vec![entry.month.format("%Y-%m").to_string(), entry.count.to_string()]
                })
                .collect::<Vec<_>>();
            output.push_str(&render_table(&labels(&["month", "count"]), &rows));
        }
        _ => push_no_data(&mut output),
    }
    output
}

pub fn labels(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

fn push_no_data(output: &mut String) {
    let _ = writeln!(output, "{NO_DATA}");
}

fn column_widths(headers: &[String], rows: &[Vec<String>]) -> Vec<usize> {
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(display_width(&sanitize_cell(cell)));
        }
    }
    widths.into_iter().map(|w| w.max(1)).collect()
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let line = values
        .iter()
        .zip(widths)
        .map(|(value, width)| {
            let cell = sanitize_cell(value);
            let padding = width.saturating_sub(display_width(&cell));
            format!("{cell}{}", " ".repeat(padding))
        })
        .collect::<Vec<_>>()
        .join(COLUMN_GAP);
    line.trim_end_matches(' ').to_string()
}

/// Character count, ignoring ANSI colour sequences.
fn display_width(value: &str) -> usize {
    let mut width = 0usize;
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\u{1b}' {
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
        } else {
            width += 1;
        }
    }
    width
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}
