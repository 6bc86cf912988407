use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Result, anyhow};
use log::debug;

use crate::{
    data::Value,
    roles::{Role, RoleAssignment},
    table::{Column, Table},
};

/// User selections for one view. An empty set for a role means "no filter".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterState {
    pub selections: BTreeMap<Role, BTreeSet<String>>,
    pub query: Option<String>,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&mut self, role: Role, value: impl Into<String>) -> &mut Self {
        self.selections.entry(role).or_default().insert(value.into());
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn selected(&self, role: Role) -> Option<&BTreeSet<String>> {
        self.selections.get(&role).filter(|values| !values.is_empty())
    }

    /// Trimmed, non-empty search text.
    pub fn search_text(&self) -> Option<&str> {
        self.query
            .as_deref()
            .map(str::trim)
            .filter(|query| !query.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.search_text().is_none() && self.selections.values().all(BTreeSet::is_empty)
    }
}

/// Parses `role=value` expressions; `|` separates several values for one role.
pub fn parse_selections(selections: &[String]) -> Result<FilterState> {
    let mut state = FilterState::new();
    for raw in selections {
        let (role, values) = parse_selection(raw)?;
        for value in values {
            state.select(role, value);
        }
    }
    Ok(state)
}

fn parse_selection(selection: &str) -> Result<(Role, Vec<String>)> {
    let trimmed = selection.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("Empty selection expression"));
    }
    let Some((left, right)) = trimmed.split_once('=') else {
        return Err(anyhow!(
            "Failed to parse selection '{trimmed}'; expected role=value"
        ));
    };
    let role = left.parse::<Role>()?;
    let values = right
        .split('|')
        .map(|value| unquote(value.trim()).to_string())
        .filter(|value| !value.is_empty())
        .collect::<Vec<_>>();
    if values.is_empty() {
        return Err(anyhow!("Selection '{trimmed}' names no value"));
    }
    Ok((role, values))
}

fn unquote(value: &str) -> &str {
    if value.len() >= 2 {
        let bytes = value.as_bytes();
        if (bytes[0] == b'"' && bytes[value.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[value.len() - 1] == b'\'')
        {
            return &value[1..value.len() - 1];
        }
    }
    value
}

struct RoleCondition<'a> {
    column: &'a Column,
    accepted: &'a BTreeSet<String>,
}

/// Rows of `table` passing every role selection and, when set, the search text.
/// Row order is preserved.
pub fn apply(table: &Table, roles: &RoleAssignment, state: &FilterState) -> Table {
    let conditions = state
        .selections
        .iter()
        .filter(|(_, values)| !values.is_empty())
        .filter_map(|(role, accepted)| {
            let column = roles.column(*role).and_then(|name| table.column(name));
            if column.is_none() {
                debug!("Ignoring selection on unassigned role '{role}'");
            }
            column.map(|column| RoleCondition { column, accepted })
        })
        .collect::<Vec<_>>();
    let needle = state.search_text().map(str::to_lowercase);

    let kept = (0..table.row_count())
        .filter(|&row| {
            conditions
                .iter()
                .all(|condition| evaluate_condition(condition, row))
        })
        .filter(|&row| match &needle {
            Some(needle) => row_contains(table, row, needle),
            None => true,
        })
        .collect::<Vec<_>>();
    debug!(
        "Filter kept {} of {} row(s)",
        kept.len(),
        table.row_count()
    );
    table.select_rows(&kept)
}

fn evaluate_condition(condition: &RoleCondition<'_>, row: usize) -> bool {
    condition
        .column
        .cells
        .get(row)
        .and_then(|cell| cell.as_ref())
        .is_some_and(|value| condition.accepted.contains(&value.as_display()))
}

fn row_contains(table: &Table, row: usize, needle: &str) -> bool {
    table
        .row(row)
        .flatten()
        .any(|value| value.as_display().to_lowercase().contains(needle))
}

/// Sorted distinct string forms of the non-null values in the role's column.
pub fn selectable_values(
    table: &Table,
    roles: &RoleAssignment,
    role: Role,
) -> Option<Vec<String>> {
    let column = roles.column(role).and_then(|name| table.column(name))?;
    let values = column
        .cells
        .iter()
        .flatten()
        .map(Value::as_display)
        .collect::<BTreeSet<_>>();
    if values.is_empty() {
        None
    } else {
        Some(values.into_iter().collect())
    }
}
