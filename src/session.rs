//! One user's pipeline: cached load, sheet choice, role resolution, filtering
//! and summary, recomputed from explicit inputs on every call.

use std::sync::Arc;

use anyhow::{Result, anyhow};
use log::info;

use crate::{
    cache::SourceCache,
    filter::{self, FilterState},
    loader::{LoadOptions, Source},
    profile::Profile,
    roles::RoleAssignment,
    summary::{self, Summary},
    table::{SheetSet, Table},
};

#[derive(Debug, Clone)]
pub struct Dashboard {
    pub sheet: String,
    pub roles: RoleAssignment,
    /// Rows of the sheet passing the filter state.
    pub view: Table,
    pub summary: Summary,
}

#[derive(Debug)]
pub struct Session {
    profile: Profile,
    load_options: LoadOptions,
    cache: SourceCache,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(Profile::default())
    }
}

impl Session {
    pub fn new(profile: Profile) -> Self {
        let load_options = profile.load_options();
        Self {
            profile,
            load_options,
            cache: SourceCache::new(),
        }
    }

    /// Overrides the text delimiter and encoding; header thresholds stay the profile's.
    pub fn with_load_options(mut self, options: LoadOptions) -> Self {
        self.load_options = LoadOptions {
            header: self.profile.header,
            ..options
        };
        self
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn sheets(&mut self, source: &Source) -> Result<Arc<SheetSet>> {
        Ok(self.cache.get_or_load(source, &self.load_options)?)
    }

    /// The requested sheet, or the profile's preferred/first sheet.
    pub fn select_sheet(&self, sheets: &SheetSet, requested: Option<&str>) -> Result<String> {
        match requested {
            Some(name) if sheets.get(name).is_some() => Ok(name.to_string()),
            Some(name) => Err(anyhow!(
                "Sheet '{name}' not found. Available sheets: {}",
                sheets.names().join(", ")
            )),
            None => sheets
                .default_sheet(&self.profile.preferred_sheets)
                .map(str::to_string)
                .ok_or_else(|| anyhow!("Source has no sheets")),
        }
    }

    /// Loads (or reuses) the sheet and resolves its roles without filtering.
    pub fn open(
        &mut self,
        source: &Source,
        sheet: Option<&str>,
    ) -> Result<(String, Table, RoleAssignment)> {
        let sheets = self.sheets(source)?;
        let name = self.select_sheet(&sheets, sheet)?;
        let table = sheets
            .get(&name)
            .cloned()
            .ok_or_else(|| anyhow!("Sheet '{name}' disappeared from the loaded source"))?;
        if let Some(message) = table.error_message() {
            return Err(anyhow!("Sheet '{name}' could not be parsed: {message}"));
        }
        let roles = self.profile.roles.resolve(&table.headers());
        Ok((name, table, roles))
    }

    pub fn dashboard(
        &mut self,
        source: &Source,
        sheet: Option<&str>,
        state: &FilterState,
    ) -> Result<Dashboard> {
        let (sheet, table, roles) = self.open(source, sheet)?;
        let view = filter::apply(&table, &roles, state);
        info!(
            "Sheet '{sheet}': {} of {} row(s) in view",
            view.row_count(),
            table.row_count()
        );
        let summary = summary::summarize_with(&view, &roles, &self.profile.summary_options());
        Ok(Dashboard {
            sheet,
            roles,
            view,
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::Role;

    const CSV: &str = "Item,Status,Data\nMouse,EM USO,2024-01-10\nCable,EM ESTOQUE,2024-02-01\nMouse,EM ESTOQUE,\n";

    fn source() -> Source {
        Source::from_bytes("TEC.csv", CSV.as_bytes().to_vec())
    }

    #[test]
    fn dashboard_filters_and_summarizes() {
        let mut session = Session::default();
        let mut state = FilterState::new();
        state.select(Role::Item, "Mouse");
        let dashboard = session.dashboard(&source(), None, &state).unwrap();
        assert_eq!(dashboard.sheet, "TEC");
        assert_eq!(dashboard.view.row_count(), 2);
        assert_eq!(dashboard.summary.total, 2);
        let status = dashboard.summary.status.unwrap();
        assert_eq!((status.in_use, status.in_stock), (1, 1));
        assert_eq!(dashboard.summary.monthly.unwrap().len(), 1);
    }

    #[test]
    fn unknown_sheet_lists_available_names() {
        let mut session = Session::default();
        let err = session
            .dashboard(&source(), Some("OPS"), &FilterState::new())
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("OPS") && message.contains("TEC"));
    }

    #[test]
    fn sheet_with_error_column_opens_normally() {
        let mut session = Session::default();
        let source = Source::from_bytes("log.csv", "_error\nE-17\nE-42\n".as_bytes().to_vec());
        let (name, table, _) = session.open(&source, None).unwrap();
        assert_eq!(name, "log");
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn repeated_calls_reuse_the_cached_load() {
        let mut session = Session::default();
        let first = session.sheets(&source()).unwrap();
        let second = session.sheets(&source()).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
