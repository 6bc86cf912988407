#![allow(dead_code)]

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use inventory_lens::data::Value;
use inventory_lens::roles::{self, RoleAssignment};
use inventory_lens::table::{Column, Table};
use tempfile::{TempDir, tempdir};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        self.write_bytes(name, contents.as_bytes())
    }

    pub fn write_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents).expect("write temp file contents");
        path
    }
}

pub fn text(value: &str) -> Option<Value> {
    Some(Value::String(value.to_string()))
}

pub fn date(year: i32, month: u32, day: u32) -> Option<Value> {
    Some(Value::Date(
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date"),
    ))
}

/// Builds a table of string cells; empty strings become null cells.
pub fn string_table(headers: &[&str], rows: &[&[&str]]) -> Table {
    let columns = headers
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let cells = rows
                .iter()
                .map(|row| row.get(idx).filter(|v| !v.is_empty()).and_then(|v| text(v)))
                .collect();
            Column::new(*name, cells)
        })
        .collect();
    Table::new(columns).expect("valid table")
}

/// Small inventory sheet used across the integration tests.
pub fn inventory_table() -> (Table, RoleAssignment) {
    let table = string_table(
        &["Item", "Marca", "Modelo", "Usuário", "Status", "Data de entrega"],
        &[
            &["Notebook", "Dell", "5420", "ana", "EM USO", "2024-01-10"],
            &["Notebook", "Lenovo", "T14", "bruno", "EM ESTOQUE", "2024-01-22"],
            &["Monitor", "Dell", "P2422", "", "EM USO", "2024-03-05"],
            &["Mouse", "Logitech", "M90", "carla", "RESERVADO", ""],
            &["Monitor", "LG", "24MK", "davi", "", "sem data"],
        ],
    );
    let roles = roles::resolve(&table);
    (table, roles)
}

/// Sample CSV with a title block above the header, as exported by inventory tools.
pub const TITLED_CSV: &str = "\
,,,,,
,,,,,
,,,,,
Inventário TI 2024,,,,,
Item,Marca,Modelo,Usuário,Status,Data de entrega
Notebook,Dell,5420,ana,EM USO,2024-01-10
Notebook,Lenovo,T14,bruno,EM ESTOQUE,2024-01-22
Monitor,Dell,P2422,,EM USO,2024-03-05
Mouse,Logitech,M90,carla,RESERVADO,
";
