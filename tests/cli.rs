mod common;

use std::fs;

use assert_cmd::Command;
use inventory_lens::export::export_workbook;
use inventory_lens::loader::{Source, load};
use predicates::prelude::*;
use predicates::str::contains;

use common::{TITLED_CSV, TestWorkspace, inventory_table, string_table};

fn bin() -> Command {
    let mut cmd = Command::cargo_bin("inventory-lens").expect("binary exists");
    cmd.env("RUST_LOG", "off");
    cmd
}

fn workbook(workspace: &TestWorkspace) -> std::path::PathBuf {
    let (table, _) = inventory_table();
    let notes = string_table(&["Nota"], &[&["revisar"]]);
    let bytes = export_workbook(&[("Resumo", &notes), ("TEC", &table)]).expect("workbook");
    workspace.write_bytes("inventario.xlsx", &bytes)
}

#[test]
fn sheets_lists_every_sheet() {
    let workspace = TestWorkspace::new();
    let path = workbook(&workspace);
    bin()
        .args(["sheets", "-i", path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(contains("Resumo").and(contains("TEC")).and(contains("ok")));
}

#[test]
fn roles_prefers_tec_sheet() {
    let workspace = TestWorkspace::new();
    let path = workbook(&workspace);
    bin()
        .args(["roles", "-i", path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(contains("Data de entrega").and(contains("Usuário")));
}

#[test]
fn values_lists_sorted_distinct_values() {
    let workspace = TestWorkspace::new();
    let path = workbook(&workspace);
    bin()
        .args(["values", "-i", path.to_str().unwrap(), "--role", "brand"])
        .assert()
        .success()
        .stdout("Dell\nLG\nLenovo\nLogitech\n");
}

#[test]
fn view_applies_selections_and_search() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("TEC.csv", TITLED_CSV);
    bin()
        .args([
            "view",
            "-i",
            path.to_str().unwrap(),
            "--select",
            "status=EM USO",
            "--search",
            "monitor",
        ])
        .assert()
        .success()
        .stdout(contains("P2422").and(contains("5420").not()).and(contains("(1 rows)")));
}

#[test]
fn summary_emits_json() {
    let workspace = TestWorkspace::new();
    let path = workbook(&workspace);
    let output = bin()
        .args(["summary", "-i", path.to_str().unwrap(), "--json"])
        .output()
        .expect("run summary");
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json output");
    assert_eq!(json["total"], 5);
    assert_eq!(json["status"]["in_stock"], 1);
    assert_eq!(json["categories"].as_array().unwrap().len(), 3);
}

#[test]
fn summary_text_reports_missing_roles() {
    let workspace = TestWorkspace::new();
    let path = workbook(&workspace);
    bin()
        .args(["summary", "-i", path.to_str().unwrap(), "--sheet", "Resumo"])
        .assert()
        .success()
        .stdout(contains("Total assets: 1").and(contains("no data for this view")));
}

#[test]
fn unknown_sheet_fails_with_available_names() {
    let workspace = TestWorkspace::new();
    let path = workbook(&workspace);
    bin()
        .args(["view", "-i", path.to_str().unwrap(), "--sheet", "OPS"])
        .assert()
        .failure()
        .stderr(contains("error:").and(contains("Resumo, TEC")));
}

#[test]
fn invalid_selection_is_rejected() {
    let workspace = TestWorkspace::new();
    let path = workbook(&workspace);
    bin()
        .args(["view", "-i", path.to_str().unwrap(), "--select", "colour=red"])
        .assert()
        .failure()
        .stderr(contains("Unknown role 'colour'"));
}

#[test]
fn export_writes_filtered_workbook() {
    let workspace = TestWorkspace::new();
    let path = workbook(&workspace);
    let output = workspace.path().join("inventory_filtered.xlsx");
    bin()
        .args([
            "export",
            "-i",
            path.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--select",
            "item=Notebook",
        ])
        .assert()
        .success();

    let bytes = fs::read(&output).expect("read export");
    let sheets = load(&Source::from_bytes("inventory_filtered.xlsx", bytes)).unwrap();
    assert_eq!(sheets.names(), vec!["Filtered"]);
    assert_eq!(sheets.get("Filtered").unwrap().row_count(), 2);
}

#[test]
fn export_writes_delimited_text_for_csv_paths() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("TEC.csv", TITLED_CSV);
    let output = workspace.path().join("out.tsv");
    bin()
        .args([
            "export",
            "-i",
            path.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--select",
            "brand=Dell",
        ])
        .assert()
        .success();

    let contents = fs::read_to_string(&output).expect("read export");
    let lines = contents.lines().collect::<Vec<_>>();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("\"Item\"\t\"Marca\""));
}

#[test]
fn export_all_sheets_keeps_every_sheet() {
    let workspace = TestWorkspace::new();
    let path = workbook(&workspace);
    let output = workspace.path().join("all.xlsx");
    bin()
        .args([
            "export",
            "-i",
            path.to_str().unwrap(),
            "-o",
            output.to_str().unwrap(),
            "--all-sheets",
        ])
        .assert()
        .success();

    let bytes = fs::read(&output).expect("read export");
    let sheets = load(&Source::from_bytes("all.xlsx", bytes)).unwrap();
    assert_eq!(sheets.names(), vec!["Resumo", "TEC"]);
}

#[test]
fn profile_overrides_role_keywords() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("TEC.csv", TITLED_CSV);
    let profile = workspace.write(
        "profile.yaml",
        "roles:\n  brand: [modelo]\nheader:\n  min_filled: 6\n",
    );
    bin()
        .args([
            "values",
            "-i",
            path.to_str().unwrap(),
            "--profile",
            profile.to_str().unwrap(),
            "--role",
            "brand",
        ])
        .assert()
        .success()
        .stdout(contains("T14").and(contains("Lenovo").not()));
}

#[test]
fn empty_input_reports_error() {
    let workspace = TestWorkspace::new();
    let path = workspace.write("empty.csv", "");
    bin()
        .args(["sheets", "-i", path.to_str().unwrap()])
        .assert()
        .failure()
        .stderr(contains("is empty"));
}
