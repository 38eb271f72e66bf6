// crates/formbuilder-cli/tests/cli_commands.rs
// ============================================================================
// Module: CLI Command Tests
// Description: Integration tests for the offline `formbuilder` commands.
// Purpose: Run the binary against a temporary config, form, and database.
// Dependencies: formbuilder-cli binary, formbuilder-server, tempfile
// ============================================================================
//! ## Overview
//! Each test writes a config and form definition into a temporary directory
//! and runs the compiled binary there, so relative paths in the config
//! resolve inside the sandbox.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Output;

use formbuilder_config::UploadConfig;
use formbuilder_server::decode_upload;
use serde_json::Value;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

const FORM: &str = r#"
[[pages]]
page_number = 1
title = "About you"
description = "Basics"

[[fields]]
backend_field_name = "full_name"
field_label = "Full name"
page_number = 1
field_type = "input"
data_type = "string"
required = "yes"

[[fields]]
backend_field_name = "team"
field_label = "Team"
page_number = 1
field_type = "select"
data_type = "string"
required = "no"
select_options = "Red,Blue"
"#;

const CONFIG: &str = r#"
[form]
path = "survey.toml"

[datastore]
path = "data/survey.sqlite"

[audit]
enabled = false
"#;

fn formbuilder_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_formbuilder"))
}

fn workspace() -> TempDir {
    let dir = tempfile::tempdir().expect("temp dir");
    fs::write(dir.path().join("survey.toml"), FORM).expect("write form");
    fs::write(dir.path().join("formbuilder.toml"), CONFIG).expect("write config");
    dir
}

fn run(dir: &Path, args: &[&str]) -> Output {
    Command::new(formbuilder_bin())
        .current_dir(dir)
        .env_remove("FORMBUILDER_CONFIG")
        .args(args)
        .output()
        .expect("run formbuilder")
}

fn stdout_json(output: &Output) -> Value {
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    serde_json::from_slice(&output.stdout).expect("stdout json")
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn config_validate_reports_form_summary() {
    let dir = workspace();
    let output = run(dir.path(), &["config", "validate"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("2 fields"));
    assert!(stdout.contains("table survey"));
}

#[test]
fn config_validate_rejects_unknown_breakdown_field() {
    let dir = workspace();
    let config = format!("{CONFIG}\n[dashboard]\nbreakdown_field = \"missing\"\n");
    fs::write(dir.path().join("formbuilder.toml"), config).unwrap();
    let output = run(dir.path(), &["config", "validate"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("breakdown_field"));
}

#[test]
fn form_render_is_stable() {
    let dir = workspace();
    let first = run(dir.path(), &["form", "render"]);
    let second = run(dir.path(), &["form", "render"]);
    assert!(first.status.success());
    assert_eq!(first.stdout, second.stdout);
    let markup = String::from_utf8_lossy(&first.stdout);
    assert!(markup.contains("name=\"team\""));
    assert!(markup.contains("Blue"));
}

#[test]
fn store_sync_creates_then_reports_nothing_new() {
    let dir = workspace();
    let first = stdout_json(&run(dir.path(), &["store", "sync"]));
    assert_eq!(first["created"], true);
    let second = stdout_json(&run(dir.path(), &["store", "sync"]));
    assert_eq!(second["created"], false);
    assert_eq!(second["added_columns"], serde_json::json!([]));
}

#[test]
fn import_then_export_round_trips_rows() {
    let dir = workspace();
    fs::write(dir.path().join("rows.csv"), "id,full_name,team\nr1,Ada,Red\n,Grace,Blue\n").unwrap();
    let report = stdout_json(&run(dir.path(), &["store", "import", "--input", "rows.csv"]));
    assert_eq!(report["rows"], 2);
    assert_eq!(report["generated_ids"], 1);

    let rows = stdout_json(&run(dir.path(), &["store", "export"]));
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows.iter().any(|row| row["id"] == "r1" && row["team"] == "Red"));

    let output = run(dir.path(), &["store", "export", "--format", "parquet", "--output", "out.parquet"]);
    assert!(output.status.success());
    let bytes = fs::read(dir.path().join("out.parquet")).unwrap();
    assert!(bytes.starts_with(b"PAR1"));
}

#[test]
fn binary_export_requires_output_path() {
    let dir = workspace();
    let output = run(dir.path(), &["store", "export", "--format", "excel"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("--output"));

    let output = run(dir.path(), &["store", "export", "--format", "csv"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unsupported format"));
}

#[test]
fn template_lists_form_fields() {
    let dir = workspace();
    let output = run(dir.path(), &["template", "--output", "template.xlsx"]);
    assert!(output.status.success());
    let bytes = fs::read(dir.path().join("template.xlsx")).unwrap();
    let table = decode_upload("template.xlsx", &bytes, &UploadConfig::default()).unwrap();
    assert_eq!(table.columns(), ["full_name", "team"]);
}

#[test]
fn missing_config_fails_closed() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(dir.path(), &["store", "sync"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("config load failed"));
}
