// crates/formbuilder-config/tests/config_validation.rs
// =============================================================================
// Module: Instance Config Validation Tests
// Description: Validate loading, defaults, and fail-closed checks for formbuilder.toml.
// Purpose: Ensure invalid instance configuration never reaches startup.
// =============================================================================

//! Instance config validation tests for formbuilder-config.

use formbuilder_config::AuthRole;
use formbuilder_config::FormBuilderConfig;
use formbuilder_config::load_form_from_toml;
use formbuilder_store_sqlite::SqliteStoreMode;
use tempfile::TempDir;

mod common;

use common::TestResult;
use common::assert_invalid;
use common::config_from_toml;
use common::minimal_config;
use common::write_file;

#[test]
fn empty_config_uses_loopback_defaults() -> TestResult {
    let config = minimal_config().map_err(|err| err.to_string())?;
    config.validate().map_err(|err| err.to_string())?;
    assert_eq!(config.server.bind, "127.0.0.1:8080");
    assert_eq!(config.general.session_id_bytes, 8);
    assert_eq!(config.form.table_name(), "form");
    assert_eq!(config.upload.allowed_extensions, vec!["csv".to_string(), "xlsx".to_string()]);
    assert!(config.auth.tokens.is_empty());
    assert!(config.email.is_none());
    assert!(config.audit.enabled);
    let options = config.analytics.options();
    assert!(!options.session_data && !options.honeypot_check && !options.elapsed_time_check);
    Ok(())
}

#[test]
fn full_config_round_trips_from_disk() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let path = write_file(
        dir.path(),
        "formbuilder.toml",
        r#"
[general]
session_id_bytes = 12

[form]
path = "config/Job Application.xlsx"

[datastore]
type = "sqlite"
path = "data/forms.sqlite"
journal_mode = "delete"

[analytics]
l2 = true
l3 = true
[analytics.sessiondata]
ipinfo_token = "tok"

[email]
provider_name = "mailgun"
api_url = "https://api.example/v3/messages"
api_key = "key-123"
sender_address = "forms@example.org"

[server]
bind = "0.0.0.0:9000"

[[auth.tokens]]
token = "viewer-token"

[[auth.tokens]]
token = "upload-token"
role = "uploader"

[dashboard]
breakdown_field = "category"
"#,
    )?;
    let config = FormBuilderConfig::load(Some(&path)).map_err(|err| err.to_string())?;
    assert_eq!(config.form.table_name(), "job_application");
    assert_eq!(config.datastore.sqlite_config().journal_mode, SqliteStoreMode::Delete);
    assert_eq!(config.auth.tokens[0].role, AuthRole::Viewer);
    assert_eq!(config.auth.tokens[1].role, AuthRole::Uploader);
    let options = config.analytics.options();
    assert!(options.session_data && options.honeypot_check && options.elapsed_time_check);
    let email = config.email.ok_or("email section missing")?;
    assert_eq!(email.reminder_field, "email");
    Ok(())
}

#[test]
fn missing_file_is_an_io_error() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    assert_invalid(FormBuilderConfig::load(Some(&dir.path().join("absent.toml"))), "config io error")
}

#[test]
fn unknown_keys_are_rejected() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let path = write_file(dir.path(), "formbuilder.toml", "[server]\nport = 80\n")?;
    assert_invalid(FormBuilderConfig::load(Some(&path)), "config parse error")
}

#[test]
fn oversized_file_is_rejected() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let padding = format!("# {}\n", "x".repeat(1024 * 1024));
    let path = write_file(dir.path(), "formbuilder.toml", &padding)?;
    assert_invalid(FormBuilderConfig::load(Some(&path)), "size limit")
}

#[test]
fn public_bind_requires_tokens() -> TestResult {
    let mut config = minimal_config().map_err(|err| err.to_string())?;
    config.server.bind = "0.0.0.0:8080".to_string();
    assert_invalid(config.validate(), "auth.tokens must be set")
}

#[test]
fn session_id_bytes_has_a_floor() -> TestResult {
    let mut config = minimal_config().map_err(|err| err.to_string())?;
    config.general.session_id_bytes = 4;
    assert_invalid(config.validate(), "general.session_id_bytes")
}

#[test]
fn unsupported_upload_extensions_are_rejected() -> TestResult {
    let config = config_from_toml("[upload]\nallowed_extensions = [\"csv\", \"exe\"]\n")
        .map_err(|err| err.to_string())?;
    assert_invalid(config.validate(), "exe")
}

#[test]
fn form_path_must_be_xlsx_or_toml() -> TestResult {
    let config =
        config_from_toml("[form]\npath = \"form.yaml\"\n").map_err(|err| err.to_string())?;
    assert_invalid(config.validate(), "form.path")
}

#[test]
fn table_name_override_is_checked() -> TestResult {
    let config = config_from_toml("[form]\ntable_name = \"sqlite_master\"\n")
        .map_err(|err| err.to_string())?;
    assert_invalid(config.validate(), "form table name")
}

#[test]
fn email_requires_http_endpoint() -> TestResult {
    let config = config_from_toml(
        r#"
[email]
provider_name = "smtp"
api_url = "ftp://mail.example"
api_key = "k"
sender_address = "forms@example.org"
"#,
    )
    .map_err(|err| err.to_string())?;
    assert_invalid(config.validate(), "email.api_url")
}

#[test]
fn whitespace_tokens_are_rejected() -> TestResult {
    let config = config_from_toml("[[auth.tokens]]\ntoken = \"has space\"\n")
        .map_err(|err| err.to_string())?;
    assert_invalid(config.validate(), "whitespace")
}

#[test]
fn references_into_the_form_are_checked() -> TestResult {
    let form = load_form_from_toml(
        r#"
[[pages]]
page_number = 1
title = "One"
description = ""

[[fields]]
backend_field_name = "category"
field_label = "Category"
page_number = 1
field_type = "text-input"
data_type = "string"
required = "no"
"#,
    )
    .map_err(|err| err.to_string())?;
    let ok = config_from_toml("[dashboard]\nbreakdown_field = \"category\"\n")
        .map_err(|err| err.to_string())?;
    ok.validate_against(&form).map_err(|err| err.to_string())?;

    let bad = config_from_toml("[dashboard]\nbreakdown_field = \"colour\"\n")
        .map_err(|err| err.to_string())?;
    assert_invalid(bad.validate_against(&form), "colour")
}
