// crates/formbuilder-config/tests/form_reader.rs
// =============================================================================
// Module: Form Definition Reader Tests
// Description: Read Pages/Fields definitions from TOML documents and workbooks.
// Purpose: Ensure both sources yield identical, validated form schemas.
// =============================================================================

//! Form definition reader tests for formbuilder-config.

use std::path::Path;

use formbuilder_config::FormConfigError;
use formbuilder_config::load_form;
use formbuilder_config::load_form_from_toml;
use formbuilder_core::DataType;
use formbuilder_core::InputKind;
use formbuilder_core::SchemaError;
use rust_xlsxwriter::Workbook;
use tempfile::TempDir;

mod common;

use common::TestResult;
use common::write_file;

const SAMPLE_FORM: &str = r#"
[[pages]]
page_number = 2
title = "Details"
description = "Tell us more"

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
group_id = "g1"

[[fields]]
backend_field_name = "age"
field_label = "Age"
page_number = 1
field_type = "text-input"
data_type = "integer"
required = false
group_id = "g1"

[[fields]]
backend_field_name = "category"
field_label = "Category"
page_number = 2
field_type = "select"
data_type = "string"
required = "Y"
select_options = " A, B ,,C "

[[fields]]
backend_field_name = "notes"
field_label = "Notes"
page_number = 2
field_type = "textarea"
data_type = "string"
required = "0"
"#;

fn write_workbook(path: &Path, pages: &[[&str; 3]], fields: &[[&str; 8]]) -> TestResult {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Pages").map_err(|err| err.to_string())?;
    for (row, values) in std::iter::once(&["page_number", "title", "description"]).chain(pages).enumerate() {
        for (col, value) in values.iter().enumerate() {
            write_cell(sheet, row, col, value)?;
        }
    }
    let sheet = workbook.add_worksheet();
    sheet.set_name("Fields").map_err(|err| err.to_string())?;
    let header = [
        "backend_field_name",
        "field_label",
        "page_number",
        "field_type",
        "data_type",
        "required",
        "group_id",
        "select_options",
    ];
    for (row, values) in std::iter::once(&header).chain(fields).enumerate() {
        for (col, value) in values.iter().enumerate() {
            write_cell(sheet, row, col, value)?;
        }
    }
    workbook.save(path).map_err(|err| err.to_string())
}

fn write_cell(
    sheet: &mut rust_xlsxwriter::Worksheet,
    row: usize,
    col: usize,
    value: &str,
) -> TestResult {
    let row = u32::try_from(row).map_err(|err| err.to_string())?;
    let col = u16::try_from(col).map_err(|err| err.to_string())?;
    if value.is_empty() {
        return Ok(());
    }
    if let Ok(number) = value.parse::<f64>() {
        sheet.write_number(row, col, number).map_err(|err| err.to_string())?;
    } else {
        sheet.write_string(row, col, value).map_err(|err| err.to_string())?;
    }
    Ok(())
}

#[test]
fn toml_document_yields_ordered_pages_and_parsed_fields() -> TestResult {
    let schema = load_form_from_toml(SAMPLE_FORM).map_err(|err| err.to_string())?;
    let pages: Vec<u32> = schema.pages().iter().map(|page| page.page_number).collect();
    assert_eq!(pages, vec![1, 2]);
    let names: Vec<&str> = schema.fields().iter().map(|field| field.backend_name.as_str()).collect();
    assert_eq!(names, vec!["full_name", "age", "category", "notes"]);

    let age = schema.field("age").ok_or("age missing")?;
    assert_eq!(age.input_kind, InputKind::TextInput);
    assert_eq!(age.data_type, DataType::Integer);
    assert!(!age.required);
    assert_eq!(age.group_id.as_deref(), Some("g1"));

    let category = schema.field("category").ok_or("category missing")?;
    assert!(category.required);
    assert_eq!(category.select_options, vec!["A".to_string(), "B".to_string(), "C".to_string()]);
    assert_eq!(schema.field("notes").ok_or("notes missing")?.input_kind, InputKind::Paragraph);
    assert_eq!(schema.response_template().len(), 4);
    Ok(())
}

#[test]
fn workbook_and_toml_sources_agree() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let xlsx = dir.path().join("application.xlsx");
    write_workbook(
        &xlsx,
        &[["2", "Details", "Tell us more"], ["1", "About you", "Basics"]],
        &[
            ["full_name", "Full name", "1", "input", "string", "yes", "g1", ""],
            ["age", "Age", "1", "text-input", "integer", "no", "g1", ""],
            ["category", "Category", "2", "select", "string", "Y", "", " A, B ,,C "],
            ["notes", "Notes", "2", "textarea", "string", "0", "", ""],
        ],
    )?;
    let from_workbook = load_form(&xlsx).map_err(|err| err.to_string())?;
    let from_toml = load_form_from_toml(SAMPLE_FORM).map_err(|err| err.to_string())?;
    assert_eq!(from_workbook, from_toml);

    let toml_path = write_file(dir.path(), "application.toml", SAMPLE_FORM)?;
    assert_eq!(load_form(&toml_path).map_err(|err| err.to_string())?, from_toml);
    Ok(())
}

#[test]
fn missing_required_columns_are_reported() -> TestResult {
    let err = load_form_from_toml(
        "[[pages]]\npage_number = 1\ntitle = \"One\"\n\n[[fields]]\nbackend_field_name = \"x\"\n",
    )
    .err()
    .ok_or("expected failure")?;
    let message = err.to_string();
    if message.contains("Pages is missing required columns: description") {
        Ok(())
    } else {
        Err(message)
    }
}

#[test]
fn unknown_page_reference_is_rejected() -> TestResult {
    let document = SAMPLE_FORM.replace("page_number = 2\ntitle = \"Details\"", "page_number = 3\ntitle = \"Details\"");
    match load_form_from_toml(&document) {
        Err(FormConfigError::Schema(SchemaError::UnknownPage { field, page })) => {
            assert_eq!(field, "category");
            assert_eq!(page, 2);
            Ok(())
        }
        other => Err(format!("unexpected result: {other:?}")),
    }
}

#[test]
fn unparsable_required_flag_is_rejected() -> TestResult {
    let document = SAMPLE_FORM.replace("required = \"yes\"", "required = \"maybe\"");
    match load_form_from_toml(&document) {
        Err(FormConfigError::Format(message)) if message.contains("maybe") => Ok(()),
        other => Err(format!("unexpected result: {other:?}")),
    }
}

#[test]
fn reserved_field_names_are_rejected() -> TestResult {
    let document = SAMPLE_FORM.replace("backend_field_name = \"notes\"", "backend_field_name = \"timestamp\"");
    match load_form_from_toml(&document) {
        Err(FormConfigError::Schema(SchemaError::InvalidFieldName { name, .. })) => {
            assert_eq!(name, "timestamp");
            Ok(())
        }
        other => Err(format!("unexpected result: {other:?}")),
    }
}

#[test]
fn unsupported_document_type_is_rejected() -> TestResult {
    let dir = TempDir::new().map_err(|err| err.to_string())?;
    let path = write_file(dir.path(), "form.yaml", "pages: []")?;
    match load_form(&path) {
        Err(FormConfigError::Format(message)) if message.contains("yaml") => Ok(()),
        other => Err(format!("unexpected result: {other:?}")),
    }
}
