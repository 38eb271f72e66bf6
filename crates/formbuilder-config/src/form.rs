// crates/formbuilder-config/src/form.rs
// ============================================================================
// Module: Form Definition Reader
// Description: Reads page and field definitions from workbooks or TOML.
// Purpose: Turn a tabular form definition into a validated FormSchema.
// Dependencies: calamine, formbuilder-core, toml
// ============================================================================

//! ## Overview
//! A form definition is two tables, `Pages` and `Fields`, keyed by column
//! name. They may come from the sheets of an `.xlsx` workbook (header row
//! first) or from the `[[pages]]` and `[[fields]]` arrays of a `.toml`
//! document. Both sources are reduced to the same [`Sheet`] shape and parsed
//! by shared code, so validation is identical regardless of the source.
//! Reading is pure: nothing is cached and no global state is touched.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use calamine::Data;
use calamine::Reader;
use calamine::Xlsx;
use calamine::open_workbook;
use formbuilder_core::DataType;
use formbuilder_core::FieldDefinition;
use formbuilder_core::FormSchema;
use formbuilder_core::InputKind;
use formbuilder_core::PageDefinition;
use formbuilder_core::SchemaError;
use formbuilder_core::parse_bool;
use thiserror::Error;

use crate::config::MAX_CONFIG_FILE_SIZE;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Sheet holding page definitions.
pub const PAGES_SHEET: &str = "Pages";
/// Sheet holding field definitions.
pub const FIELDS_SHEET: &str = "Fields";
/// Required page columns.
pub const PAGE_COLUMNS: &[&str] = &["page_number", "title", "description"];
/// Required field columns.
pub const FIELD_COLUMNS: &[&str] = &[
    "backend_field_name",
    "field_label",
    "page_number",
    "field_type",
    "data_type",
    "required",
];

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Form definition errors.
#[derive(Debug, Error)]
pub enum FormConfigError {
    /// The form document could not be read.
    #[error("form config io error: {0}")]
    Io(String),
    /// The form document is malformed.
    #[error("form config format error: {0}")]
    Format(String),
    /// The definitions are structurally inconsistent.
    #[error("form config schema error: {0}")]
    Schema(#[from] SchemaError),
}

// ============================================================================
// SECTION: Sheet
// ============================================================================

/// Named table of text cells keyed by lowercase column name.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Sheet {
    /// Sheet name used in diagnostics.
    name: &'static str,
    /// Columns present in the source.
    columns: BTreeSet<String>,
    /// Rows as column-to-text maps.
    rows: Vec<BTreeMap<String, String>>,
}

impl Sheet {
    /// Fails when any `required` column is missing.
    fn require_columns(&self, required: &[&str]) -> Result<(), FormConfigError> {
        let missing: Vec<&str> =
            required.iter().copied().filter(|column| !self.columns.contains(*column)).collect();
        if missing.is_empty() {
            return Ok(());
        }
        Err(FormConfigError::Format(format!(
            "{} is missing required columns: {}",
            self.name,
            missing.join(", ")
        )))
    }
}

/// Returns the trimmed cell text, or an empty string.
fn cell<'a>(row: &'a BTreeMap<String, String>, column: &str) -> &'a str {
    row.get(column).map_or("", |value| value.trim())
}

// ============================================================================
// SECTION: Loading
// ============================================================================

/// Loads a form definition from a `.xlsx` workbook or `.toml` document.
///
/// # Errors
///
/// Returns [`FormConfigError`] when the file cannot be read, a required
/// column is missing, a cell does not parse, or the definitions are
/// inconsistent.
pub fn load_form(path: &Path) -> Result<FormSchema, FormConfigError> {
    let extension =
        path.extension().map(|ext| ext.to_string_lossy().to_ascii_lowercase()).unwrap_or_default();
    let (pages, fields) = match extension.as_str() {
        "xlsx" => read_workbook(path)?,
        "toml" => {
            let bytes = fs::read(path).map_err(|err| FormConfigError::Io(err.to_string()))?;
            if bytes.len() > MAX_CONFIG_FILE_SIZE {
                return Err(FormConfigError::Format("form document exceeds size limit".to_string()));
            }
            let content = std::str::from_utf8(&bytes)
                .map_err(|_| FormConfigError::Format("form document must be utf-8".to_string()))?;
            parse_toml_document(content)?
        }
        other => {
            return Err(FormConfigError::Format(format!(
                "unsupported form document type {other:?}; expected xlsx or toml"
            )));
        }
    };
    build_schema(&pages, &fields)
}

/// Parses a TOML form document.
///
/// # Errors
///
/// Returns [`FormConfigError`] when the document is malformed or inconsistent.
pub fn load_form_from_toml(content: &str) -> Result<FormSchema, FormConfigError> {
    let (pages, fields) = parse_toml_document(content)?;
    build_schema(&pages, &fields)
}

/// Reads both sheets from a workbook.
fn read_workbook(path: &Path) -> Result<(Sheet, Sheet), FormConfigError> {
    let mut workbook: Xlsx<_> =
        open_workbook(path).map_err(|err| FormConfigError::Io(format!("{err}")))?;
    let pages = read_sheet(&mut workbook, PAGES_SHEET)?;
    let fields = read_sheet(&mut workbook, FIELDS_SHEET)?;
    Ok((pages, fields))
}

/// Reads one sheet, using its first row as the header.
fn read_sheet<RS>(workbook: &mut Xlsx<RS>, name: &'static str) -> Result<Sheet, FormConfigError>
where
    RS: std::io::Read + std::io::Seek,
{
    let range = workbook
        .worksheet_range(name)
        .map_err(|err| FormConfigError::Format(format!("sheet {name}: {err}")))?;
    let mut rows = range.rows();
    let header: Vec<String> = rows
        .next()
        .map(|cells| cells.iter().map(|value| data_text(value).trim().to_ascii_lowercase()).collect())
        .unwrap_or_default();
    let mut sheet = Sheet {
        name,
        columns: header.iter().filter(|column| !column.is_empty()).cloned().collect(),
        rows: Vec::new(),
    };
    for cells in rows {
        let row: BTreeMap<String, String> = header
            .iter()
            .zip(cells.iter())
            .filter(|(column, _)| !column.is_empty())
            .map(|(column, value)| (column.clone(), data_text(value)))
            .collect();
        if row.values().all(|value| value.trim().is_empty()) {
            continue;
        }
        sheet.rows.push(row);
    }
    Ok(sheet)
}

/// Renders a workbook cell as text.
fn data_text(value: &Data) -> String {
    match value {
        Data::Empty => String::new(),
        Data::String(text) => text.clone(),
        Data::Int(number) => number.to_string(),
        Data::Float(number) => number.to_string(),
        Data::Bool(flag) => flag.to_string(),
        other => other.to_string(),
    }
}

/// Splits a TOML document into page and field sheets.
fn parse_toml_document(content: &str) -> Result<(Sheet, Sheet), FormConfigError> {
    let document: toml::Table =
        toml::from_str(content).map_err(|err| FormConfigError::Format(err.to_string()))?;
    let pages = toml_sheet(&document, "pages", PAGES_SHEET)?;
    let fields = toml_sheet(&document, "fields", FIELDS_SHEET)?;
    Ok((pages, fields))
}

/// Converts an array of tables into a sheet.
fn toml_sheet(
    document: &toml::Table,
    key: &str,
    name: &'static str,
) -> Result<Sheet, FormConfigError> {
    let entries = match document.get(key) {
        Some(toml::Value::Array(entries)) => entries.as_slice(),
        Some(_) => return Err(FormConfigError::Format(format!("{key} must be an array of tables"))),
        None => &[],
    };
    let mut sheet = Sheet {
        name,
        columns: BTreeSet::new(),
        rows: Vec::with_capacity(entries.len()),
    };
    for (index, entry) in entries.iter().enumerate() {
        let toml::Value::Table(table) = entry else {
            return Err(FormConfigError::Format(format!("{key}[{index}] must be a table")));
        };
        let row: BTreeMap<String, String> = table
            .iter()
            .map(|(column, value)| (column.trim().to_ascii_lowercase(), toml_text(value)))
            .collect();
        sheet.columns.extend(row.keys().cloned());
        sheet.rows.push(row);
    }
    Ok(sheet)
}

/// Renders a TOML value as cell text; arrays become comma-separated lists.
fn toml_text(value: &toml::Value) -> String {
    match value {
        toml::Value::String(text) => text.clone(),
        toml::Value::Array(items) => items.iter().map(toml_text).collect::<Vec<_>>().join(","),
        other => other.to_string(),
    }
}

// ============================================================================
// SECTION: Parsing
// ============================================================================

/// Parses both sheets and validates the result.
fn build_schema(pages: &Sheet, fields: &Sheet) -> Result<FormSchema, FormConfigError> {
    pages.require_columns(PAGE_COLUMNS)?;
    fields.require_columns(FIELD_COLUMNS)?;
    let pages = pages
        .rows
        .iter()
        .enumerate()
        .map(|(index, row)| parse_page(index, row))
        .collect::<Result<Vec<_>, _>>()?;
    let fields = fields
        .rows
        .iter()
        .enumerate()
        .map(|(index, row)| parse_field(index, row))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(FormSchema::new(pages, fields)?)
}

/// Parses one page row.
fn parse_page(index: usize, row: &BTreeMap<String, String>) -> Result<PageDefinition, FormConfigError> {
    Ok(PageDefinition {
        page_number: parse_page_number(PAGES_SHEET, index, cell(row, "page_number"))?,
        title: cell(row, "title").to_string(),
        description: cell(row, "description").to_string(),
    })
}

/// Parses one field row.
fn parse_field(
    index: usize,
    row: &BTreeMap<String, String>,
) -> Result<FieldDefinition, FormConfigError> {
    let backend_name = cell(row, "backend_field_name").to_string();
    let required_text = cell(row, "required");
    let required = parse_bool(required_text).ok_or_else(|| {
        FormConfigError::Format(format!(
            "{FIELDS_SHEET} row {}: required flag {required_text:?} is not yes/no",
            index + 1
        ))
    })?;
    let group_id = Some(cell(row, "group_id")).filter(|group| !group.is_empty()).map(str::to_string);
    let select_options = cell(row, "select_options")
        .split(',')
        .map(str::trim)
        .filter(|option| !option.is_empty())
        .map(str::to_string)
        .collect();
    Ok(FieldDefinition {
        label: cell(row, "field_label").to_string(),
        page_number: parse_page_number(FIELDS_SHEET, index, cell(row, "page_number"))?,
        group_id,
        input_kind: InputKind::parse(cell(row, "field_type")),
        data_type: DataType::parse(cell(row, "data_type")),
        required,
        select_options,
        backend_name,
    })
}

/// Parses a page number, accepting whole floats from spreadsheets.
fn parse_page_number(sheet: &str, index: usize, text: &str) -> Result<u32, FormConfigError> {
    let invalid = || {
        FormConfigError::Format(format!(
            "{sheet} row {}: page_number {text:?} is not a positive integer",
            index + 1
        ))
    };
    if let Ok(number) = text.parse::<u32>() {
        return Ok(number);
    }
    let (whole, fraction) = text.split_once('.').ok_or_else(invalid)?;
    if fraction.chars().all(|ch| ch == '0') {
        return whole.parse::<u32>().map_err(|_| invalid());
    }
    Err(invalid())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
