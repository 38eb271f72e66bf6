// crates/formbuilder-server/src/upload.rs
// ============================================================================
// Module: Bulk Upload Decoding
// Description: CSV and XLSX decoders for bulk imports, plus the import template.
// Purpose: Turn uploaded files into text tables for the datastore.
// Dependencies: calamine, csv, formbuilder-config, formbuilder-core
// ============================================================================

//! ## Overview
//! Uploaded files are decoded into a [`Table`] of text cells; the datastore
//! coerces each cell to its column type during the bulk upsert. Blank cells
//! become nulls and fully blank rows are dropped. The extension allow-list and
//! size limit come from `[upload]`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Cursor;

use calamine::Data;
use calamine::Reader;
use calamine::Xlsx;
use formbuilder_config::UploadConfig;
use formbuilder_core::FieldValue;
use formbuilder_core::FormSchema;
use formbuilder_core::Table;
use thiserror::Error;

use crate::export::ExportError;
use crate::export::encode_xlsx_header;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Upload decoding failures.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Extension is not on the allow-list.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    /// File exceeds the configured size.
    #[error("upload exceeds {0} bytes")]
    TooLarge(usize),
    /// File could not be decoded.
    #[error("upload decode failed: {0}")]
    Decode(String),
}

// ============================================================================
// SECTION: Decoding
// ============================================================================

/// Decodes an uploaded file selected by its extension.
///
/// # Errors
///
/// Returns [`UploadError`] when the extension is not allowed, the file is too
/// large, or decoding fails.
pub fn decode_upload(
    filename: &str,
    bytes: &[u8],
    config: &UploadConfig,
) -> Result<Table, UploadError> {
    let extension = config
        .allowed_extension(filename)
        .ok_or_else(|| UploadError::UnsupportedFormat(filename.to_string()))?;
    if bytes.len() > config.max_bytes {
        return Err(UploadError::TooLarge(config.max_bytes));
    }
    match extension.as_str() {
        "csv" => decode_csv(bytes),
        "xlsx" => decode_xlsx(bytes),
        other => Err(UploadError::UnsupportedFormat(other.to_string())),
    }
}

/// Decodes a CSV file with a header row.
///
/// # Errors
///
/// Returns [`UploadError::Decode`] on malformed CSV or ragged rows.
pub fn decode_csv(bytes: &[u8]) -> Result<Table, UploadError> {
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(bytes);
    let columns: Vec<String> = reader
        .headers()
        .map_err(|err| UploadError::Decode(err.to_string()))?
        .iter()
        .map(|header| header.trim().to_string())
        .collect();
    let mut table = Table::new(columns);
    for record in reader.records() {
        let record = record.map_err(|err| UploadError::Decode(err.to_string()))?;
        let row: Vec<FieldValue> = record.iter().map(text_cell).collect();
        push_non_blank(&mut table, row)?;
    }
    Ok(table)
}

/// Decodes the first worksheet of an XLSX workbook.
///
/// # Errors
///
/// Returns [`UploadError::Decode`] when the workbook cannot be read or has
/// no sheets.
pub fn decode_xlsx(bytes: &[u8]) -> Result<Table, UploadError> {
    let mut workbook = Xlsx::new(Cursor::new(bytes.to_vec()))
        .map_err(|err: calamine::XlsxError| UploadError::Decode(err.to_string()))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| UploadError::Decode("workbook has no sheets".to_string()))?
        .map_err(|err| UploadError::Decode(err.to_string()))?;
    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(Table::default());
    };
    let columns: Vec<String> = header.iter().map(|cell| cell_text(cell).trim().to_string()).collect();
    let mut table = Table::new(columns);
    for row in rows {
        let values: Vec<FieldValue> = row.iter().map(|cell| text_cell(&cell_text(cell))).collect();
        push_non_blank(&mut table, values)?;
    }
    Ok(table)
}

/// Builds the import template: one header column per form field.
///
/// # Errors
///
/// Returns [`ExportError`] when the workbook cannot be written.
pub fn upload_template(schema: &FormSchema) -> Result<Vec<u8>, ExportError> {
    encode_xlsx_header(&schema.response_template())
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Maps blank text to null.
fn text_cell(raw: &str) -> FieldValue {
    if raw.trim().is_empty() { FieldValue::Null } else { FieldValue::from(raw) }
}

/// Appends `row` unless every value is null.
fn push_non_blank(table: &mut Table, row: Vec<FieldValue>) -> Result<(), UploadError> {
    if row.iter().all(FieldValue::is_null) {
        return Ok(());
    }
    table.push_row(row).map_err(|err| UploadError::Decode(err.to_string()))
}

/// Renders a worksheet cell as text.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(text) => text.clone(),
        Data::Int(number) => number.to_string(),
        Data::Float(number) => number.to_string(),
        Data::Bool(flag) => flag.to_string(),
        other => other.to_string(),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions on known inputs.")]

    use super::*;

    #[test]
    fn csv_blank_cells_become_null_and_blank_rows_drop() {
        let table = decode_csv(b"id,name, score \nA1,Ada,3\n,,\nA2,,4\n").unwrap();
        assert_eq!(table.columns(), ["id", "name", "score"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.value(1, "name"), Some(&FieldValue::Null));
        assert_eq!(table.value(1, "score"), Some(&FieldValue::from("4")));
    }

    #[test]
    fn ragged_csv_is_rejected() {
        assert!(matches!(decode_csv(b"a,b\n1,2,3\n"), Err(UploadError::Decode(_))));
    }

    #[test]
    fn disallowed_extension_is_unsupported() {
        let config = UploadConfig {
            allowed_extensions: vec!["csv".to_string()],
            max_bytes: 1024,
        };
        assert!(matches!(
            decode_upload("rows.xlsx", b"", &config),
            Err(UploadError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            decode_upload("rows.CSV", &[b'a'; 2048], &config),
            Err(UploadError::TooLarge(1024))
        ));
        assert_eq!(decode_upload("rows.csv", b"a\n1\n", &config).unwrap().len(), 1);
    }
}
