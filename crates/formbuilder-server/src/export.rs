// crates/formbuilder-server/src/export.rs
// ============================================================================
// Module: Dataset Export
// Description: Encoders from query tables to downloadable files.
// Purpose: Produce JSON, Excel, and Parquet downloads of stored submissions.
// Dependencies: arrow, formbuilder-core, parquet, rust_xlsxwriter, serde_json
// ============================================================================

//! ## Overview
//! [`export_table`] encodes a [`Table`] in one of the [`ExportFormat`]s. JSON
//! is an array of flat records, Excel is a single `Sheet1` worksheet with a
//! header row, and Parquet gets one nullable column per table column whose
//! physical type is inferred from the values present.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use arrow::array::ArrayRef;
use arrow::array::BooleanArray;
use arrow::array::Float64Array;
use arrow::array::Int64Array;
use arrow::array::StringArray;
use arrow::datatypes::DataType;
use arrow::datatypes::Field;
use arrow::datatypes::Schema;
use arrow::record_batch::RecordBatch;
use arrow::record_batch::RecordBatchOptions;
use formbuilder_core::FieldValue;
use formbuilder_core::Table;
use parquet::arrow::ArrowWriter;
use rust_xlsxwriter::Workbook;
use rust_xlsxwriter::Worksheet;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Worksheet name used for Excel exports and templates.
pub const EXPORT_SHEET_NAME: &str = "Sheet1";
/// Content type for `.xlsx` downloads.
pub const XLSX_CONTENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Supported download formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Pretty-printed JSON array of records.
    Json,
    /// Excel workbook.
    Excel,
    /// Apache Parquet file.
    Parquet,
}

impl ExportFormat {
    /// Parses a format name as sent by the dashboard.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::UnsupportedFormat`] for unknown names.
    pub fn parse(name: &str) -> Result<Self, ExportError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "excel" => Ok(Self::Excel),
            "parquet" => Ok(Self::Parquet),
            _ => Err(ExportError::UnsupportedFormat(name.to_string())),
        }
    }
}

/// Encoded download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    /// Suggested download name.
    pub filename: &'static str,
    /// Response content type.
    pub content_type: &'static str,
    /// Encoded bytes.
    pub bytes: Vec<u8>,
}

/// Export failures.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The requested format is not supported.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    /// Encoding failed.
    #[error("export encoding failed: {0}")]
    Encode(String),
}

// ============================================================================
// SECTION: Encoding
// ============================================================================

/// Encodes `table` in `format`.
///
/// # Errors
///
/// Returns [`ExportError::Encode`] when the encoder fails.
pub fn export_table(table: &Table, format: ExportFormat) -> Result<ExportFile, ExportError> {
    match format {
        ExportFormat::Json => {
            let bytes = serde_json::to_vec_pretty(&table.to_json_records())
                .map_err(|err| ExportError::Encode(err.to_string()))?;
            Ok(ExportFile {
                filename: "data.json",
                content_type: "application/json",
                bytes,
            })
        }
        ExportFormat::Excel => Ok(ExportFile {
            filename: "data.xlsx",
            content_type: XLSX_CONTENT_TYPE,
            bytes: encode_xlsx(table)?,
        }),
        ExportFormat::Parquet => Ok(ExportFile {
            filename: "data.parquet",
            content_type: "application/octet-stream",
            bytes: encode_parquet(table)?,
        }),
    }
}

/// Writes a header-only workbook for `columns`.
///
/// # Errors
///
/// Returns [`ExportError::Encode`] when the workbook cannot be written.
pub fn encode_xlsx_header(columns: &[String]) -> Result<Vec<u8>, ExportError> {
    encode_xlsx(&Table::new(columns.to_vec()))
}

/// Writes `table` to a single-sheet workbook.
fn encode_xlsx(table: &Table) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(EXPORT_SHEET_NAME).map_err(xlsx_error)?;
    for (col, name) in table.columns().iter().enumerate() {
        sheet.write_string(0, column_index(col)?, name.as_str()).map_err(xlsx_error)?;
    }
    for (row_idx, row) in table.rows().iter().enumerate() {
        let row_number = u32::try_from(row_idx + 1)
            .map_err(|_| ExportError::Encode("too many rows for a worksheet".to_string()))?;
        for (col, value) in row.iter().enumerate() {
            write_cell(sheet, row_number, column_index(col)?, value)?;
        }
    }
    workbook.save_to_buffer().map_err(xlsx_error)
}

/// Writes one typed cell; nulls stay empty.
#[allow(clippy::cast_precision_loss, reason = "Spreadsheet numbers are f64.")]
fn write_cell(
    sheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: &FieldValue,
) -> Result<(), ExportError> {
    let written = match value {
        FieldValue::Null => Ok(()),
        FieldValue::Text(text) => sheet.write_string(row, col, text.as_str()).map(|_| ()),
        FieldValue::Integer(number) => sheet.write_number(row, col, *number as f64).map(|_| ()),
        FieldValue::Float(number) => sheet.write_number(row, col, *number).map(|_| ()),
        FieldValue::Boolean(flag) => sheet.write_boolean(row, col, *flag).map(|_| ()),
        FieldValue::Timestamp(ts) => {
            sheet.write_string(row, col, ts.to_canonical_string()).map(|_| ())
        }
    };
    written.map_err(xlsx_error)
}

/// Converts a column offset to a worksheet column.
fn column_index(col: usize) -> Result<u16, ExportError> {
    u16::try_from(col).map_err(|_| ExportError::Encode("too many columns for a worksheet".to_string()))
}

/// Maps workbook errors.
fn xlsx_error(err: rust_xlsxwriter::XlsxError) -> ExportError {
    ExportError::Encode(err.to_string())
}

/// Writes `table` as a Parquet file in memory.
fn encode_parquet(table: &Table) -> Result<Vec<u8>, ExportError> {
    let mut fields = Vec::with_capacity(table.columns().len());
    let mut arrays = Vec::with_capacity(table.columns().len());
    for (idx, name) in table.columns().iter().enumerate() {
        let values: Vec<&FieldValue> = table.rows().iter().filter_map(|row| row.get(idx)).collect();
        let (data_type, array) = column_array(&values);
        fields.push(Field::new(name.as_str(), data_type, true));
        arrays.push(array);
    }
    let schema = Arc::new(Schema::new(fields));
    let options = RecordBatchOptions::new().with_row_count(Some(table.len()));
    let batch = RecordBatch::try_new_with_options(Arc::clone(&schema), arrays, &options)
        .map_err(|err| ExportError::Encode(err.to_string()))?;
    let mut writer = ArrowWriter::try_new(Vec::new(), schema, None)
        .map_err(|err| ExportError::Encode(err.to_string()))?;
    writer.write(&batch).map_err(|err| ExportError::Encode(err.to_string()))?;
    writer.into_inner().map_err(|err| ExportError::Encode(err.to_string()))
}

/// Physical column kinds inferred from values.
#[derive(Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    /// All non-null values are integers.
    Integer,
    /// All non-null values are numeric with at least one float.
    Float,
    /// All non-null values are booleans.
    Boolean,
    /// Anything else, including all-null columns.
    Text,
}

/// Infers a column kind from its values.
fn infer_kind(values: &[&FieldValue]) -> ColumnKind {
    let mut kind: Option<ColumnKind> = None;
    for value in values {
        let next = match value {
            FieldValue::Null => continue,
            FieldValue::Integer(_) => ColumnKind::Integer,
            FieldValue::Float(_) => ColumnKind::Float,
            FieldValue::Boolean(_) => ColumnKind::Boolean,
            FieldValue::Text(_) | FieldValue::Timestamp(_) => return ColumnKind::Text,
        };
        kind = Some(match (kind, next) {
            (None, next) => next,
            (Some(current), next) if current == next => current,
            (Some(ColumnKind::Integer | ColumnKind::Float), ColumnKind::Integer | ColumnKind::Float) => {
                ColumnKind::Float
            }
            _ => return ColumnKind::Text,
        });
    }
    kind.unwrap_or(ColumnKind::Text)
}

/// Builds an Arrow array for one column.
#[allow(clippy::cast_precision_loss, reason = "Mixed numeric columns widen to f64.")]
fn column_array(values: &[&FieldValue]) -> (DataType, ArrayRef) {
    match infer_kind(values) {
        ColumnKind::Integer => {
            let data: Vec<Option<i64>> = values
                .iter()
                .map(|value| match value {
                    FieldValue::Integer(number) => Some(*number),
                    _ => None,
                })
                .collect();
            (DataType::Int64, Arc::new(Int64Array::from(data)) as ArrayRef)
        }
        ColumnKind::Float => {
            let data: Vec<Option<f64>> = values
                .iter()
                .map(|value| match value {
                    FieldValue::Integer(number) => Some(*number as f64),
                    FieldValue::Float(number) => Some(*number),
                    _ => None,
                })
                .collect();
            (DataType::Float64, Arc::new(Float64Array::from(data)) as ArrayRef)
        }
        ColumnKind::Boolean => {
            let data: Vec<Option<bool>> = values
                .iter()
                .map(|value| match value {
                    FieldValue::Boolean(flag) => Some(*flag),
                    _ => None,
                })
                .collect();
            (DataType::Boolean, Arc::new(BooleanArray::from(data)) as ArrayRef)
        }
        ColumnKind::Text => {
            let data: Vec<Option<String>> = values
                .iter()
                .map(|value| if value.is_null() { None } else { Some(value.to_string()) })
                .collect();
            (DataType::Utf8, Arc::new(StringArray::from(data)) as ArrayRef)
        }
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
    fn format_names_parse_case_insensitively() {
        assert_eq!(ExportFormat::parse("Excel").unwrap(), ExportFormat::Excel);
        assert_eq!(ExportFormat::parse("parquet").unwrap(), ExportFormat::Parquet);
        assert!(matches!(ExportFormat::parse("csv"), Err(ExportError::UnsupportedFormat(_))));
    }

    #[test]
    fn column_kinds_follow_values() {
        let int = FieldValue::Integer(1);
        let float = FieldValue::Float(1.5);
        let flag = FieldValue::Boolean(true);
        let text = FieldValue::from("a");
        let null = FieldValue::Null;
        assert!(infer_kind(&[&int, &null]) == ColumnKind::Integer);
        assert!(infer_kind(&[&int, &float]) == ColumnKind::Float);
        assert!(infer_kind(&[&flag]) == ColumnKind::Boolean);
        assert!(infer_kind(&[&flag, &int]) == ColumnKind::Text);
        assert!(infer_kind(&[&int, &text]) == ColumnKind::Text);
        assert!(infer_kind(&[&null]) == ColumnKind::Text);
    }
}
