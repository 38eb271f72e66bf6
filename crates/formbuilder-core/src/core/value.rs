// crates/formbuilder-core/src/core/value.rs
// ============================================================================
// Module: Dynamic Values
// Description: Dynamically typed cell values, submission records, and tables.
// Purpose: Carry column data whose shape is only known from configuration.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Column sets are decided by the form configuration at startup, so records
//! and query results are held as name-to-[`FieldValue`] maps and ordered
//! [`Table`]s. Coercion toward a [`ColumnType`] is lenient: empty input becomes
//! NULL for non-text columns and input that does not parse is kept as text,
//! matching the storage engine's type affinity.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fmt;

use serde::Serialize;
use serde::Serializer;
use serde_json::Map;
use serde_json::Number;
use serde_json::Value;
use thiserror::Error;

use crate::core::schema::ColumnType;
use crate::core::schema::ID_COLUMN;
use crate::core::timestamp::Timestamp;

// ============================================================================
// SECTION: Field Value
// ============================================================================

/// A single dynamically typed cell.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldValue {
    /// Missing value.
    #[default]
    Null,
    /// Text value.
    Text(String),
    /// Integer value.
    Integer(i64),
    /// Floating point value.
    Float(f64),
    /// Boolean value.
    Boolean(bool),
    /// Timestamp value.
    Timestamp(Timestamp),
}

impl FieldValue {
    /// Returns true for [`FieldValue::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the text payload when this is a text value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value),
            _ => None,
        }
    }

    /// Returns true for NULL or text that is blank after trimming.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Text(value) => value.trim().is_empty(),
            Self::Float(value) => value.is_nan(),
            _ => false,
        }
    }

    /// Converts raw text toward `column_type`.
    #[must_use]
    pub fn from_text(raw: &str, column_type: ColumnType) -> Self {
        if column_type == ColumnType::Text {
            return Self::Text(raw.to_string());
        }
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::Null;
        }
        let parsed = match column_type {
            ColumnType::Text => None,
            ColumnType::Integer => trimmed
                .parse::<i64>()
                .map(Self::Integer)
                .ok()
                .or_else(|| parse_float(trimmed)),
            ColumnType::Float => parse_float(trimmed),
            ColumnType::Boolean => parse_bool(trimmed).map(Self::Boolean),
            ColumnType::Timestamp => Timestamp::parse(trimmed).map(Self::Timestamp),
        };
        parsed.unwrap_or_else(|| Self::Text(raw.to_string()))
    }

    /// Coerces this value toward `column_type`, keeping it when no conversion applies.
    #[must_use]
    #[allow(clippy::cast_precision_loss, reason = "Integer cells widen to float columns.")]
    pub fn coerce(self, column_type: ColumnType) -> Self {
        match (self, column_type) {
            (Self::Null, _) => Self::Null,
            (Self::Text(raw), column_type) => Self::from_text(&raw, column_type),
            (Self::Float(value), _) if value.is_nan() => Self::Null,
            (value, ColumnType::Text) => Self::Text(value.to_string()),
            (Self::Integer(value), ColumnType::Float) => Self::Float(value as f64),
            (Self::Integer(value), ColumnType::Boolean) => Self::Boolean(value != 0),
            (Self::Integer(value), ColumnType::Timestamp) => {
                Timestamp::from_unix_seconds(value).map_or(Self::Integer(value), Self::Timestamp)
            }
            (Self::Boolean(value), ColumnType::Integer) => Self::Integer(i64::from(value)),
            (Self::Boolean(value), ColumnType::Float) => Self::Float(f64::from(u8::from(value))),
            (value, _) => value,
        }
    }

    /// Returns a JSON representation of the value.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Text(value) => Value::String(value.clone()),
            Self::Integer(value) => Value::Number(Number::from(*value)),
            Self::Float(value) => Number::from_f64(*value).map_or(Value::Null, Value::Number),
            Self::Boolean(value) => Value::Bool(*value),
            Self::Timestamp(value) => Value::String(value.to_canonical_string()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Text(value) => f.write_str(value),
            Self::Integer(value) => value.fmt(f),
            Self::Float(value) => value.fmt(f),
            Self::Boolean(value) => value.fmt(f),
            Self::Timestamp(value) => value.fmt(f),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Text(value) => serializer.serialize_str(value),
            Self::Integer(value) => serializer.serialize_i64(*value),
            Self::Float(value) if value.is_nan() => serializer.serialize_none(),
            Self::Float(value) => serializer.serialize_f64(*value),
            Self::Boolean(value) => serializer.serialize_bool(*value),
            Self::Timestamp(value) => value.serialize(serializer),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<Timestamp> for FieldValue {
    fn from(value: Timestamp) -> Self {
        Self::Timestamp(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Parses a float, mapping NaN to NULL.
fn parse_float(input: &str) -> Option<FieldValue> {
    let value = input.parse::<f64>().ok()?;
    if value.is_nan() { Some(FieldValue::Null) } else { Some(FieldValue::Float(value)) }
}

/// Parses a boolean flag in the spellings spreadsheets and forms produce.
#[must_use]
pub fn parse_bool(input: &str) -> Option<bool> {
    match input.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" | "on" => Some(true),
        "false" | "no" | "n" | "0" | "off" => Some(false),
        _ => None,
    }
}

// ============================================================================
// SECTION: Submission Record
// ============================================================================

/// Column-name to value map for one row.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct SubmissionRecord(BTreeMap<String, FieldValue>);

impl SubmissionRecord {
    /// Creates an empty record.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Sets a column value, returning the previous one.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<FieldValue>) -> Option<FieldValue> {
        self.0.insert(column.into(), value.into())
    }

    /// Returns the value for `column`.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.0.get(column)
    }

    /// Returns the session identifier when present as non-empty text.
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.get(ID_COLUMN).and_then(FieldValue::as_text).filter(|id| !id.is_empty())
    }

    /// Returns true when `column` is present.
    #[must_use]
    pub fn contains(&self, column: &str) -> bool {
        self.0.contains_key(column)
    }

    /// Returns the number of columns present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when no columns are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the column names in sorted order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Iterates over column/value pairs.
    pub fn iter(&self) -> btree_map::Iter<'_, String, FieldValue> {
        self.0.iter()
    }

    /// Returns a flat JSON object.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> =
            self.0.iter().map(|(column, value)| (column.clone(), value.to_json())).collect();
        Value::Object(map)
    }
}

impl FromIterator<(String, FieldValue)> for SubmissionRecord {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for SubmissionRecord {
    type Item = (String, FieldValue);
    type IntoIter = btree_map::IntoIter<String, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

// ============================================================================
// SECTION: Table
// ============================================================================

/// Table shape errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableError {
    /// A row does not match the column count.
    #[error("row has {actual} values but table has {expected} columns")]
    RowWidth {
        /// Column count.
        expected: usize,
        /// Row length.
        actual: usize,
    },
}

/// Ordered columns and rows of values.
///
/// # Invariants
/// - Every row has exactly `columns.len()` values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    /// Column names in order.
    columns: Vec<String>,
    /// Row values aligned with `columns`.
    rows: Vec<Vec<FieldValue>>,
}

impl Table {
    /// Creates an empty table with the given columns.
    #[must_use]
    pub const fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Builds a table from rows, checking widths.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::RowWidth`] when a row does not match the columns.
    pub fn with_rows(
        columns: Vec<String>,
        rows: Vec<Vec<FieldValue>>,
    ) -> Result<Self, TableError> {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    /// Appends a row.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::RowWidth`] when the row does not match the columns.
    pub fn push_row(&mut self, row: Vec<FieldValue>) -> Result<(), TableError> {
        if row.len() != self.columns.len() {
            return Err(TableError::RowWidth {
                expected: self.columns.len(),
                actual: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// Returns column names.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Returns rows.
    #[must_use]
    pub fn rows(&self) -> &[Vec<FieldValue>] {
        &self.rows
    }

    /// Returns the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true when there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the index of `column`.
    #[must_use]
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|name| name == column)
    }

    /// Returns the value at `row` for `column`.
    #[must_use]
    pub fn value(&self, row: usize, column: &str) -> Option<&FieldValue> {
        let index = self.column_index(column)?;
        self.rows.get(row).and_then(|values| values.get(index))
    }

    /// Returns row `index` as a record.
    #[must_use]
    pub fn record(&self, index: usize) -> Option<SubmissionRecord> {
        let row = self.rows.get(index)?;
        Some(self.columns.iter().cloned().zip(row.iter().cloned()).collect())
    }

    /// Iterates rows as records.
    pub fn records(&self) -> impl Iterator<Item = SubmissionRecord> + '_ {
        self.rows.iter().map(|row| self.columns.iter().cloned().zip(row.iter().cloned()).collect())
    }

    /// Returns rows as an array of flat JSON objects.
    #[must_use]
    pub fn to_json_records(&self) -> Value {
        Value::Array(self.records().map(|record| record.to_json()).collect())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
