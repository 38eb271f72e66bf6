// crates/formbuilder-core/src/core/schema.rs
// ============================================================================
// Module: Form Schema Model
// Description: Page and field definitions plus the derived table definition.
// Purpose: Hold the single declarative source that renderer, extractor, and datastore consume.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! A [`FormSchema`] is the in-memory result of reading the form configuration.
//! It is immutable after load. [`TableSchema`] is derived from it together with
//! the [`AnalyticsOptions`] and describes every column the datastore must
//! maintain: `id`, `timestamp`, one column per field, then the optional
//! enrichment columns.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Primary key column.
pub const ID_COLUMN: &str = "id";
/// Creation time column.
pub const TIMESTAMP_COLUMN: &str = "timestamp";
/// Form field carrying the session identifier.
pub const SESSION_ID_FORM_FIELD: &str = "session_id_form_field";
/// Hidden form field carrying the page load time.
pub const FORM_LOAD_TIME_FIELD: &str = "form_load_time";
/// Hidden honeypot form field.
pub const HONEYPOT_FIELD: &str = "_name";
/// Value the honeypot field is rendered with.
pub const HONEYPOT_INITIAL_VALUE: &str = "n";

/// Columns appended when session metadata capture is enabled.
pub const SESSION_DATA_COLUMNS: &[(&str, ColumnType)] = &[
    ("user_agent", ColumnType::Text),
    ("operating_system", ColumnType::Text),
    ("ip_address", ColumnType::Text),
    ("hpfm", ColumnType::Text),
    ("elapsed_time", ColumnType::Float),
    ("geo_city", ColumnType::Text),
    ("geo_region", ColumnType::Text),
    ("geo_country", ColumnType::Text),
    ("geo_loc", ColumnType::Text),
    ("geo_org", ColumnType::Text),
    ("geo_postal", ColumnType::Text),
    ("geo_timezone", ColumnType::Text),
];
/// Column appended when the honeypot check is enabled.
pub const HONEYPOT_PASS_COLUMN: &str = "honeypot_validation_pass";
/// Column appended when the elapsed-time check is enabled.
pub const ELAPSED_PASS_COLUMN: &str = "elapsed_time_validation_pass";

// ============================================================================
// SECTION: Field Types
// ============================================================================

/// Widget used to render a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    /// Single-line text input.
    TextInput,
    /// Drop-down with fixed options.
    Select,
    /// Multi-line text area.
    Paragraph,
    /// Unrecognized widget label, skipped by the renderer.
    Other(String),
}

impl InputKind {
    /// Parses a configured widget label, keeping unknown labels verbatim.
    #[must_use]
    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "input" | "text-input" | "text_input" => Self::TextInput,
            "select" => Self::Select,
            "text" | "paragraph" | "textarea" => Self::Paragraph,
            _ => Self::Other(label.trim().to_string()),
        }
    }
}

/// Declared storage type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    /// Whole numbers.
    Integer,
    /// Free text.
    #[default]
    String,
    /// Floating point numbers.
    Float,
    /// True or false.
    Boolean,
}

impl DataType {
    /// Parses a configured data type label. Unknown labels fall back to string.
    #[must_use]
    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_uppercase().as_str() {
            "INTEGER" | "INT" => Self::Integer,
            "FLOAT" | "REAL" | "DOUBLE" => Self::Float,
            "BOOLEAN" | "BOOL" => Self::Boolean,
            _ => Self::String,
        }
    }

    /// Returns the column type used to store values of this data type.
    #[must_use]
    pub const fn column_type(self) -> ColumnType {
        match self {
            Self::Integer => ColumnType::Integer,
            Self::String => ColumnType::Text,
            Self::Float => ColumnType::Float,
            Self::Boolean => ColumnType::Boolean,
        }
    }
}

/// Column type in the derived table definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// Text column.
    Text,
    /// 64-bit integer column.
    Integer,
    /// Double precision column.
    Float,
    /// Boolean column.
    Boolean,
    /// Second-precision timestamp column.
    Timestamp,
}

impl ColumnType {
    /// Returns a stable label for diagnostics.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Timestamp => "timestamp",
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// SECTION: Definitions
// ============================================================================

/// A page of the multi-page form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageDefinition {
    /// Ordering key, unique per form.
    pub page_number: u32,
    /// Page heading.
    pub title: String,
    /// Text shown under the heading.
    pub description: String,
}

/// A single input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Column and form key; unique and whitespace free.
    pub backend_name: String,
    /// Human readable label.
    pub label: String,
    /// Page the field is rendered on.
    pub page_number: u32,
    /// Consecutive fields sharing a group render in one row.
    pub group_id: Option<String>,
    /// Widget kind.
    pub input_kind: InputKind,
    /// Storage type.
    pub data_type: DataType,
    /// Whether the field must be filled in.
    pub required: bool,
    /// Literal option texts for select fields.
    pub select_options: Vec<String>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Schema consistency errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    /// Two pages share a number.
    #[error("duplicate page number: {0}")]
    DuplicatePage(u32),
    /// Two fields share a backend name.
    #[error("duplicate field name: {0}")]
    DuplicateField(String),
    /// A field name is not usable as a column.
    #[error("invalid field name {name:?}: {reason}")]
    InvalidFieldName {
        /// Offending name.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },
    /// A field references a page that does not exist.
    #[error("field {field} references unknown page {page}")]
    UnknownPage {
        /// Field backend name.
        field: String,
        /// Missing page number.
        page: u32,
    },
    /// A select field has no options.
    #[error("select field {0} has no options")]
    MissingOptions(String),
}

// ============================================================================
// SECTION: Form Schema
// ============================================================================

/// Validated form definition.
///
/// # Invariants
/// - Pages are sorted by `page_number` and unique.
/// - Field backend names are unique, non-empty, whitespace free, and not reserved.
/// - Every field references an existing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormSchema {
    /// Pages in display order.
    pages: Vec<PageDefinition>,
    /// Fields in configuration order.
    fields: Vec<FieldDefinition>,
}

impl FormSchema {
    /// Builds a schema, enforcing the structural invariants.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError`] when pages or fields are inconsistent.
    pub fn new(
        mut pages: Vec<PageDefinition>,
        fields: Vec<FieldDefinition>,
    ) -> Result<Self, SchemaError> {
        pages.sort_by_key(|page| page.page_number);
        let mut page_numbers = BTreeSet::new();
        for page in &pages {
            if !page_numbers.insert(page.page_number) {
                return Err(SchemaError::DuplicatePage(page.page_number));
            }
        }
        let mut names = BTreeSet::new();
        for field in &fields {
            validate_field_name(&field.backend_name)?;
            if !names.insert(field.backend_name.to_ascii_lowercase()) {
                return Err(SchemaError::DuplicateField(field.backend_name.clone()));
            }
            if !page_numbers.contains(&field.page_number) {
                return Err(SchemaError::UnknownPage {
                    field: field.backend_name.clone(),
                    page: field.page_number,
                });
            }
            if field.input_kind == InputKind::Select && field.select_options.is_empty() {
                return Err(SchemaError::MissingOptions(field.backend_name.clone()));
            }
        }
        Ok(Self {
            pages,
            fields,
        })
    }

    /// Returns pages in display order.
    #[must_use]
    pub fn pages(&self) -> &[PageDefinition] {
        &self.pages
    }

    /// Returns fields in configuration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    /// Returns the fields placed on `page_number`, in configuration order.
    pub fn fields_on_page(&self, page_number: u32) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter().filter(move |field| field.page_number == page_number)
    }

    /// Looks up a field by backend name.
    #[must_use]
    pub fn field(&self, backend_name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|field| field.backend_name == backend_name)
    }

    /// Returns the response template: every backend name, in configuration order.
    #[must_use]
    pub fn response_template(&self) -> Vec<String> {
        self.fields.iter().map(|field| field.backend_name.clone()).collect()
    }

    /// Derives the table definition for this form.
    #[must_use]
    pub fn table_schema(&self, table_name: &str, analytics: AnalyticsOptions) -> TableSchema {
        TableSchema::derive(table_name, self, analytics)
    }
}

/// Rejects names that cannot serve as a column name.
fn validate_field_name(name: &str) -> Result<(), SchemaError> {
    let reason = if name.is_empty() {
        Some("must not be empty")
    } else if name.chars().any(char::is_whitespace) {
        Some("must not contain whitespace")
    } else if name.chars().any(char::is_control) || name.contains('"') {
        Some("must not contain quotes or control characters")
    } else if is_reserved_column(name) {
        Some("collides with a reserved column")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(SchemaError::InvalidFieldName {
            name: name.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

/// Returns true when `name` is owned by the system rather than a field.
#[must_use]
pub fn is_reserved_column(name: &str) -> bool {
    let lowered = name.to_ascii_lowercase();
    lowered == ID_COLUMN
        || lowered == TIMESTAMP_COLUMN
        || lowered == SESSION_ID_FORM_FIELD
        || lowered == FORM_LOAD_TIME_FIELD
        || lowered == HONEYPOT_FIELD
        || lowered == HONEYPOT_PASS_COLUMN
        || lowered == ELAPSED_PASS_COLUMN
        || SESSION_DATA_COLUMNS.iter().any(|(column, _)| *column == lowered)
}

// ============================================================================
// SECTION: Table Schema
// ============================================================================

/// Optional enrichment toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AnalyticsOptions {
    /// Capture client fingerprint and elapsed fill time.
    pub session_data: bool,
    /// Record the honeypot check outcome.
    pub honeypot_check: bool,
    /// Record the elapsed-time check outcome.
    pub elapsed_time_check: bool,
}

/// A column in the derived table definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnSpec {
    /// Column name.
    pub name: String,
    /// Storage type.
    pub column_type: ColumnType,
    /// Whether NULL is allowed.
    pub nullable: bool,
    /// Whether the column is the primary key.
    pub primary_key: bool,
}

impl ColumnSpec {
    /// Builds a nullable, non-key column.
    #[must_use]
    pub fn optional(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            primary_key: false,
        }
    }
}

/// Table definition derived from a form and analytics options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSchema {
    /// Table name.
    name: String,
    /// Columns in declaration order; `id` and `timestamp` first.
    columns: Vec<ColumnSpec>,
}

impl TableSchema {
    /// Derives the table definition.
    #[must_use]
    pub fn derive(name: &str, form: &FormSchema, analytics: AnalyticsOptions) -> Self {
        let mut columns = vec![
            ColumnSpec {
                name: ID_COLUMN.to_string(),
                column_type: ColumnType::Text,
                nullable: false,
                primary_key: true,
            },
            ColumnSpec {
                name: TIMESTAMP_COLUMN.to_string(),
                column_type: ColumnType::Timestamp,
                nullable: false,
                primary_key: false,
            },
        ];
        columns.extend(form.fields().iter().map(|field| ColumnSpec {
            name: field.backend_name.clone(),
            column_type: field.data_type.column_type(),
            nullable: !field.required,
            primary_key: false,
        }));
        if analytics.session_data {
            columns.extend(
                SESSION_DATA_COLUMNS
                    .iter()
                    .map(|(name, column_type)| ColumnSpec::optional(*name, *column_type)),
            );
        }
        if analytics.honeypot_check {
            columns.push(ColumnSpec::optional(HONEYPOT_PASS_COLUMN, ColumnType::Boolean));
        }
        if analytics.elapsed_time_check {
            columns.push(ColumnSpec::optional(ELAPSED_PASS_COLUMN, ColumnType::Boolean));
        }
        Self {
            name: name.to_string(),
            columns,
        }
    }

    /// Returns the table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns all columns in declaration order.
    #[must_use]
    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// Looks up a column by exact name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// Returns the column names in declaration order.
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|column| column.name.clone()).collect()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
