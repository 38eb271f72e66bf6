// crates/formbuilder-core/src/interfaces/mod.rs
// ============================================================================
// Module: Form Builder Interfaces
// Description: Backend-agnostic interfaces for storage, geolocation, and mail.
// Purpose: Define the contract surfaces used by the Form Builder runtime.
// Dependencies: crate::core, serde, thiserror
// ============================================================================

//! ## Overview
//! Interfaces define how Form Builder reaches external systems without
//! embedding backend details. The [`Datastore`] owns the live table and keeps
//! it in step with the derived [`TableSchema`]; [`GeoLookup`] and [`Mailer`]
//! are best-effort collaborators whose failures never block a submission.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::schema::TableSchema;
use crate::core::value::SubmissionRecord;
use crate::core::value::Table;

// ============================================================================
// SECTION: Aggregation
// ============================================================================

/// Column label for aggregation groups.
pub const GROUP_COLUMN: &str = "group";
/// Column label for aggregated values.
pub const AGGREGATION_COLUMN: &str = "aggregation";

/// Supported aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateFunction {
    /// Number of non-null values.
    Count,
    /// Sum of values.
    Sum,
    /// Minimum value.
    Min,
    /// Maximum value.
    Max,
}

impl AggregateFunction {
    /// Parses a function name, case-insensitively.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "count" => Some(Self::Count),
            "sum" => Some(Self::Sum),
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            _ => None,
        }
    }

    /// Returns the SQL function name.
    #[must_use]
    pub const fn sql_name(self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::Sum => "SUM",
            Self::Min => "MIN",
            Self::Max => "MAX",
        }
    }
}

/// Cast applied to a column before grouping or aggregating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CastTarget {
    /// Truncate to the calendar date.
    Date,
    /// Convert to an integer.
    #[serde(alias = "int")]
    Integer,
}

impl CastTarget {
    /// Parses a cast name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "date" => Some(Self::Date),
            "int" | "integer" => Some(Self::Integer),
            _ => None,
        }
    }
}

/// Cast options for an aggregation query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastOptions {
    /// Column the cast applies to; must be the group or aggregate column.
    pub target_field: String,
    /// Cast to apply.
    pub target_type: CastTarget,
}

/// Grouped aggregation request.
///
/// Parameters are carried as given so the datastore can fail soft on
/// unknown names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateQuery {
    /// Column to group by.
    pub group_by: String,
    /// Aggregate function name.
    pub function: String,
    /// Column to aggregate.
    pub field: String,
    /// Optional cast.
    #[serde(default)]
    pub cast: Option<CastOptions>,
}

impl AggregateQuery {
    /// Builds a query without a cast.
    #[must_use]
    pub fn new(
        group_by: impl Into<String>,
        function: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        Self {
            group_by: group_by.into(),
            function: function.into(),
            field: field.into(),
            cast: None,
        }
    }

    /// Returns the query with a cast applied to `target_field`.
    #[must_use]
    pub fn with_cast(mut self, target_field: impl Into<String>, target_type: CastTarget) -> Self {
        self.cast = Some(CastOptions {
            target_field: target_field.into(),
            target_type,
        });
        self
    }
}

// ============================================================================
// SECTION: Datastore
// ============================================================================

/// Outcome of a schema synchronization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchemaSyncReport {
    /// Whether the table was created.
    pub created: bool,
    /// Columns added to an existing table.
    pub added_columns: Vec<String>,
    /// Required columns added as nullable because rows already existed.
    pub relaxed_columns: Vec<String>,
    /// Live columns absent from the declared schema.
    pub untracked_columns: Vec<String>,
}

/// Outcome of a bulk upsert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkUpsertReport {
    /// Rows written.
    pub rows: usize,
    /// Rows that received a generated identifier.
    pub generated_ids: usize,
    /// Whether the batch timestamp was generated.
    pub generated_timestamp: bool,
    /// Batch columns that matched no table column.
    pub ignored_columns: Vec<String>,
}

/// Datastore errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("datastore io error: {0}")]
    Io(String),
    /// Live table conflicts with the declared schema.
    #[error("schema sync error: {0}")]
    SchemaSync(String),
    /// Operation attempted before schema sync.
    #[error("datastore used before schema sync")]
    NotSynced,
    /// Record lacks an identifier.
    #[error("record is missing an id")]
    MissingId,
    /// Record names a column the table does not have.
    #[error("unknown column: {0}")]
    UnknownColumn(String),
    /// Input data is invalid.
    #[error("datastore invalid data: {0}")]
    Invalid(String),
    /// Store reported an error.
    #[error("datastore error: {0}")]
    Store(String),
}

/// Schema-driven submission store.
pub trait Datastore: Send + Sync {
    /// Returns the declared table definition.
    fn table_schema(&self) -> &TableSchema;

    /// Creates the table or adds missing columns; never drops or retypes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::SchemaSync`] when the live table conflicts.
    fn sync_schema(&self) -> Result<SchemaSyncReport, StoreError>;

    /// Inserts or updates a row keyed on `id`; absent columns are untouched.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the record is invalid or the write fails.
    fn upsert(&self, record: &SubmissionRecord) -> Result<(), StoreError>;

    /// Upserts a batch in one transaction, generating missing ids and timestamps.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails; no rows are written then.
    fn upsert_bulk(&self, batch: &Table) -> Result<BulkUpsertReport, StoreError>;

    /// Returns all rows, or the row matching `id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn query(&self, id: Option<&str>) -> Result<Table, StoreError>;

    /// Runs a grouped aggregation; invalid parameters yield an empty table.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the read fails.
    fn query_aggregated(&self, query: &AggregateQuery) -> Result<Table, StoreError>;
}

// ============================================================================
// SECTION: External Collaborators
// ============================================================================

/// External collaborator failures.
#[derive(Debug, Error)]
pub enum LookupError {
    /// Collaborator is not configured.
    #[error("not configured: {0}")]
    NotConfigured(String),
    /// Transport failed.
    #[error("transport error: {0}")]
    Transport(String),
    /// Remote answered with a failure status.
    #[error("remote status {0}")]
    Status(u16),
    /// Remote answered with an unusable payload.
    #[error("invalid response: {0}")]
    Invalid(String),
}

/// Geolocation details for a client address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoDetails {
    /// City name.
    #[serde(default)]
    pub city: Option<String>,
    /// Region name.
    #[serde(default)]
    pub region: Option<String>,
    /// Country code.
    #[serde(default)]
    pub country: Option<String>,
    /// Latitude and longitude.
    #[serde(default)]
    pub loc: Option<String>,
    /// Network owner.
    #[serde(default)]
    pub org: Option<String>,
    /// Postal code.
    #[serde(default)]
    pub postal: Option<String>,
    /// Time zone name.
    #[serde(default)]
    pub timezone: Option<String>,
}

impl GeoDetails {
    /// Returns `(column, value)` pairs for the geo enrichment columns.
    #[must_use]
    pub fn columns(&self) -> [(&'static str, Option<&str>); 7] {
        [
            ("geo_city", self.city.as_deref()),
            ("geo_region", self.region.as_deref()),
            ("geo_country", self.country.as_deref()),
            ("geo_loc", self.loc.as_deref()),
            ("geo_org", self.org.as_deref()),
            ("geo_postal", self.postal.as_deref()),
            ("geo_timezone", self.timezone.as_deref()),
        ]
    }
}

/// Client IP geolocation lookup.
pub trait GeoLookup: Send + Sync {
    /// Looks up `ip_address`.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] when the lookup fails.
    fn lookup(&self, ip_address: &str) -> Result<GeoDetails, LookupError>;
}

/// Reminder email payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReminderEmail {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Plain text body.
    pub body: String,
}

impl ReminderEmail {
    /// Builds the reminder sent after a submission.
    #[must_use]
    pub fn submission_reminder(to: impl Into<String>, session_id: &str) -> Self {
        Self {
            to: to.into(),
            subject: "Submission Reminder".to_string(),
            body: format!(
                "Thank you for your submission. Your session code is {session_id}. Keep it to \
                 reload or amend your answers later."
            ),
        }
    }
}

/// Outbound email delivery.
pub trait Mailer: Send + Sync {
    /// Sends `email`.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] when delivery fails.
    fn send(&self, email: &ReminderEmail) -> Result<(), LookupError>;
}
