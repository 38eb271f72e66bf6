// crates/formbuilder-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Submission Store
// Description: Datastore backed by a single SQLite table derived from the form.
// Purpose: Reconcile, upsert, query, and aggregate submission rows.
// Dependencies: formbuilder-core, rusqlite, serde, thiserror
// ============================================================================

//! ## Overview
//! [`SqliteDatastore`] keeps one table in step with a declared
//! [`TableSchema`]. Schema sync is additive: missing columns are added,
//! nothing is dropped or retyped, and declared/live type conflicts fail
//! closed. Every call opens its own connection and releases it on return, so
//! the store can be shared freely across worker threads. Reads and writes are
//! refused until the first successful sync.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use formbuilder_core::AGGREGATION_COLUMN;
use formbuilder_core::AggregateFunction;
use formbuilder_core::AggregateQuery;
use formbuilder_core::AuditEvent;
use formbuilder_core::AuditSink;
use formbuilder_core::BulkUpsertReport;
use formbuilder_core::CastTarget;
use formbuilder_core::ColumnSpec;
use formbuilder_core::ColumnType;
use formbuilder_core::Datastore;
use formbuilder_core::FieldValue;
use formbuilder_core::GROUP_COLUMN;
use formbuilder_core::ID_COLUMN;
use formbuilder_core::MIN_SESSION_ID_BYTES;
use formbuilder_core::SchemaSyncReport;
use formbuilder_core::SessionId;
use formbuilder_core::StoreError;
use formbuilder_core::SubmissionRecord;
use formbuilder_core::TIMESTAMP_COLUMN;
use formbuilder_core::Table;
use formbuilder_core::TableSchema;
use formbuilder_core::Timestamp;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::params;
use rusqlite::params_from_iter;
use rusqlite::types::Value;
use rusqlite::types::ValueRef;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum table name length.
const MAX_TABLE_NAME_LENGTH: usize = 128;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` submission store.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Builds a config for `path` with default tuning.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Invalid store input.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Live table conflicts with the declared schema.
    #[error("sqlite store schema conflict: {0}")]
    SchemaConflict(String),
    /// Store used before schema sync.
    #[error("sqlite store used before schema sync")]
    NotSynced,
    /// Record lacks an identifier.
    #[error("sqlite store record is missing an id")]
    MissingId,
    /// Record names an unknown column.
    #[error("sqlite store unknown column: {0}")]
    UnknownColumn(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            SqliteStoreError::SchemaConflict(message) => Self::SchemaSync(message),
            SqliteStoreError::NotSynced => Self::NotSynced,
            SqliteStoreError::MissingId => Self::MissingId,
            SqliteStoreError::UnknownColumn(column) => Self::UnknownColumn(column),
        }
    }
}

impl From<rusqlite::Error> for SqliteStoreError {
    fn from(error: rusqlite::Error) -> Self {
        Self::Db(error.to_string())
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed submission store.
#[derive(Clone)]
pub struct SqliteDatastore {
    /// Store configuration.
    config: SqliteStoreConfig,
    /// Declared table definition.
    schema: TableSchema,
    /// Set once the first sync succeeds.
    synced: Arc<AtomicBool>,
    /// Random bytes per generated identifier.
    id_bytes: usize,
    /// Diagnostics sink.
    audit: Arc<dyn AuditSink>,
}

impl SqliteDatastore {
    /// Prepares a store for `schema`; the database file is created on first use.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the path or table name is unusable.
    pub fn new(
        config: SqliteStoreConfig,
        schema: TableSchema,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        validate_table_name(schema.name())?;
        ensure_parent_dir(&config.path)?;
        Ok(Self {
            config,
            schema,
            synced: Arc::new(AtomicBool::new(false)),
            id_bytes: MIN_SESSION_ID_BYTES,
            audit,
        })
    }

    /// Returns the store with a different generated-identifier size.
    #[must_use]
    pub const fn with_id_bytes(mut self, id_bytes: usize) -> Self {
        self.id_bytes = id_bytes;
        self
    }

    /// Returns the database path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Fails unless a sync has completed.
    fn ensure_synced(&self) -> Result<(), SqliteStoreError> {
        if self.synced.load(Ordering::Acquire) { Ok(()) } else { Err(SqliteStoreError::NotSynced) }
    }

    /// Returns the declared type of `column`, matched case-insensitively.
    fn declared_type(&self, column: &str) -> Option<ColumnType> {
        self.schema
            .columns()
            .iter()
            .find(|spec| spec.name.eq_ignore_ascii_case(column))
            .map(|spec| spec.column_type)
    }

    /// Reconciles the live table with the declared schema.
    fn sync(&self) -> Result<SchemaSyncReport, SqliteStoreError> {
        let table = self.schema.name();
        let mut connection = open_connection(&self.config)?;
        let tx = connection.transaction()?;
        let live = live_columns(&tx, table)?;
        let mut report = SchemaSyncReport::default();
        if live.is_empty() {
            tx.execute_batch(&create_table_sql(&self.schema))?;
            report.created = true;
        } else {
            check_primary_key(&live)?;
            for column in self.schema.columns() {
                match live.iter().find(|existing| existing.name.eq_ignore_ascii_case(&column.name)) {
                    Some(existing) => check_compatible(column, existing)?,
                    None => {
                        tx.execute_batch(&format!(
                            "ALTER TABLE {} ADD COLUMN {} {}",
                            quote_identifier(table),
                            quote_identifier(&column.name),
                            sql_type(column.column_type)
                        ))?;
                        report.added_columns.push(column.name.clone());
                        if !column.nullable {
                            report.relaxed_columns.push(column.name.clone());
                        }
                    }
                }
            }
            report.untracked_columns = live
                .iter()
                .filter(|existing| self.declared_type(&existing.name).is_none())
                .map(|existing| existing.name.clone())
                .collect();
        }
        tx.commit()?;
        self.synced.store(true, Ordering::Release);
        self.record_sync(&report);
        Ok(report)
    }

    /// Emits audit events for a completed sync.
    fn record_sync(&self, report: &SchemaSyncReport) {
        let table = self.schema.name();
        if report.created {
            self.audit.record(
                &AuditEvent::info("schema_table_created", "table created")
                    .with_field("table", table)
                    .with_field("columns", self.schema.columns().len()),
            );
        }
        for column in &report.added_columns {
            self.audit.record(
                &AuditEvent::info("schema_column_added", "column added")
                    .with_field("table", table)
                    .with_field("column", column),
            );
        }
        for column in &report.relaxed_columns {
            self.audit.record(
                &AuditEvent::warn(
                    "schema_column_relaxed",
                    "required column added as nullable to an existing table",
                )
                .with_field("table", table)
                .with_field("column", column),
            );
        }
        for column in &report.untracked_columns {
            self.audit.record(
                &AuditEvent::warn("schema_column_untracked", "live column not in configuration")
                    .with_field("table", table)
                    .with_field("column", column),
            );
        }
    }

    /// Writes one record: updates the present columns of an existing row, or
    /// inserts a new one.
    fn upsert_record(&self, record: &SubmissionRecord) -> Result<(), SqliteStoreError> {
        self.ensure_synced()?;
        let id = record.id().ok_or(SqliteStoreError::MissingId)?;
        let mut columns = Vec::with_capacity(record.len());
        let mut values = vec![Value::Text(id.to_string())];
        for (name, value) in record.iter() {
            if name == ID_COLUMN {
                continue;
            }
            let spec = self
                .schema
                .column(name)
                .ok_or_else(|| SqliteStoreError::UnknownColumn(name.clone()))?;
            columns.push(spec.name.as_str());
            values.push(to_sql_value(value.clone().coerce(spec.column_type)));
        }
        let table = self.schema.name();
        let mut connection = open_connection(&self.config)?;
        let tx = connection.transaction()?;
        let updated = if columns.is_empty() {
            0
        } else {
            tx.execute(&update_sql(table, &columns), params_from_iter(values.iter()))?
        };
        if updated == 0 {
            let mut insert_columns = vec![ID_COLUMN];
            insert_columns.extend(columns);
            tx.execute(&upsert_sql(table, &insert_columns), params_from_iter(values.iter()))?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Writes a batch in one transaction.
    fn upsert_batch(&self, batch: &Table) -> Result<BulkUpsertReport, SqliteStoreError> {
        self.ensure_synced()?;
        let mut report = BulkUpsertReport::default();
        let mut seen = BTreeSet::new();
        let mut id_index = None;
        let mut timestamp_index = None;
        let mut targets: Vec<(usize, &ColumnSpec)> = Vec::new();
        for (index, name) in batch.columns().iter().enumerate() {
            let Some(spec) = self.resolve_batch_column(name) else {
                report.ignored_columns.push(name.clone());
                continue;
            };
            if !seen.insert(spec.name.as_str()) {
                report.ignored_columns.push(name.clone());
                continue;
            }
            match spec.name.as_str() {
                ID_COLUMN => id_index = Some(index),
                TIMESTAMP_COLUMN => timestamp_index = Some(index),
                _ => targets.push((index, spec)),
            }
        }
        report.generated_timestamp = timestamp_index.is_none();
        let batch_time = FieldValue::Timestamp(Timestamp::now_utc());

        let mut columns = vec![ID_COLUMN, TIMESTAMP_COLUMN];
        columns.extend(targets.iter().map(|(_, spec)| spec.name.as_str()));
        let sql = upsert_sql(self.schema.name(), &columns);

        let mut connection = open_connection(&self.config)?;
        let tx = connection.transaction()?;
        {
            let mut statement = tx.prepare(&sql)?;
            for row in batch.rows() {
                let cell = |index: Option<usize>| {
                    index.and_then(|index| row.get(index)).filter(|value| !value.is_blank())
                };
                let id = match cell(id_index) {
                    Some(value) => value.to_string().trim().to_string(),
                    None => {
                        report.generated_ids += 1;
                        SessionId::generate(self.id_bytes).into_string()
                    }
                };
                let timestamp = cell(timestamp_index)
                    .map_or_else(|| batch_time.clone(), |value| value.clone().coerce(ColumnType::Timestamp));
                let mut values = Vec::with_capacity(columns.len());
                values.push(Value::Text(id));
                values.push(to_sql_value(timestamp));
                for (index, spec) in &targets {
                    let value = row.get(*index).cloned().unwrap_or_default();
                    values.push(to_sql_value(value.coerce(spec.column_type)));
                }
                statement.execute(params_from_iter(values.iter()))?;
                report.rows += 1;
            }
        }
        tx.commit()?;
        self.record_bulk(&report);
        Ok(report)
    }

    /// Maps a batch header to a declared column.
    fn resolve_batch_column(&self, name: &str) -> Option<&ColumnSpec> {
        let trimmed = name.trim();
        if trimmed.eq_ignore_ascii_case(ID_COLUMN) {
            return self.schema.column(ID_COLUMN);
        }
        if trimmed.eq_ignore_ascii_case(TIMESTAMP_COLUMN) {
            return self.schema.column(TIMESTAMP_COLUMN);
        }
        self.schema.column(name)
    }

    /// Emits audit events for a completed bulk write.
    fn record_bulk(&self, report: &BulkUpsertReport) {
        let table = self.schema.name();
        if report.generated_ids > 0 {
            self.audit.record(
                &AuditEvent::warn("bulk_upsert_generated_ids", "rows without id received new ids")
                    .with_field("table", table)
                    .with_field("count", report.generated_ids),
            );
        }
        if report.generated_timestamp && report.rows > 0 {
            self.audit.record(
                &AuditEvent::warn("bulk_upsert_generated_timestamp", "batch has no timestamp column")
                    .with_field("table", table),
            );
        }
        for column in &report.ignored_columns {
            self.audit.record(
                &AuditEvent::warn("bulk_upsert_ignored_column", "batch column ignored")
                    .with_field("table", table)
                    .with_field("column", column),
            );
        }
        self.audit.record(
            &AuditEvent::info("bulk_upsert_completed", "batch written")
                .with_field("table", table)
                .with_field("rows", report.rows),
        );
    }

    /// Reads all rows or the row matching `id`.
    fn query_rows(&self, id: Option<&str>) -> Result<Table, SqliteStoreError> {
        self.ensure_synced()?;
        let table = quote_identifier(self.schema.name());
        let connection = open_connection(&self.config)?;
        let live = live_columns(&connection, self.schema.name())?;
        let names: Vec<String> = live.into_iter().map(|column| column.name).collect();
        let types: Vec<Option<ColumnType>> =
            names.iter().map(|name| self.declared_type(name)).collect();
        let select_list =
            names.iter().map(|name| quote_identifier(name)).collect::<Vec<_>>().join(", ");
        let mut sql = format!("SELECT {select_list} FROM {table}");
        if id.is_some() {
            sql.push_str(" WHERE \"id\" = ?1");
        }
        sql.push_str(" ORDER BY \"timestamp\", \"id\"");
        let params: Vec<Value> = id.map(|id| Value::Text(id.to_string())).into_iter().collect();

        let mut statement = connection.prepare(&sql)?;
        let mut rows = statement.query(params_from_iter(params.iter()))?;
        let mut result = Table::new(names);
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(types.len());
            for (index, column_type) in types.iter().enumerate() {
                values.push(decode_value(row.get_ref(index)?, *column_type));
            }
            result.push_row(values).map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        }
        Ok(result)
    }

    /// Runs a grouped aggregation, failing soft on invalid parameters.
    fn aggregate(&self, query: &AggregateQuery) -> Result<Table, SqliteStoreError> {
        self.ensure_synced()?;
        let empty = Table::new(vec![GROUP_COLUMN.to_string(), AGGREGATION_COLUMN.to_string()]);
        let connection = open_connection(&self.config)?;
        let live = live_columns(&connection, self.schema.name())?;
        let find = |name: &str| {
            live.iter()
                .find(|column| column.name.eq_ignore_ascii_case(name.trim()))
                .map(|column| column.name.clone())
        };
        let Some(group_column) = find(&query.group_by) else {
            self.reject_aggregate(query, "unknown group_by column");
            return Ok(empty);
        };
        let Some(field_column) = find(&query.field) else {
            self.reject_aggregate(query, "unknown aggregation column");
            return Ok(empty);
        };
        let Some(function) = AggregateFunction::parse(&query.function) else {
            self.reject_aggregate(query, "unknown aggregation function");
            return Ok(empty);
        };

        let mut group_expr = quote_identifier(&group_column);
        let mut field_expr = quote_identifier(&field_column);
        let mut group_type = self.declared_type(&group_column);
        let mut field_type = match function {
            AggregateFunction::Min | AggregateFunction::Max => self.declared_type(&field_column),
            AggregateFunction::Count | AggregateFunction::Sum => None,
        };
        if let Some(cast) = &query.cast {
            let target = find(&cast.target_field);
            let on_group = target.as_deref() == Some(group_column.as_str());
            let on_field = target.as_deref() == Some(field_column.as_str());
            if !on_group && !on_field {
                self.reject_aggregate(query, "cast target names neither column");
                return Ok(empty);
            }
            if on_group {
                group_expr = cast_expression(&group_expr, cast.target_type);
                group_type = None;
            }
            if on_field {
                field_expr = cast_expression(&field_expr, cast.target_type);
                field_type = None;
            }
        }

        let sql = format!(
            "SELECT {group_expr} AS \"{GROUP_COLUMN}\", {}({field_expr}) AS \
             \"{AGGREGATION_COLUMN}\" FROM {} GROUP BY 1 ORDER BY 1",
            function.sql_name(),
            quote_identifier(self.schema.name())
        );
        let mut statement = connection.prepare(&sql)?;
        let mut rows = statement.query(params![])?;
        let mut result = empty;
        while let Some(row) = rows.next()? {
            let group = decode_value(row.get_ref(0)?, group_type);
            let aggregation = decode_value(row.get_ref(1)?, field_type);
            result
                .push_row(vec![group, aggregation])
                .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        }
        Ok(result)
    }

    /// Reports an aggregation request that yields an empty result.
    fn reject_aggregate(&self, query: &AggregateQuery, reason: &str) {
        self.audit.record(
            &AuditEvent::warn("aggregation_rejected", reason)
                .with_field("group_by", &query.group_by)
                .with_field("function", &query.function)
                .with_field("field", &query.field),
        );
    }
}

impl Datastore for SqliteDatastore {
    fn table_schema(&self) -> &TableSchema {
        &self.schema
    }

    fn sync_schema(&self) -> Result<SchemaSyncReport, StoreError> {
        self.sync().map_err(StoreError::from)
    }

    fn upsert(&self, record: &SubmissionRecord) -> Result<(), StoreError> {
        self.upsert_record(record).map_err(StoreError::from)
    }

    fn upsert_bulk(&self, batch: &Table) -> Result<BulkUpsertReport, StoreError> {
        self.upsert_batch(batch).map_err(StoreError::from)
    }

    fn query(&self, id: Option<&str>) -> Result<Table, StoreError> {
        self.query_rows(id).map_err(StoreError::from)
    }

    fn query_aggregated(&self, query: &AggregateQuery) -> Result<Table, StoreError> {
        self.aggregate(query).map_err(StoreError::from)
    }
}

// ============================================================================
// SECTION: Schema Helpers
// ============================================================================

/// Column as reported by `pragma_table_info`.
struct LiveColumn {
    /// Column name.
    name: String,
    /// Declared type text.
    declared_type: String,
    /// Primary key flag.
    primary_key: bool,
}

/// Type affinity per the `SQLite` declared-type rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Affinity {
    /// INTEGER affinity.
    Integer,
    /// TEXT affinity.
    Text,
    /// BLOB affinity.
    Blob,
    /// REAL affinity.
    Real,
    /// NUMERIC affinity.
    Numeric,
}

/// Derives the affinity of a declared type.
fn affinity(declared_type: &str) -> Affinity {
    let upper = declared_type.to_ascii_uppercase();
    if upper.contains("INT") {
        Affinity::Integer
    } else if upper.contains("CHAR") || upper.contains("CLOB") || upper.contains("TEXT") {
        Affinity::Text
    } else if upper.is_empty() || upper.contains("BLOB") {
        Affinity::Blob
    } else if upper.contains("REAL") || upper.contains("FLOA") || upper.contains("DOUB") {
        Affinity::Real
    } else {
        Affinity::Numeric
    }
}

/// Affinities a live column may have for a declared column type.
const fn accepted_affinities(column_type: ColumnType) -> &'static [Affinity] {
    match column_type {
        ColumnType::Text => &[Affinity::Text],
        ColumnType::Integer => &[Affinity::Integer, Affinity::Numeric],
        ColumnType::Float => &[Affinity::Real, Affinity::Numeric],
        ColumnType::Boolean => &[Affinity::Numeric, Affinity::Integer],
        ColumnType::Timestamp => &[Affinity::Numeric, Affinity::Text],
    }
}

/// Returns the declared `SQLite` type for a column type.
const fn sql_type(column_type: ColumnType) -> &'static str {
    match column_type {
        ColumnType::Text => "TEXT",
        ColumnType::Integer => "INTEGER",
        ColumnType::Float => "REAL",
        ColumnType::Boolean => "BOOLEAN",
        ColumnType::Timestamp => "DATETIME",
    }
}

/// Reads the live column list; empty when the table does not exist.
fn live_columns(connection: &Connection, table: &str) -> Result<Vec<LiveColumn>, SqliteStoreError> {
    let mut statement =
        connection.prepare("SELECT name, type, pk FROM pragma_table_info(?1) ORDER BY cid")?;
    let rows = statement.query_map(params![table], |row| {
        let primary_key: i64 = row.get(2)?;
        Ok(LiveColumn {
            name: row.get(0)?,
            declared_type: row.get(1)?,
            primary_key: primary_key != 0,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(SqliteStoreError::from)
}

/// Requires the live primary key to be exactly `id`.
fn check_primary_key(live: &[LiveColumn]) -> Result<(), SqliteStoreError> {
    let keys: Vec<&str> =
        live.iter().filter(|column| column.primary_key).map(|column| column.name.as_str()).collect();
    match keys.as_slice() {
        [key] if key.eq_ignore_ascii_case(ID_COLUMN) => Ok(()),
        _ => Err(SqliteStoreError::SchemaConflict(format!(
            "table primary key must be {ID_COLUMN}, found [{}]",
            keys.join(", ")
        ))),
    }
}

/// Rejects a live column whose type cannot hold the declared values.
fn check_compatible(declared: &ColumnSpec, live: &LiveColumn) -> Result<(), SqliteStoreError> {
    let found = affinity(&live.declared_type);
    if accepted_affinities(declared.column_type).contains(&found) {
        return Ok(());
    }
    Err(SqliteStoreError::SchemaConflict(format!(
        "column {} is declared {} but the table stores {}",
        declared.name,
        declared.column_type,
        if live.declared_type.is_empty() { "untyped values" } else { live.declared_type.as_str() }
    )))
}

/// Builds the `CREATE TABLE` statement.
fn create_table_sql(schema: &TableSchema) -> String {
    let columns: Vec<String> = schema
        .columns()
        .iter()
        .map(|column| {
            let mut definition =
                format!("{} {}", quote_identifier(&column.name), sql_type(column.column_type));
            if !column.nullable {
                definition.push_str(" NOT NULL");
            }
            if column.primary_key {
                definition.push_str(" PRIMARY KEY");
            }
            definition
        })
        .collect();
    format!("CREATE TABLE {} ({});", quote_identifier(schema.name()), columns.join(", "))
}

/// Builds an insert-or-update statement keyed on `id`.
fn upsert_sql(table: &str, columns: &[&str]) -> String {
    let names: Vec<String> = columns.iter().map(|column| quote_identifier(column)).collect();
    let placeholders: Vec<String> = (1 ..= columns.len()).map(|index| format!("?{index}")).collect();
    let updates: Vec<String> = columns
        .iter()
        .filter(|column| **column != ID_COLUMN)
        .map(|column| {
            let name = quote_identifier(column);
            format!("{name} = excluded.{name}")
        })
        .collect();
    let conflict = if updates.is_empty() {
        "DO NOTHING".to_string()
    } else {
        format!("DO UPDATE SET {}", updates.join(", "))
    };
    format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT({}) {conflict}",
        quote_identifier(table),
        names.join(", "),
        placeholders.join(", "),
        quote_identifier(ID_COLUMN)
    )
}

/// Builds an update of `columns` for the row whose id is bound to `?1`.
fn update_sql(table: &str, columns: &[&str]) -> String {
    let assignments: Vec<String> = columns
        .iter()
        .enumerate()
        .map(|(index, column)| format!("{} = ?{}", quote_identifier(column), index + 2))
        .collect();
    format!(
        "UPDATE {} SET {} WHERE {} = ?1",
        quote_identifier(table),
        assignments.join(", "),
        quote_identifier(ID_COLUMN)
    )
}

/// Wraps a column expression in a cast.
fn cast_expression(expression: &str, target: CastTarget) -> String {
    match target {
        CastTarget::Date => format!("date({expression})"),
        CastTarget::Integer => format!("CAST({expression} AS INTEGER)"),
    }
}

/// Quotes an identifier for `SQLite`.
fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

// ============================================================================
// SECTION: Value Helpers
// ============================================================================

/// Converts a value to its stored form.
fn to_sql_value(value: FieldValue) -> Value {
    match value {
        FieldValue::Null => Value::Null,
        FieldValue::Text(text) => Value::Text(text),
        FieldValue::Integer(number) => Value::Integer(number),
        FieldValue::Float(number) => Value::Real(number),
        FieldValue::Boolean(flag) => Value::Integer(i64::from(flag)),
        FieldValue::Timestamp(timestamp) => Value::Text(timestamp.to_canonical_string()),
    }
}

/// Decodes a stored cell using the declared column type when known.
fn decode_value(value: ValueRef<'_>, column_type: Option<ColumnType>) -> FieldValue {
    match (value, column_type) {
        (ValueRef::Null, _) => FieldValue::Null,
        (ValueRef::Integer(number), Some(column_type @ (ColumnType::Boolean | ColumnType::Float))) => {
            FieldValue::Integer(number).coerce(column_type)
        }
        (ValueRef::Integer(number), _) => FieldValue::Integer(number),
        (ValueRef::Real(number), _) => FieldValue::Float(number),
        (ValueRef::Text(bytes), column_type) => {
            let text = String::from_utf8_lossy(bytes).into_owned();
            match column_type {
                None | Some(ColumnType::Text) => FieldValue::Text(text),
                Some(column_type) => FieldValue::from_text(&text, column_type),
            }
        }
        (ValueRef::Blob(bytes), _) => FieldValue::Text(String::from_utf8_lossy(bytes).into_owned()),
    }
}

// ============================================================================
// SECTION: Path Helpers
// ============================================================================

/// Validates a table name derived from configuration.
///
/// # Errors
///
/// Returns [`SqliteStoreError::Invalid`] when the name is empty, too long,
/// reserved, or contains characters other than ASCII letters, digits, and `_`.
pub fn validate_table_name(name: &str) -> Result<(), SqliteStoreError> {
    if name.is_empty() || name.len() > MAX_TABLE_NAME_LENGTH {
        return Err(SqliteStoreError::Invalid("table name length out of range".to_string()));
    }
    if !name.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '_') {
        return Err(SqliteStoreError::Invalid(format!("table name {name:?} has invalid characters")));
    }
    if name.to_ascii_lowercase().starts_with("sqlite_") {
        return Err(SqliteStoreError::Invalid("table name uses the sqlite_ prefix".to_string()));
    }
    Ok(())
}

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.exists() && path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with secure defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection.busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))?;
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
