// crates/formbuilder-store-sqlite/tests/sqlite_datastore.rs
// ============================================================================
// Module: SQLite Datastore Tests
// Description: Integration tests for schema sync, upserts, queries, and aggregation.
// Purpose: Exercise the datastore contract against real SQLite files.
// ============================================================================

//! ## Overview
//! Each test opens a store in a fresh temporary directory and drives it
//! through the [`Datastore`] trait.

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
    reason = "Test-only assertions and helpers are permitted."
)]

use std::path::Path;
use std::sync::Arc;

use formbuilder_core::AggregateQuery;
use formbuilder_core::AnalyticsOptions;
use formbuilder_core::CastTarget;
use formbuilder_core::DataType;
use formbuilder_core::Datastore;
use formbuilder_core::FieldDefinition;
use formbuilder_core::FieldValue;
use formbuilder_core::FormSchema;
use formbuilder_core::InputKind;
use formbuilder_core::MemoryAuditSink;
use formbuilder_core::PageDefinition;
use formbuilder_core::StoreError;
use formbuilder_core::SubmissionRecord;
use formbuilder_core::Table;
use formbuilder_core::TableSchema;
use formbuilder_core::Timestamp;
use formbuilder_store_sqlite::SqliteDatastore;
use formbuilder_store_sqlite::SqliteStoreConfig;
use rusqlite::Connection;
use tempfile::TempDir;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

fn field(name: &str, data_type: DataType, required: bool) -> FieldDefinition {
    FieldDefinition {
        backend_name: name.to_string(),
        label: name.to_string(),
        page_number: 1,
        group_id: None,
        input_kind: InputKind::TextInput,
        data_type,
        required,
        select_options: Vec::new(),
    }
}

fn table_schema(fields: Vec<FieldDefinition>) -> TableSchema {
    let pages = vec![PageDefinition {
        page_number: 1,
        title: "Only".to_string(),
        description: String::new(),
    }];
    FormSchema::new(pages, fields).unwrap().table_schema("survey", AnalyticsOptions::default())
}

fn base_schema() -> TableSchema {
    table_schema(vec![
        field("name", DataType::String, true),
        field("age", DataType::Integer, false),
        field("subscribed", DataType::Boolean, false),
    ])
}

fn open(path: &Path, schema: TableSchema) -> (SqliteDatastore, Arc<MemoryAuditSink>) {
    let audit = Arc::new(MemoryAuditSink::new());
    let store = SqliteDatastore::new(SqliteStoreConfig::new(path), schema, audit.clone()).unwrap();
    (store, audit)
}

fn record(id: &str, at: &str, name: &str, age: Option<i64>) -> SubmissionRecord {
    let mut record = SubmissionRecord::new();
    record.insert("id", id);
    record.insert("timestamp", Timestamp::parse(at).unwrap());
    record.insert("name", name);
    record.insert("age", age);
    record
}

fn text_table(columns: &[&str], rows: &[&[&str]]) -> Table {
    Table::with_rows(
        columns.iter().map(|column| (*column).to_string()).collect(),
        rows.iter()
            .map(|row| row.iter().map(|cell| FieldValue::from(*cell)).collect())
            .collect(),
    )
    .unwrap()
}

// ============================================================================
// SECTION: Schema Sync
// ============================================================================

#[test]
fn sync_creates_table_then_is_a_no_op() {
    let dir = TempDir::new().unwrap();
    let (store, audit) = open(&dir.path().join("forms.sqlite"), base_schema());

    let first = store.sync_schema().unwrap();
    assert!(first.created);
    let second = store.sync_schema().unwrap();
    assert!(!second.created);
    assert!(second.added_columns.is_empty());
    assert!(second.untracked_columns.is_empty());
    assert!(audit.event_names().contains(&"schema_table_created"));
}

#[test]
fn sync_adds_new_columns_and_keeps_existing_rows() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("forms.sqlite");
    let (store, _) = open(&path, base_schema());
    store.sync_schema().unwrap();
    store.upsert(&record("a1", "2024-05-01 09:00:00", "Ada", Some(36))).unwrap();

    let mut fields = vec![
        field("name", DataType::String, true),
        field("age", DataType::Integer, false),
        field("subscribed", DataType::Boolean, false),
    ];
    fields.push(field("email", DataType::String, true));
    let (grown, audit) = open(&path, table_schema(fields));
    let report = grown.sync_schema().unwrap();
    assert_eq!(report.added_columns, vec!["email".to_string()]);
    assert_eq!(report.relaxed_columns, vec!["email".to_string()]);
    assert!(audit.event_names().contains(&"schema_column_relaxed"));

    let rows = grown.query(Some("a1")).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows.value(0, "name"), Some(&FieldValue::from("Ada")));
    assert_eq!(rows.value(0, "email"), Some(&FieldValue::Null));
}

#[test]
fn sync_reports_columns_missing_from_configuration() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("forms.sqlite");
    let (store, _) = open(&path, base_schema());
    store.sync_schema().unwrap();

    let (shrunk, _) = open(&path, table_schema(vec![field("name", DataType::String, true)]));
    let report = shrunk.sync_schema().unwrap();
    assert_eq!(report.untracked_columns, vec!["age".to_string(), "subscribed".to_string()]);
}

#[test]
fn sync_fails_on_type_conflict() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("forms.sqlite");
    let connection = Connection::open(&path).unwrap();
    connection
        .execute_batch(
            "CREATE TABLE survey (id TEXT PRIMARY KEY, timestamp DATETIME, name TEXT, age TEXT, \
             subscribed BOOLEAN);",
        )
        .unwrap();
    drop(connection);

    let (store, _) = open(&path, base_schema());
    let err = store.sync_schema().unwrap_err();
    assert!(matches!(err, StoreError::SchemaSync(message) if message.contains("age")));
}

#[test]
fn sync_fails_when_primary_key_is_not_id() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("forms.sqlite");
    let connection = Connection::open(&path).unwrap();
    connection.execute_batch("CREATE TABLE survey (rowkey INTEGER PRIMARY KEY, id TEXT);").unwrap();
    drop(connection);

    let (store, _) = open(&path, base_schema());
    assert!(matches!(store.sync_schema(), Err(StoreError::SchemaSync(_))));
}

#[test]
fn operations_before_sync_are_refused() {
    let dir = TempDir::new().unwrap();
    let (store, _) = open(&dir.path().join("forms.sqlite"), base_schema());
    assert!(matches!(store.query(None), Err(StoreError::NotSynced)));
    assert!(matches!(
        store.upsert(&record("x", "2024-01-01", "X", None)),
        Err(StoreError::NotSynced)
    ));
}

// ============================================================================
// SECTION: Upsert and Query
// ============================================================================

#[test]
fn upsert_round_trips_typed_values() {
    let dir = TempDir::new().unwrap();
    let (store, _) = open(&dir.path().join("forms.sqlite"), base_schema());
    store.sync_schema().unwrap();

    let mut submitted = record("s1", "2024-05-01 10:00:00", "Grace", None);
    submitted.insert("age", "41");
    submitted.insert("subscribed", "yes");
    store.upsert(&submitted).unwrap();

    let table = store.query(Some("s1")).unwrap();
    let stored = table.record(0).unwrap();
    assert_eq!(stored.get("age"), Some(&FieldValue::Integer(41)));
    assert_eq!(stored.get("subscribed"), Some(&FieldValue::Boolean(true)));
    assert_eq!(
        stored.get("timestamp"),
        Some(&FieldValue::Timestamp(Timestamp::parse("2024-05-01 10:00:00").unwrap()))
    );
}

#[test]
fn upsert_same_id_replaces_present_columns_only() {
    let dir = TempDir::new().unwrap();
    let (store, _) = open(&dir.path().join("forms.sqlite"), base_schema());
    store.sync_schema().unwrap();
    store.upsert(&record("s1", "2024-05-01 10:00:00", "Grace", Some(41))).unwrap();

    let mut amendment = SubmissionRecord::new();
    amendment.insert("id", "s1");
    amendment.insert("name", "Grace H.");
    store.upsert(&amendment).unwrap();

    let table = store.query(None).unwrap();
    assert_eq!(table.len(), 1);
    assert_eq!(table.value(0, "name"), Some(&FieldValue::from("Grace H.")));
    assert_eq!(table.value(0, "age"), Some(&FieldValue::Integer(41)));
}

#[test]
fn upsert_rejects_missing_id_and_unknown_columns() {
    let dir = TempDir::new().unwrap();
    let (store, _) = open(&dir.path().join("forms.sqlite"), base_schema());
    store.sync_schema().unwrap();

    let mut no_id = SubmissionRecord::new();
    no_id.insert("name", "Nobody");
    assert!(matches!(store.upsert(&no_id), Err(StoreError::MissingId)));

    let mut extra = record("s2", "2024-05-01", "X", None);
    extra.insert("favourite_colour", "green");
    assert!(matches!(
        store.upsert(&extra),
        Err(StoreError::UnknownColumn(column)) if column == "favourite_colour"
    ));
}

#[test]
fn query_unknown_id_is_empty() {
    let dir = TempDir::new().unwrap();
    let (store, _) = open(&dir.path().join("forms.sqlite"), base_schema());
    store.sync_schema().unwrap();
    let table = store.query(Some("missing")).unwrap();
    assert!(table.is_empty());
    assert_eq!(table.columns()[0], "id");
}

#[test]
fn query_orders_by_timestamp() {
    let dir = TempDir::new().unwrap();
    let (store, _) = open(&dir.path().join("forms.sqlite"), base_schema());
    store.sync_schema().unwrap();
    store.upsert(&record("late", "2024-05-02 08:00:00", "B", None)).unwrap();
    store.upsert(&record("early", "2024-05-01 08:00:00", "A", None)).unwrap();
    let table = store.query(None).unwrap();
    assert_eq!(table.value(0, "id"), Some(&FieldValue::from("early")));
    assert_eq!(table.value(1, "id"), Some(&FieldValue::from("late")));
}

// ============================================================================
// SECTION: Bulk Upsert
// ============================================================================

#[test]
fn bulk_generates_missing_ids_and_timestamp() {
    let dir = TempDir::new().unwrap();
    let (store, audit) = open(&dir.path().join("forms.sqlite"), base_schema());
    store.sync_schema().unwrap();

    let batch = text_table(&["name", "age", "notes"], &[&["Ada", "36", "x"], &["Alan", "", "y"]]);
    let report = store.upsert_bulk(&batch).unwrap();
    assert_eq!(report.rows, 2);
    assert_eq!(report.generated_ids, 2);
    assert!(report.generated_timestamp);
    assert_eq!(report.ignored_columns, vec!["notes".to_string()]);
    assert!(audit.event_names().contains(&"bulk_upsert_ignored_column"));

    let table = store.query(None).unwrap();
    assert_eq!(table.len(), 2);
    let ids: Vec<String> = (0 .. 2).map(|row| table.value(row, "id").unwrap().to_string()).collect();
    assert_ne!(ids[0], ids[1]);
    assert!(ids.iter().all(|id| id.len() == 16));
    assert_eq!(table.value(0, "timestamp"), table.value(1, "timestamp"));
}

#[test]
fn bulk_matches_id_and_timestamp_headers_case_insensitively() {
    let dir = TempDir::new().unwrap();
    let (store, _) = open(&dir.path().join("forms.sqlite"), base_schema());
    store.sync_schema().unwrap();

    let batch = text_table(
        &["ID", "Timestamp", "name", "Age"],
        &[&["r1", "2024-03-01 12:00:00", "Ada", "36"]],
    );
    let report = store.upsert_bulk(&batch).unwrap();
    assert_eq!(report.generated_ids, 0);
    assert!(!report.generated_timestamp);
    assert_eq!(report.ignored_columns, vec!["Age".to_string()]);

    let table = store.query(Some("r1")).unwrap();
    assert_eq!(table.value(0, "name"), Some(&FieldValue::from("Ada")));
    assert_eq!(table.value(0, "age"), Some(&FieldValue::Null));
}

#[test]
fn bulk_reimport_of_export_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let (store, _) = open(&dir.path().join("forms.sqlite"), base_schema());
    store.sync_schema().unwrap();
    store
        .upsert_bulk(&text_table(&["name", "age"], &[&["Ada", "36"], &["Alan", "41"]]))
        .unwrap();

    let exported = store.query(None).unwrap();
    let report = store.upsert_bulk(&exported).unwrap();
    assert_eq!(report.generated_ids, 0);
    assert_eq!(store.query(None).unwrap(), exported);
}

#[test]
fn failed_bulk_row_rolls_back_whole_batch() {
    let dir = TempDir::new().unwrap();
    let (store, _) = open(&dir.path().join("forms.sqlite"), base_schema());
    store.sync_schema().unwrap();
    let batch = Table::with_rows(
        vec!["id".to_string(), "name".to_string()],
        vec![
            vec![FieldValue::from("ok1"), FieldValue::from("Ada")],
            vec![FieldValue::from("bad"), FieldValue::Null],
        ],
    )
    .unwrap();

    assert!(store.upsert_bulk(&batch).is_err());
    assert!(store.query(None).unwrap().is_empty());
}

// ============================================================================
// SECTION: Aggregation
// ============================================================================

#[test]
fn aggregation_counts_per_day_with_date_cast() {
    let dir = TempDir::new().unwrap();
    let (store, _) = open(&dir.path().join("forms.sqlite"), base_schema());
    store.sync_schema().unwrap();
    store.upsert(&record("a", "2024-05-01 08:00:00", "A", Some(10))).unwrap();
    store.upsert(&record("b", "2024-05-01 17:30:00", "B", Some(20))).unwrap();
    store.upsert(&record("c", "2024-05-02 09:15:00", "C", None)).unwrap();

    let query = AggregateQuery::new("timestamp", "count", "id").with_cast("timestamp", CastTarget::Date);
    let table = store.query_aggregated(&query).unwrap();
    assert_eq!(table.columns(), ["group".to_string(), "aggregation".to_string()]);
    assert_eq!(table.len(), 2);
    assert_eq!(table.value(0, "group"), Some(&FieldValue::from("2024-05-01")));
    assert_eq!(table.value(0, "aggregation"), Some(&FieldValue::Integer(2)));
    assert_eq!(table.value(1, "aggregation"), Some(&FieldValue::Integer(1)));
}

#[test]
fn aggregation_sums_by_group() {
    let dir = TempDir::new().unwrap();
    let (store, _) = open(&dir.path().join("forms.sqlite"), base_schema());
    store.sync_schema().unwrap();
    store.upsert(&record("a", "2024-05-01 08:00:00", "A", Some(10))).unwrap();
    store.upsert(&record("b", "2024-05-01 09:00:00", "A", Some(5))).unwrap();
    store.upsert(&record("c", "2024-05-01 10:00:00", "B", Some(7))).unwrap();

    let table = store.query_aggregated(&AggregateQuery::new("name", "SUM", "age")).unwrap();
    assert_eq!(table.value(0, "group"), Some(&FieldValue::from("A")));
    assert_eq!(table.value(0, "aggregation"), Some(&FieldValue::Integer(15)));
    assert_eq!(table.value(1, "aggregation"), Some(&FieldValue::Integer(7)));
}

#[test]
fn category_counts_cover_every_row() {
    let dir = TempDir::new().unwrap();
    let schema = table_schema(vec![
        field("name", DataType::String, true),
        field("category", DataType::String, false),
    ]);
    let (store, _) = open(&dir.path().join("forms.sqlite"), schema);
    store.sync_schema().unwrap();
    let categories = ["red", "blue", "red", "green", "blue"];
    for (index, category) in categories.iter().enumerate() {
        let mut row = SubmissionRecord::new();
        row.insert("id", format!("r{index}"));
        row.insert("timestamp", Timestamp::parse("2024-05-01 08:00:00").unwrap());
        row.insert("name", "Ada");
        row.insert("category", *category);
        store.upsert(&row).unwrap();
    }

    let table = store.query_aggregated(&AggregateQuery::new("category", "count", "id")).unwrap();
    assert_eq!(table.len(), 3);
    let total: i64 = (0..table.len())
        .map(|row| match table.value(row, "aggregation") {
            Some(FieldValue::Integer(count)) => *count,
            other => panic!("unexpected count: {other:?}"),
        })
        .sum();
    assert_eq!(total, 5);
}

#[test]
fn invalid_aggregation_yields_empty_table() {
    let dir = TempDir::new().unwrap();
    let (store, audit) = open(&dir.path().join("forms.sqlite"), base_schema());
    store.sync_schema().unwrap();
    store.upsert(&record("a", "2024-05-01 08:00:00", "A", Some(10))).unwrap();

    let queries = [
        AggregateQuery::new("nope", "count", "id"),
        AggregateQuery::new("name", "median", "age"),
        AggregateQuery::new("name", "count", "id").with_cast("age", CastTarget::Integer),
    ];
    for query in queries {
        let table = store.query_aggregated(&query).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.columns().len(), 2);
    }
    assert_eq!(
        audit.event_names().iter().filter(|name| **name == "aggregation_rejected").count(),
        3
    );
}
