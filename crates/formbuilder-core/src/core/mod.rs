// crates/formbuilder-core/src/core/mod.rs
// ============================================================================
// Module: Form Builder Core Types
// Description: Canonical form schema, value, and identifier structures.
// Purpose: Provide stable types shared by rendering, extraction, and storage.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Core types describe the declarative form (pages and fields), the table
//! definition derived from it, and the dynamically typed values that flow
//! between submissions, the datastore, and exports.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod identifiers;
pub mod schema;
pub mod timestamp;
pub mod value;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use identifiers::MAX_SESSION_ID_BYTES;
pub use identifiers::MIN_SESSION_ID_BYTES;
pub use identifiers::SessionId;
pub use schema::AnalyticsOptions;
pub use schema::ColumnSpec;
pub use schema::ColumnType;
pub use schema::DataType;
pub use schema::ELAPSED_PASS_COLUMN;
pub use schema::FORM_LOAD_TIME_FIELD;
pub use schema::FieldDefinition;
pub use schema::FormSchema;
pub use schema::HONEYPOT_FIELD;
pub use schema::HONEYPOT_INITIAL_VALUE;
pub use schema::HONEYPOT_PASS_COLUMN;
pub use schema::ID_COLUMN;
pub use schema::InputKind;
pub use schema::PageDefinition;
pub use schema::SESSION_DATA_COLUMNS;
pub use schema::SESSION_ID_FORM_FIELD;
pub use schema::SchemaError;
pub use schema::TIMESTAMP_COLUMN;
pub use schema::TableSchema;
pub use schema::is_reserved_column;
pub use timestamp::Timestamp;
pub use value::FieldValue;
pub use value::SubmissionRecord;
pub use value::Table;
pub use value::TableError;
pub use value::parse_bool;
