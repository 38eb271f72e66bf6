// crates/formbuilder-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Submission Store
// Description: Schema-driven Datastore backend using SQLite.
// Purpose: Provide durable, migration-aware persistence for form submissions.
// Dependencies: formbuilder-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides a SQLite-backed [`formbuilder_core::Datastore`]. The
//! table is derived from the form configuration and reconciled additively at
//! startup: missing columns are added, nothing is dropped or retyped, and
//! type conflicts fail closed. Rows are keyed on the session `id`.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SqliteDatastore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
pub use store::validate_table_name;
