// crates/formbuilder-core/src/lib.rs
// ============================================================================
// Module: Form Builder Core Library
// Description: Public API surface for the Form Builder core.
// Purpose: Expose schema types, collaborator interfaces, and runtime helpers.
// Dependencies: crate::{audit, core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Form Builder core turns a declarative field list into three derived
//! artifacts: rendered form markup, normalized submission records, and the
//! table definition the datastore keeps in sync. Storage, geolocation, and
//! mail delivery are reached only through the traits in [`interfaces`], so the
//! core stays backend-agnostic.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::*;

pub use audit::AuditEvent;
pub use audit::AuditLevel;
pub use audit::AuditSink;
pub use audit::FileAuditSink;
pub use audit::MemoryAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use interfaces::AGGREGATION_COLUMN;
pub use interfaces::AggregateFunction;
pub use interfaces::AggregateQuery;
pub use interfaces::BulkUpsertReport;
pub use interfaces::CastOptions;
pub use interfaces::CastTarget;
pub use interfaces::Datastore;
pub use interfaces::GROUP_COLUMN;
pub use interfaces::GeoDetails;
pub use interfaces::GeoLookup;
pub use interfaces::LookupError;
pub use interfaces::Mailer;
pub use interfaces::ReminderEmail;
pub use interfaces::SchemaSyncReport;
pub use interfaces::StoreError;
pub use runtime::DEFAULT_ELAPSED_THRESHOLD_SECS;
pub use runtime::Element;
pub use runtime::FormRenderer;
pub use runtime::RawSubmission;
pub use runtime::SubmissionError;
pub use runtime::SubmissionHandler;
pub use runtime::SubmissionPolicy;
pub use runtime::extract_response;
pub use runtime::form_value;
