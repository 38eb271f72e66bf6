// crates/formbuilder-config/src/lib.rs
// ============================================================================
// Module: Form Builder Config Library
// Description: Instance configuration model and form definition reader.
// Purpose: Single source of truth for formbuilder.toml and form document semantics.
// Dependencies: calamine, formbuilder-core, formbuilder-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `formbuilder-config` loads and validates the instance configuration and
//! reads the form definition it points at. Both fail closed: any problem is
//! reported at startup before a table is touched or a socket is bound.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod form;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use form::FIELD_COLUMNS;
pub use form::FIELDS_SHEET;
pub use form::FormConfigError;
pub use form::PAGE_COLUMNS;
pub use form::PAGES_SHEET;
pub use form::load_form;
pub use form::load_form_from_toml;
