// crates/formbuilder-server/src/lib.rs
// ============================================================================
// Module: Form Builder Server
// Description: HTTP surface for respondents and operators.
// Purpose: Wire the form pipeline, datastore, and adapters to axum routes.
// Dependencies: axum, formbuilder-config, formbuilder-core, formbuilder-providers,
//               formbuilder-store-sqlite
// ============================================================================

//! ## Overview
//! [`FormServer`] serves the rendered form, accepts submissions through the
//! core pipeline, and exposes operator routes for the dashboard, file
//! exports, bulk upload, and the upload template. Operator routes are gated
//! by [`auth::AccessPolicy`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod auth;
pub mod dashboard;
pub mod export;
pub mod pages;
pub mod receipt;
pub mod server;
pub mod upload;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use auth::AccessPolicy;
pub use auth::AuthError;
pub use auth::Permission;
pub use dashboard::DashboardView;
pub use dashboard::load_dashboard;
pub use export::ExportError;
pub use export::ExportFile;
pub use export::ExportFormat;
pub use export::export_table;
pub use receipt::ReceiptBook;
pub use server::FormServer;
pub use server::ServerError;
pub use server::load_form_schema;
pub use server::open_datastore;
pub use upload::UploadError;
pub use upload::decode_upload;
pub use upload::upload_template;
