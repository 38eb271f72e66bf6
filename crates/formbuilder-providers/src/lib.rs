// crates/formbuilder-providers/src/lib.rs
// ============================================================================
// Module: Form Builder Providers
// Description: HTTP adapters for the external collaborators.
// Purpose: Implement GeoLookup and Mailer over bounded blocking HTTP clients.
// Dependencies: formbuilder-core, reqwest, serde_json, url
// ============================================================================

//! ## Overview
//! This crate ships the two outbound adapters: [`IpInfoLookup`] resolves a
//! client address to coarse location details, and [`HttpMailer`] posts a
//! reminder message to a transactional email API. Both use blocking clients
//! with timeouts, no redirects, and bounded response reads. Failures surface
//! as [`formbuilder_core::LookupError`] and are treated as best-effort by
//! callers.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod geo;
pub mod http;
pub mod mail;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use geo::IpInfoConfig;
pub use geo::IpInfoLookup;
pub use mail::HttpMailer;
pub use mail::HttpMailerConfig;
