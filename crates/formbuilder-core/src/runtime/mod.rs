// crates/formbuilder-core/src/runtime/mod.rs
// ============================================================================
// Module: Form Builder Runtime
// Description: Rendering, extraction, and submission orchestration.
// Purpose: Execute the schema-driven request pipeline against injected collaborators.
// Dependencies: crate::{audit, core, interfaces}
// ============================================================================

//! ## Overview
//! Runtime modules consume a validated [`crate::FormSchema`] and produce
//! markup, normalized records, and persisted submissions. Everything outside
//! the process is reached through [`crate::interfaces`].

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod extract;
pub mod markup;
pub mod render;
pub mod submission;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use extract::extract_response;
pub use extract::form_value;
pub use markup::Element;
pub use render::FormRenderer;
pub use submission::DEFAULT_ELAPSED_THRESHOLD_SECS;
pub use submission::RawSubmission;
pub use submission::SubmissionError;
pub use submission::SubmissionHandler;
pub use submission::SubmissionPolicy;
