// crates/formbuilder-core/src/runtime/submission.rs
// ============================================================================
// Module: Submission Orchestrator
// Description: Extract, enrich, validate, and persist one form submission.
// Purpose: Run the per-submission pipeline as a single unit of work.
// Dependencies: crate::{audit, core, interfaces, runtime::extract}
// ============================================================================

//! ## Overview
//! A submission flows through extraction, the mandatory session id check,
//! id/timestamp stamping, optional session metadata capture, the honeypot and
//! elapsed-time checks, and finally a datastore upsert. Metadata and checks
//! are switched by [`AnalyticsOptions`]. Check failures are recorded as
//! boolean columns and never block the write. Geolocation failures degrade to
//! NULL geo columns. Persistence errors propagate without retries.
//!
//! The handler never reads the wall clock; the caller supplies the receipt
//! time in [`RawSubmission::received_at`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use thiserror::Error;

use crate::audit::AuditEvent;
use crate::audit::AuditSink;
use crate::core::schema::AnalyticsOptions;
use crate::core::schema::ELAPSED_PASS_COLUMN;
use crate::core::schema::FORM_LOAD_TIME_FIELD;
use crate::core::schema::FormSchema;
use crate::core::schema::HONEYPOT_FIELD;
use crate::core::schema::HONEYPOT_INITIAL_VALUE;
use crate::core::schema::HONEYPOT_PASS_COLUMN;
use crate::core::schema::ID_COLUMN;
use crate::core::schema::SESSION_ID_FORM_FIELD;
use crate::core::schema::TIMESTAMP_COLUMN;
use crate::core::timestamp::Timestamp;
use crate::core::value::FieldValue;
use crate::core::value::SubmissionRecord;
use crate::interfaces::Datastore;
use crate::interfaces::GeoDetails;
use crate::interfaces::GeoLookup;
use crate::interfaces::StoreError;
use crate::runtime::extract::extract_response;
use crate::runtime::extract::form_value;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Minimum seconds a human needs to fill in the form.
pub const DEFAULT_ELAPSED_THRESHOLD_SECS: f64 = 15.0;
/// Stored honeypot value when the hidden field was not submitted.
pub const HONEYPOT_NOT_ENABLED: &str = "Not Enabled";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Submission pipeline settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SubmissionPolicy {
    /// Enrichment and check toggles.
    pub analytics: AnalyticsOptions,
    /// Fill times below this many seconds fail the elapsed-time check.
    pub elapsed_threshold_secs: f64,
    /// Label stored in the `operating_system` column.
    pub operating_system: String,
}

impl Default for SubmissionPolicy {
    fn default() -> Self {
        Self {
            analytics: AnalyticsOptions::default(),
            elapsed_threshold_secs: DEFAULT_ELAPSED_THRESHOLD_SECS,
            operating_system: std::env::consts::OS.to_string(),
        }
    }
}

/// Raw submission as received by the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSubmission {
    /// Submitted form pairs in arrival order.
    pub form: Vec<(String, String)>,
    /// `User-Agent` header value.
    pub user_agent: Option<String>,
    /// Client address, already resolved through any forwarding header.
    pub client_ip: Option<String>,
    /// Time the request was received.
    pub received_at: Timestamp,
}

/// Submission errors.
#[derive(Debug, Error)]
pub enum SubmissionError {
    /// The session id form field was absent or empty.
    #[error("missing session id")]
    MissingSessionId,
    /// The datastore rejected the record.
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// SECTION: Handler
// ============================================================================

/// Per-submission pipeline.
#[derive(Clone)]
pub struct SubmissionHandler {
    /// Form definition supplying the response template.
    schema: Arc<FormSchema>,
    /// Destination store.
    datastore: Arc<dyn Datastore>,
    /// Optional geolocation collaborator.
    geo: Option<Arc<dyn GeoLookup>>,
    /// Pipeline settings.
    policy: SubmissionPolicy,
    /// Diagnostics sink.
    audit: Arc<dyn AuditSink>,
}

impl SubmissionHandler {
    /// Builds a handler.
    #[must_use]
    pub fn new(
        schema: Arc<FormSchema>,
        datastore: Arc<dyn Datastore>,
        geo: Option<Arc<dyn GeoLookup>>,
        policy: SubmissionPolicy,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            schema,
            datastore,
            geo,
            policy,
            audit,
        }
    }

    /// Returns the pipeline settings.
    #[must_use]
    pub const fn policy(&self) -> &SubmissionPolicy {
        &self.policy
    }

    /// Processes and stores one submission, returning the stored record.
    ///
    /// # Errors
    ///
    /// Returns [`SubmissionError::MissingSessionId`] when no session id was
    /// submitted, or [`SubmissionError::Store`] when the upsert fails.
    pub fn handle_submission(
        &self,
        raw: &RawSubmission,
    ) -> Result<SubmissionRecord, SubmissionError> {
        let mut record = extract_response(&raw.form, &self.schema.response_template());
        let session_id = form_value(&raw.form, SESSION_ID_FORM_FIELD)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(SubmissionError::MissingSessionId)?;
        record.insert(ID_COLUMN, session_id);
        record.insert(TIMESTAMP_COLUMN, raw.received_at);

        let honeypot = form_value(&raw.form, HONEYPOT_FIELD);
        let elapsed = form_value(&raw.form, FORM_LOAD_TIME_FIELD)
            .and_then(Timestamp::parse)
            .map(|loaded_at| raw.received_at.seconds_since(&loaded_at));

        let analytics = self.policy.analytics;
        if analytics.session_data {
            self.capture_session_data(&mut record, raw, honeypot, elapsed);
        }
        if analytics.honeypot_check {
            record.insert(HONEYPOT_PASS_COLUMN, honeypot == Some(HONEYPOT_INITIAL_VALUE));
        }
        if analytics.elapsed_time_check {
            let passed = elapsed.is_some_and(|secs| secs >= self.policy.elapsed_threshold_secs);
            record.insert(ELAPSED_PASS_COLUMN, passed);
        }

        self.datastore.upsert(&record)?;
        self.audit.record(
            &AuditEvent::info("submission_stored", "submission persisted")
                .with_field("id", session_id)
                .with_field("columns", record.len()),
        );
        Ok(record)
    }

    /// Adds client fingerprint, honeypot, elapsed-time, and geo columns.
    fn capture_session_data(
        &self,
        record: &mut SubmissionRecord,
        raw: &RawSubmission,
        honeypot: Option<&str>,
        elapsed: Option<f64>,
    ) {
        record.insert("user_agent", raw.user_agent.clone());
        record.insert("operating_system", self.policy.operating_system.as_str());
        record.insert("ip_address", raw.client_ip.clone());
        record.insert("hpfm", honeypot.unwrap_or(HONEYPOT_NOT_ENABLED));
        record.insert("elapsed_time", elapsed);

        let details = match (&self.geo, raw.client_ip.as_deref()) {
            (Some(geo), Some(ip)) => match geo.lookup(ip) {
                Ok(details) => details,
                Err(err) => {
                    self.audit.record(
                        &AuditEvent::warn("geo_lookup_failed", err.to_string())
                            .with_field("ip_address", ip),
                    );
                    GeoDetails::default()
                }
            },
            _ => GeoDetails::default(),
        };
        for (column, value) in details.columns() {
            record.insert(column, value.map_or(FieldValue::Null, FieldValue::from));
        }
    }
}
