// crates/formbuilder-server/src/dashboard.rs
// ============================================================================
// Module: Dashboard Views
// Description: Read-only dashboard queries over the datastore.
// Purpose: Collect the submission table and summary aggregations.
// Dependencies: formbuilder-core
// ============================================================================

//! ## Overview
//! The dashboard shows every stored row, a submissions-per-day summary, and
//! an optional breakdown by one configured field. All three come from the
//! [`Datastore`] trait; aggregation parameter problems degrade to empty
//! tables inside the store.

// ============================================================================
// SECTION: Imports
// ============================================================================

use formbuilder_core::AggregateQuery;
use formbuilder_core::CastTarget;
use formbuilder_core::Datastore;
use formbuilder_core::ID_COLUMN;
use formbuilder_core::StoreError;
use formbuilder_core::TIMESTAMP_COLUMN;
use formbuilder_core::Table;

// ============================================================================
// SECTION: View
// ============================================================================

/// Data behind the dashboard page.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    /// Every stored submission.
    pub submissions: Table,
    /// Submission count per calendar day.
    pub per_day: Table,
    /// Count per value of the breakdown field, when configured.
    pub breakdown: Option<(String, Table)>,
}

/// Submissions per day.
#[must_use]
pub fn per_day_query() -> AggregateQuery {
    AggregateQuery::new(TIMESTAMP_COLUMN, "count", ID_COLUMN)
        .with_cast(TIMESTAMP_COLUMN, CastTarget::Date)
}

/// Submissions per value of `field`.
#[must_use]
pub fn breakdown_query(field: &str) -> AggregateQuery {
    AggregateQuery::new(field, "count", ID_COLUMN)
}

/// Loads the dashboard tables.
///
/// # Errors
///
/// Returns [`StoreError`] when a read fails.
pub fn load_dashboard(
    datastore: &dyn Datastore,
    breakdown_field: Option<&str>,
) -> Result<DashboardView, StoreError> {
    let submissions = datastore.query(None)?;
    let per_day = datastore.query_aggregated(&per_day_query())?;
    let breakdown = match breakdown_field {
        Some(field) => Some((field.to_string(), datastore.query_aggregated(&breakdown_query(field))?)),
        None => None,
    };
    Ok(DashboardView {
        submissions,
        per_day,
        breakdown,
    })
}
