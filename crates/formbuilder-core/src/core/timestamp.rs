// crates/formbuilder-core/src/core/timestamp.rs
// ============================================================================
// Module: Form Builder Time Model
// Description: Second-precision wall-clock timestamps for submission records.
// Purpose: Keep one canonical text form for timestamps across storage and exports.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Submission timestamps are naive UTC values truncated to whole seconds and
//! rendered as `YYYY-MM-DD HH:MM:SS`. The same text form is used in the
//! hidden form-load field, the `timestamp` column, and every export format.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;
use serde::Serializer;
use time::OffsetDateTime;
use time::PrimitiveDateTime;
use time::UtcOffset;
use time::format_description::BorrowedFormatItem;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Canonical text layout for timestamps.
const CANONICAL_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
/// ISO layout accepted on input (spreadsheet and JSON sources).
const ISO_LOCAL_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
/// Date-only layout accepted on input.
const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// Second-precision UTC timestamp.
///
/// # Invariants
/// - The sub-second component is always zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(PrimitiveDateTime);

impl Timestamp {
    /// Builds a timestamp from unix seconds.
    #[must_use]
    pub fn from_unix_seconds(seconds: i64) -> Option<Self> {
        let value = OffsetDateTime::from_unix_timestamp(seconds).ok()?;
        Some(Self(PrimitiveDateTime::new(value.date(), value.time())))
    }

    /// Returns the current UTC time truncated to whole seconds.
    #[must_use]
    pub fn now_utc() -> Self {
        let seconds = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default();
        let seconds = i64::try_from(seconds).unwrap_or(i64::MAX);
        Self::from_unix_seconds(seconds).unwrap_or_else(Self::unix_epoch)
    }

    /// Returns the unix epoch.
    #[must_use]
    pub const fn unix_epoch() -> Self {
        Self(PrimitiveDateTime::new(
            OffsetDateTime::UNIX_EPOCH.date(),
            OffsetDateTime::UNIX_EPOCH.time(),
        ))
    }

    /// Parses the canonical form, ISO local form, RFC 3339, or a bare date.
    #[must_use]
    pub fn parse(input: &str) -> Option<Self> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return None;
        }
        if let Ok(value) = PrimitiveDateTime::parse(trimmed, CANONICAL_FORMAT) {
            return Some(Self(value));
        }
        if let Ok(value) = PrimitiveDateTime::parse(trimmed, ISO_LOCAL_FORMAT) {
            return Some(Self(value));
        }
        if let Ok(value) = OffsetDateTime::parse(trimmed, &Rfc3339) {
            let utc = value.to_offset(UtcOffset::UTC);
            return Self::from_unix_seconds(utc.unix_timestamp());
        }
        if let Ok(date) = time::Date::parse(trimmed, DATE_FORMAT) {
            return Some(Self(date.midnight()));
        }
        // Fractional seconds are truncated rather than rejected.
        let (whole, _) = trimmed.split_once('.')?;
        Self::parse(whole)
    }

    /// Returns the unix seconds for this timestamp.
    #[must_use]
    pub const fn unix_seconds(&self) -> i64 {
        self.0.assume_utc().unix_timestamp()
    }

    /// Returns the number of seconds elapsed since `earlier`.
    #[must_use]
    pub fn seconds_since(&self, earlier: &Self) -> f64 {
        (self.0 - earlier.0).as_seconds_f64()
    }

    /// Returns the canonical text form.
    #[must_use]
    pub fn to_canonical_string(&self) -> String {
        self.0.format(CANONICAL_FORMAT).unwrap_or_default()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_canonical_string())
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_canonical_string())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
