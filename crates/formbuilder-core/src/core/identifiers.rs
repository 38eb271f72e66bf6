// crates/formbuilder-core/src/core/identifiers.rs
// ============================================================================
// Module: Session Identifiers
// Description: Random hex session identifiers used as submission primary keys.
// Purpose: Issue unguessable, fixed-width row keys for form sessions.
// Dependencies: hex, rand, serde
// ============================================================================

//! ## Overview
//! Every rendered form carries a fresh [`SessionId`] that becomes the `id`
//! column of the stored row. Identifiers are drawn from the operating system
//! RNG and hex encoded. Requests for fewer than [`MIN_SESSION_ID_BYTES`]
//! random bytes are raised to the minimum.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use rand::RngCore;
use rand::rngs::OsRng;
use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Minimum random bytes per identifier.
pub const MIN_SESSION_ID_BYTES: usize = 8;
/// Maximum random bytes per identifier.
pub const MAX_SESSION_ID_BYTES: usize = 64;

// ============================================================================
// SECTION: Session Identifier
// ============================================================================

/// Hex-encoded random session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generates an identifier from `bytes` random bytes, clamped to the allowed range.
    #[must_use]
    pub fn generate(bytes: usize) -> Self {
        let size = clamp_size(bytes);
        let mut buffer = vec![0_u8; size];
        OsRng.fill_bytes(&mut buffer);
        Self(hex::encode(buffer))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the identifier, returning the string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Returns the effective byte count for a requested size.
#[must_use]
pub const fn clamp_size(bytes: usize) -> usize {
    if bytes < MIN_SESSION_ID_BYTES {
        MIN_SESSION_ID_BYTES
    } else if bytes > MAX_SESSION_ID_BYTES {
        MAX_SESSION_ID_BYTES
    } else {
        bytes
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    #[test]
    fn short_sizes_are_raised_to_minimum() {
        let id = SessionId::generate(2);
        assert_eq!(id.as_str().len(), MIN_SESSION_ID_BYTES * 2);
    }

    #[test]
    fn identifiers_are_lowercase_hex() {
        let id = SessionId::generate(16);
        assert_eq!(id.as_str().len(), 32);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn identifiers_do_not_repeat() {
        let ids: BTreeSet<String> = (0..256).map(|_| SessionId::generate(8).into_string()).collect();
        assert_eq!(ids.len(), 256);
    }
}
