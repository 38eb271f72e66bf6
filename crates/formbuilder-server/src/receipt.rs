// crates/formbuilder-server/src/receipt.rs
// ============================================================================
// Module: Submission Receipts
// Description: Single-use tokens linking a submission to its confirmation.
// Purpose: Let only the submitting client trigger the reminder email.
// Dependencies: formbuilder-core, subtle
// ============================================================================

//! ## Overview
//! `/submit` issues a receipt for the stored session id and carries it in
//! the redirect to `/thank-you`. The confirmation route redeems it once;
//! later requests for the same session id find no receipt and neither send
//! mail nor show the stored address. Receipts expire after a short TTL and
//! the book is bounded.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use formbuilder_core::SessionId;
use subtle::ConstantTimeEq;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Lifetime of an unredeemed receipt.
pub const RECEIPT_TTL: Duration = Duration::from_secs(10 * 60);
/// Maximum outstanding receipts.
pub const MAX_OUTSTANDING_RECEIPTS: usize = 4096;
/// Random bytes per receipt token.
const RECEIPT_TOKEN_BYTES: usize = 16;

// ============================================================================
// SECTION: Receipt Book
// ============================================================================

/// Outstanding receipt for one session id.
#[derive(Debug)]
struct Receipt {
    /// Hex token handed to the submitter.
    token: String,
    /// Issue time.
    issued_at: Instant,
}

/// Outstanding receipts keyed by session id.
#[derive(Debug)]
pub struct ReceiptBook {
    /// Receipts by session id.
    receipts: Mutex<HashMap<String, Receipt>>,
    /// Receipt lifetime.
    ttl: Duration,
}

impl Default for ReceiptBook {
    fn default() -> Self {
        Self::new(RECEIPT_TTL)
    }
}

impl ReceiptBook {
    /// Creates an empty book with the given lifetime.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self { receipts: Mutex::new(HashMap::new()), ttl }
    }

    /// Issues a receipt for `session_id`, replacing any earlier one.
    ///
    /// Returns `None` when the book is unavailable.
    pub fn issue(&self, session_id: &str) -> Option<String> {
        let now = Instant::now();
        let mut receipts = self.receipts.lock().ok()?;
        receipts.retain(|_, receipt| now.duration_since(receipt.issued_at) < self.ttl);
        if receipts.len() >= MAX_OUTSTANDING_RECEIPTS && !receipts.contains_key(session_id) {
            let oldest = receipts
                .iter()
                .min_by_key(|(_, receipt)| receipt.issued_at)
                .map(|(id, _)| id.clone());
            if let Some(oldest) = oldest {
                receipts.remove(&oldest);
            }
        }
        let token = SessionId::generate(RECEIPT_TOKEN_BYTES).into_string();
        receipts.insert(session_id.to_string(), Receipt { token: token.clone(), issued_at: now });
        Some(token)
    }

    /// Consumes the receipt for `session_id` when `token` matches and is fresh.
    pub fn redeem(&self, session_id: &str, token: &str) -> bool {
        let Ok(mut receipts) = self.receipts.lock() else {
            return false;
        };
        let Some(receipt) = receipts.get(session_id) else {
            return false;
        };
        let matches: bool = receipt.token.as_bytes().ct_eq(token.as_bytes()).into();
        if !matches {
            return false;
        }
        let fresh = receipt.issued_at.elapsed() < self.ttl;
        receipts.remove(session_id);
        fresh
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only output and panic-based assertions are permitted."
    )]

    use super::*;

    #[test]
    fn receipt_redeems_once() {
        let book = ReceiptBook::default();
        let token = book.issue("s1").unwrap();
        assert!(book.redeem("s1", &token));
        assert!(!book.redeem("s1", &token));
    }

    #[test]
    fn wrong_token_or_session_is_refused_and_kept() {
        let book = ReceiptBook::default();
        let token = book.issue("s1").unwrap();
        assert!(!book.redeem("s1", "guess"));
        assert!(!book.redeem("s2", &token));
        assert!(book.redeem("s1", &token));
    }

    #[test]
    fn reissue_replaces_earlier_receipt() {
        let book = ReceiptBook::default();
        let first = book.issue("s1").unwrap();
        let second = book.issue("s1").unwrap();
        assert!(!book.redeem("s1", &first));
        assert!(book.redeem("s1", &second));
    }

    #[test]
    fn expired_receipt_is_refused() {
        let book = ReceiptBook::new(Duration::ZERO);
        let token = book.issue("s1").unwrap();
        assert!(!book.redeem("s1", &token));
    }
}
