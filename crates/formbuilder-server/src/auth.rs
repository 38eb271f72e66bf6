// crates/formbuilder-server/src/auth.rs
// ============================================================================
// Module: Operator Access Control
// Description: Local-only and bearer-token gating for operator routes.
// Purpose: Fail-closed authentication with role checks for uploads.
// Dependencies: formbuilder-config, hex, sha2, subtle
// ============================================================================

//! ## Overview
//! Respondent routes are public. Operator routes (`/dashboard`, `/upload`,
//! `/generate_data_upload_template`) pass through [`AccessPolicy`]:
//! - With no configured tokens the server is local-only and admits loopback
//!   peers with the uploader role.
//! - Otherwise a `Bearer` token is required. Tokens compare in constant time
//!   and only a SHA-256 fingerprint ever reaches the audit log.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::IpAddr;

use formbuilder_config::AuthConfig;
use formbuilder_config::AuthRole;
use sha2::Digest;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum accepted `Authorization` header length.
const MAX_AUTH_HEADER_BYTES: usize = 8 * 1024;

// ============================================================================
// SECTION: Request Context
// ============================================================================

/// Per-request inputs for access decisions.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Peer address of the TCP connection.
    pub peer_ip: Option<IpAddr>,
    /// Raw `Authorization` header.
    pub auth_header: Option<String>,
}

impl RequestContext {
    /// Builds a context for an HTTP request.
    #[must_use]
    pub const fn http(peer_ip: Option<IpAddr>, auth_header: Option<String>) -> Self {
        Self {
            peer_ip,
            auth_header,
        }
    }

    /// Returns true when the peer is loopback.
    #[must_use]
    pub fn peer_is_loopback(&self) -> bool {
        self.peer_ip.is_some_and(|ip| ip.is_loopback())
    }
}

// ============================================================================
// SECTION: Decisions
// ============================================================================

/// Access level required by a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    /// Read dashboard data and exports.
    View,
    /// Bulk-import rows.
    Upload,
}

impl Permission {
    /// Returns a stable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Upload => "upload",
        }
    }
}

/// Authenticated operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operator {
    /// Granted role.
    pub role: AuthRole,
    /// SHA-256 fingerprint of the presented token; `None` for loopback access.
    pub token_fingerprint: Option<String>,
}

/// Access failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// Missing or invalid credentials.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
    /// Credentials lack the required role.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Access policy derived from `[auth]`.
pub struct AccessPolicy {
    /// Configured tokens with their roles; empty means local-only.
    tokens: Vec<(String, AuthRole)>,
}

impl AccessPolicy {
    /// Builds a policy from configuration.
    #[must_use]
    pub fn from_config(config: &AuthConfig) -> Self {
        Self {
            tokens: config.tokens.iter().map(|entry| (entry.token.clone(), entry.role)).collect(),
        }
    }

    /// Returns true when no tokens are configured.
    #[must_use]
    pub fn is_local_only(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Authenticates the request and checks the role.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when access is denied.
    pub fn authorize(
        &self,
        ctx: &RequestContext,
        permission: Permission,
    ) -> Result<Operator, AuthError> {
        let operator = if self.is_local_only() {
            authorize_local_only(ctx)?
        } else {
            self.authorize_bearer(ctx)?
        };
        if !role_allows(operator.role, permission) {
            return Err(AuthError::Unauthorized(format!(
                "role does not grant {}",
                permission.label()
            )));
        }
        Ok(operator)
    }

    /// Matches the presented bearer token against every configured token.
    fn authorize_bearer(&self, ctx: &RequestContext) -> Result<Operator, AuthError> {
        let token = parse_bearer_token(ctx.auth_header.as_deref())?;
        let mut matched = None;
        for (candidate, role) in &self.tokens {
            if bool::from(candidate.as_bytes().ct_eq(token.as_bytes())) {
                matched = Some(*role);
            }
        }
        let role =
            matched.ok_or_else(|| AuthError::Unauthenticated("invalid bearer token".to_string()))?;
        Ok(Operator {
            role,
            token_fingerprint: Some(token_fingerprint(&token)),
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Admits loopback peers only.
fn authorize_local_only(ctx: &RequestContext) -> Result<Operator, AuthError> {
    if ctx.peer_is_loopback() {
        Ok(Operator {
            role: AuthRole::Uploader,
            token_fingerprint: None,
        })
    } else {
        Err(AuthError::Unauthenticated("local-only mode requires loopback access".to_string()))
    }
}

/// Uploaders may also view.
const fn role_allows(role: AuthRole, permission: Permission) -> bool {
    match permission {
        Permission::View => true,
        Permission::Upload => matches!(role, AuthRole::Uploader),
    }
}

/// Extracts the token from a `Bearer <token>` header.
fn parse_bearer_token(auth_header: Option<&str>) -> Result<String, AuthError> {
    let header = auth_header
        .ok_or_else(|| AuthError::Unauthenticated("missing authorization".to_string()))?;
    if header.len() > MAX_AUTH_HEADER_BYTES {
        return Err(AuthError::Unauthenticated("authorization header too large".to_string()));
    }
    let mut parts = header.trim().splitn(2, ' ');
    let scheme = parts.next().unwrap_or_default();
    let token = parts.next().unwrap_or_default().trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return Err(AuthError::Unauthenticated("invalid authorization header".to_string()));
    }
    Ok(token.to_string())
}

/// Hex SHA-256 of a token.
fn token_fingerprint(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions on known inputs.")]

    use formbuilder_config::AuthTokenConfig;

    use super::*;

    fn policy(tokens: &[(&str, AuthRole)]) -> AccessPolicy {
        AccessPolicy::from_config(&AuthConfig {
            tokens: tokens
                .iter()
                .map(|(token, role)| AuthTokenConfig {
                    token: (*token).to_string(),
                    role: *role,
                })
                .collect(),
        })
    }

    fn remote(header: Option<&str>) -> RequestContext {
        RequestContext::http(Some("198.51.100.4".parse().unwrap()), header.map(str::to_string))
    }

    #[test]
    fn local_only_admits_loopback_and_rejects_remote() {
        let policy = policy(&[]);
        let local = RequestContext::http(Some("127.0.0.1".parse().unwrap()), None);
        assert_eq!(policy.authorize(&local, Permission::Upload).unwrap().role, AuthRole::Uploader);
        assert!(matches!(
            policy.authorize(&remote(None), Permission::View),
            Err(AuthError::Unauthenticated(_))
        ));
    }

    #[test]
    fn bearer_tokens_carry_roles() {
        let policy = policy(&[("view-token", AuthRole::Viewer), ("up-token", AuthRole::Uploader)]);
        let viewer = remote(Some("Bearer view-token"));
        let operator = policy.authorize(&viewer, Permission::View).unwrap();
        assert_eq!(operator.token_fingerprint, Some(token_fingerprint("view-token")));
        assert!(matches!(
            policy.authorize(&viewer, Permission::Upload),
            Err(AuthError::Unauthorized(_))
        ));
        assert!(policy.authorize(&remote(Some("bearer up-token")), Permission::Upload).is_ok());
    }

    #[test]
    fn configured_tokens_apply_to_loopback_too() {
        let policy = policy(&[("t", AuthRole::Viewer)]);
        let local = RequestContext::http(Some("127.0.0.1".parse().unwrap()), None);
        assert!(policy.authorize(&local, Permission::View).is_err());
    }

    #[test]
    fn malformed_headers_are_rejected() {
        assert!(parse_bearer_token(Some("Basic abc")).is_err());
        assert!(parse_bearer_token(Some("Bearer   ")).is_err());
        assert!(parse_bearer_token(Some(&"x".repeat(MAX_AUTH_HEADER_BYTES + 1))).is_err());
        assert_eq!(parse_bearer_token(Some("Bearer abc")).unwrap(), "abc");
    }
}
