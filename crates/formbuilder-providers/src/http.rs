// crates/formbuilder-providers/src/http.rs
// ============================================================================
// Module: HTTP Client Helpers
// Description: Shared client construction and bounded response handling.
// Purpose: Keep outbound requests consistent across adapters.
// Dependencies: formbuilder-core, reqwest, url
// ============================================================================

//! ## Overview
//! Both adapters build their client through [`build_client`] and read bodies
//! through [`read_response_limited`], so timeouts, redirect policy, and size
//! limits are uniform.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Read;
use std::time::Duration;

use formbuilder_core::LookupError;
use reqwest::blocking::Client;
use reqwest::blocking::Response;
use reqwest::redirect::Policy;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// User agent for outbound requests.
pub const USER_AGENT: &str = "formbuilder/0.1";
/// Default maximum response body size.
pub const DEFAULT_MAX_RESPONSE_BYTES: usize = 64 * 1024;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds a blocking client with a total timeout and redirects disabled.
///
/// # Errors
///
/// Returns [`LookupError::Transport`] when the client cannot be created.
pub fn build_client(timeout_ms: u64) -> Result<Client, LookupError> {
    Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .user_agent(USER_AGENT)
        .redirect(Policy::none())
        .build()
        .map_err(|_| LookupError::Transport("http client build failed".to_string()))
}

/// Parses an endpoint, allowing only `http` and `https`.
///
/// # Errors
///
/// Returns [`LookupError::NotConfigured`] when the URL is unusable.
pub fn parse_endpoint(value: &str) -> Result<Url, LookupError> {
    let url = Url::parse(value.trim())
        .map_err(|err| LookupError::NotConfigured(format!("invalid endpoint: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(LookupError::NotConfigured("endpoint must use http or https".to_string()));
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(LookupError::NotConfigured("endpoint must not embed credentials".to_string()));
    }
    Ok(url)
}

/// Maps a transport failure without echoing URLs that may carry secrets.
pub(crate) fn transport_error(err: &reqwest::Error) -> LookupError {
    if err.is_timeout() {
        LookupError::Transport("request timed out".to_string())
    } else if err.is_connect() {
        LookupError::Transport("connection failed".to_string())
    } else {
        LookupError::Transport("request failed".to_string())
    }
}

/// Fails unless the response has a success status.
pub(crate) fn require_success(response: &Response) -> Result<(), LookupError> {
    let status = response.status();
    if status.is_success() { Ok(()) } else { Err(LookupError::Status(status.as_u16())) }
}

/// Reads a response body, failing when it exceeds `max_bytes`.
///
/// # Errors
///
/// Returns [`LookupError::Invalid`] when the body is too large or truncated.
pub fn read_response_limited(
    response: &mut Response,
    max_bytes: usize,
) -> Result<Vec<u8>, LookupError> {
    let expected_len = response.content_length();
    let max_bytes_u64 = u64::try_from(max_bytes)
        .map_err(|_| LookupError::Invalid("response size limit exceeds u64".to_string()))?;
    if let Some(expected) = expected_len
        && expected > max_bytes_u64
    {
        return Err(LookupError::Invalid("response exceeds size limit".to_string()));
    }
    let mut buf = Vec::new();
    response
        .take(max_bytes_u64.saturating_add(1))
        .read_to_end(&mut buf)
        .map_err(|_| LookupError::Transport("failed to read response".to_string()))?;
    if buf.len() > max_bytes {
        return Err(LookupError::Invalid("response exceeds size limit".to_string()));
    }
    if let Some(expected) = expected_len
        && u64::try_from(buf.len()).unwrap_or(u64::MAX) < expected
    {
        return Err(LookupError::Invalid("response body truncated".to_string()));
    }
    Ok(buf)
}
