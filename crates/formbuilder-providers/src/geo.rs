// crates/formbuilder-providers/src/geo.rs
// ============================================================================
// Module: IP Geolocation Lookup
// Description: GeoLookup backed by an ipinfo-compatible HTTP API.
// Purpose: Resolve client addresses to coarse location details.
// Dependencies: formbuilder-core, reqwest, serde_json, url
// ============================================================================

//! ## Overview
//! [`IpInfoLookup`] issues `GET {base}/{ip}?token=...` and decodes the JSON
//! object into [`GeoDetails`]. Only syntactically valid, publicly routable
//! addresses are looked up; anything else fails fast without a request.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::IpAddr;

use formbuilder_core::GeoDetails;
use formbuilder_core::GeoLookup;
use formbuilder_core::LookupError;
use reqwest::blocking::Client;
use url::Url;

use crate::http::DEFAULT_MAX_RESPONSE_BYTES;
use crate::http::build_client;
use crate::http::parse_endpoint;
use crate::http::read_response_limited;
use crate::http::require_success;
use crate::http::transport_error;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for [`IpInfoLookup`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpInfoConfig {
    /// API base URL.
    pub base_url: String,
    /// API token.
    pub token: String,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum response size.
    pub max_response_bytes: usize,
}

impl IpInfoConfig {
    /// Builds a config with the default response limit.
    #[must_use]
    pub fn new(base_url: impl Into<String>, token: impl Into<String>, timeout_ms: u64) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            timeout_ms,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
        }
    }
}

// ============================================================================
// SECTION: Lookup
// ============================================================================

/// Geolocation lookup against an ipinfo-compatible API.
pub struct IpInfoLookup {
    /// API base URL.
    base_url: Url,
    /// API token.
    token: String,
    /// Maximum response size.
    max_response_bytes: usize,
    /// HTTP client.
    client: Client,
}

impl IpInfoLookup {
    /// Creates a lookup from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] when the endpoint or token is unusable or the
    /// client cannot be built.
    pub fn new(config: IpInfoConfig) -> Result<Self, LookupError> {
        let base_url = parse_endpoint(&config.base_url)?;
        if config.token.trim().is_empty() {
            return Err(LookupError::NotConfigured("ipinfo token is empty".to_string()));
        }
        Ok(Self {
            base_url,
            token: config.token,
            max_response_bytes: config.max_response_bytes,
            client: build_client(config.timeout_ms)?,
        })
    }

    /// Builds the request URL for `ip`.
    fn request_url(&self, ip: IpAddr) -> Result<Url, LookupError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| LookupError::NotConfigured("endpoint cannot carry a path".to_string()))?
            .pop_if_empty()
            .push(&ip.to_string());
        url.query_pairs_mut().append_pair("token", &self.token);
        Ok(url)
    }
}

impl GeoLookup for IpInfoLookup {
    fn lookup(&self, ip_address: &str) -> Result<GeoDetails, LookupError> {
        let ip: IpAddr = ip_address
            .trim()
            .parse()
            .map_err(|_| LookupError::Invalid("client address is not an ip".to_string()))?;
        if !is_public(ip) {
            return Err(LookupError::Invalid("client address is not publicly routable".to_string()));
        }
        let url = self.request_url(ip)?;
        let mut response = self.client.get(url).send().map_err(|err| transport_error(&err))?;
        require_success(&response)?;
        let body = read_response_limited(&mut response, self.max_response_bytes)?;
        serde_json::from_slice(&body)
            .map_err(|err| LookupError::Invalid(format!("geolocation payload: {err}")))
    }
}

/// Returns false for loopback, private, link-local, and unspecified addresses.
fn is_public(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            !(v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast())
        }
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            !(v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xfe00) == 0xfc00
                || (first & 0xffc0) == 0xfe80)
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions on known inputs.")]

    use super::*;

    #[test]
    fn private_addresses_are_not_looked_up() {
        assert!(!is_public("127.0.0.1".parse().unwrap()));
        assert!(!is_public("10.1.2.3".parse().unwrap()));
        assert!(!is_public("fe80::1".parse().unwrap()));
        assert!(!is_public("fd00::1".parse().unwrap()));
        assert!(is_public("203.0.113.7".parse().unwrap()));
    }

    #[test]
    fn request_url_appends_ip_and_token() {
        let lookup =
            IpInfoLookup::new(IpInfoConfig::new("https://ipinfo.example/", "t0k", 1_000)).unwrap();
        let url = lookup.request_url("203.0.113.7".parse().unwrap()).unwrap();
        assert_eq!(url.as_str(), "https://ipinfo.example/203.0.113.7?token=t0k");
    }

    #[test]
    fn empty_token_is_rejected() {
        let result = IpInfoLookup::new(IpInfoConfig::new("https://ipinfo.example", " ", 1_000));
        assert!(matches!(result, Err(LookupError::NotConfigured(_))));
    }
}
