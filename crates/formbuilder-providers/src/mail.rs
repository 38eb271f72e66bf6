// crates/formbuilder-providers/src/mail.rs
// ============================================================================
// Module: HTTP Mailer
// Description: Mailer backed by a transactional email HTTP API.
// Purpose: Deliver session reminder emails after a submission.
// Dependencies: formbuilder-core, reqwest, url
// ============================================================================

//! ## Overview
//! [`HttpMailer`] posts a url-encoded message (`from`, `to`, `subject`,
//! `text`) to the configured endpoint with HTTP basic auth (`api` / key), the
//! request shape used by Mailgun-style APIs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use formbuilder_core::LookupError;
use formbuilder_core::Mailer;
use formbuilder_core::ReminderEmail;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use url::Url;
use url::form_urlencoded;

use crate::http::build_client;
use crate::http::parse_endpoint;
use crate::http::require_success;
use crate::http::transport_error;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for [`HttpMailer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpMailerConfig {
    /// Provider label used in diagnostics.
    pub provider_name: String,
    /// Message submission endpoint.
    pub api_url: String,
    /// API key sent as the basic-auth password.
    pub api_key: String,
    /// Sender address.
    pub sender_address: String,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
}

// ============================================================================
// SECTION: Mailer
// ============================================================================

/// Reminder delivery over HTTP.
pub struct HttpMailer {
    /// Provider label.
    provider_name: String,
    /// Message endpoint.
    api_url: Url,
    /// API key.
    api_key: String,
    /// Sender address.
    sender_address: String,
    /// HTTP client.
    client: Client,
}

impl HttpMailer {
    /// Creates a mailer from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError`] when the endpoint is unusable or the client
    /// cannot be built.
    pub fn new(config: HttpMailerConfig) -> Result<Self, LookupError> {
        Ok(Self {
            api_url: parse_endpoint(&config.api_url)?,
            client: build_client(config.timeout_ms)?,
            provider_name: config.provider_name,
            api_key: config.api_key,
            sender_address: config.sender_address,
        })
    }

    /// Returns the provider label.
    #[must_use]
    pub fn provider_name(&self) -> &str {
        &self.provider_name
    }
}

impl Mailer for HttpMailer {
    fn send(&self, email: &ReminderEmail) -> Result<(), LookupError> {
        if !email.to.contains('@') {
            return Err(LookupError::Invalid("recipient is not an email address".to_string()));
        }
        let body = form_urlencoded::Serializer::new(String::new())
            .append_pair("from", &self.sender_address)
            .append_pair("to", &email.to)
            .append_pair("subject", &email.subject)
            .append_pair("text", &email.body)
            .finish();
        let response = self
            .client
            .post(self.api_url.clone())
            .basic_auth("api", Some(&self.api_key))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .map_err(|err| transport_error(&err))?;
        require_success(&response)
    }
}
