// crates/formbuilder-config/src/config.rs
// ============================================================================
// Module: Form Builder Configuration
// Description: Instance configuration loading and validation.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: formbuilder-core, formbuilder-store-sqlite, serde, toml, url
// ============================================================================

//! ## Overview
//! Instance configuration is loaded from a TOML file with strict size and
//! path limits. Every section has defaults so an empty file describes a
//! loopback-only instance reading `form.xlsx`. Invalid configuration fails
//! closed at startup; nothing is revalidated per request.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use formbuilder_core::AnalyticsOptions;
use formbuilder_core::DEFAULT_ELAPSED_THRESHOLD_SECS;
use formbuilder_core::FormSchema;
use formbuilder_core::MAX_SESSION_ID_BYTES;
use formbuilder_core::MIN_SESSION_ID_BYTES;
use formbuilder_store_sqlite::SqliteStoreConfig;
use formbuilder_store_sqlite::SqliteStoreMode;
use formbuilder_store_sqlite::SqliteSyncMode;
use formbuilder_store_sqlite::validate_table_name;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "formbuilder.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "FORMBUILDER_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum number of auth tokens.
const MAX_AUTH_TOKENS: usize = 64;
/// Maximum length of an auth token.
const MAX_AUTH_TOKEN_LENGTH: usize = 256;
/// Maximum accepted request or upload body.
const MAX_BODY_LIMIT_BYTES: usize = 256 * 1024 * 1024;
/// Maximum outbound request timeout.
const MAX_TIMEOUT_MS: u64 = 60_000;
/// Upload formats the server can decode.
const SUPPORTED_UPLOAD_EXTENSIONS: &[&str] = &["csv", "xlsx"];

// ============================================================================
// SECTION: Root Config
// ============================================================================

/// Form Builder instance configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormBuilderConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Form definition source.
    #[serde(default)]
    pub form: FormSourceConfig,
    /// Submission store settings.
    #[serde(default)]
    pub datastore: DatastoreConfig,
    /// Bulk upload settings.
    #[serde(default)]
    pub upload: UploadConfig,
    /// Enrichment and soft-check toggles.
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    /// Reminder email delivery; disabled when absent.
    #[serde(default)]
    pub email: Option<EmailConfig>,
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Dashboard and upload access tokens.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Dashboard views.
    #[serde(default)]
    pub dashboard: DashboardConfig,
    /// Audit log destination.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl FormBuilderConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.general.validate()?;
        self.form.validate()?;
        self.datastore.validate()?;
        self.upload.validate()?;
        self.analytics.validate()?;
        if let Some(email) = &self.email {
            email.validate()?;
        }
        self.server.validate()?;
        self.auth.validate()?;
        self.audit.validate()?;
        let bind = self.server.bind_addr()?;
        if self.auth.tokens.is_empty() && !bind.ip().is_loopback() {
            return Err(ConfigError::Invalid(
                "auth.tokens must be set when server.bind is not a loopback address".to_string(),
            ));
        }
        Ok(())
    }

    /// Validates references from this configuration into the form definition.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when a referenced field does not exist.
    pub fn validate_against(&self, form: &FormSchema) -> Result<(), ConfigError> {
        if let Some(field) = &self.dashboard.breakdown_field
            && form.field(field).is_none()
        {
            return Err(ConfigError::Invalid(format!(
                "dashboard.breakdown_field {field} is not a form field"
            )));
        }
        if let Some(email) = &self.email
            && form.field(&email.reminder_field).is_none()
        {
            return Err(ConfigError::Invalid(format!(
                "email.reminder_field {} is not a form field",
                email.reminder_field
            )));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Sections
// ============================================================================

/// General settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeneralConfig {
    /// Random bytes per generated session id.
    #[serde(default = "default_session_id_bytes")]
    pub session_id_bytes: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            session_id_bytes: default_session_id_bytes(),
        }
    }
}

impl GeneralConfig {
    /// Validates general settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_SESSION_ID_BYTES ..= MAX_SESSION_ID_BYTES).contains(&self.session_id_bytes) {
            return Err(ConfigError::Invalid(format!(
                "general.session_id_bytes must be between {MIN_SESSION_ID_BYTES} and \
                 {MAX_SESSION_ID_BYTES}"
            )));
        }
        Ok(())
    }
}

/// Form definition source.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FormSourceConfig {
    /// Path to a `.xlsx` workbook or `.toml` form document.
    #[serde(default = "default_form_path")]
    pub path: PathBuf,
    /// Table name override.
    #[serde(default)]
    pub table_name: Option<String>,
}

impl Default for FormSourceConfig {
    fn default() -> Self {
        Self {
            path: default_form_path(),
            table_name: None,
        }
    }
}

impl FormSourceConfig {
    /// Returns the table name: the override, or one derived from the file stem.
    #[must_use]
    pub fn table_name(&self) -> String {
        self.table_name.clone().unwrap_or_else(|| derive_table_name(&self.path))
    }

    /// Validates the form source.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("form.path", &self.path.to_string_lossy())?;
        let extension = self
            .path
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if extension != "xlsx" && extension != "toml" {
            return Err(ConfigError::Invalid("form.path must name a .xlsx or .toml file".to_string()));
        }
        validate_table_name(&self.table_name())
            .map_err(|err| ConfigError::Invalid(format!("form table name: {err}")))
    }
}

/// Derives a table name from a form file stem.
///
/// The stem is lowercased and every character outside `[a-z0-9_]` becomes `_`.
#[must_use]
pub fn derive_table_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy())
        .unwrap_or_default()
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch.to_ascii_lowercase() } else { '_' })
        .collect()
}

/// Datastore backend types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatastoreType {
    /// `SQLite` file store.
    #[default]
    Sqlite,
}

/// Submission store settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatastoreConfig {
    /// Backend type.
    #[serde(rename = "type", default)]
    pub store_type: DatastoreType,
    /// Database path.
    #[serde(default = "default_datastore_path")]
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl Default for DatastoreConfig {
    fn default() -> Self {
        Self {
            store_type: DatastoreType::default(),
            path: default_datastore_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

impl DatastoreConfig {
    /// Returns the `SQLite` store configuration.
    #[must_use]
    pub fn sqlite_config(&self) -> SqliteStoreConfig {
        SqliteStoreConfig {
            path: self.path.clone(),
            busy_timeout_ms: self.busy_timeout_ms,
            journal_mode: self.journal_mode,
            sync_mode: self.sync_mode,
        }
    }

    /// Validates store settings.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("datastore.path", &self.path.to_string_lossy())?;
        if self.busy_timeout_ms > MAX_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "datastore.busy_timeout_ms must be at most {MAX_TIMEOUT_MS}"
            )));
        }
        Ok(())
    }
}

/// Bulk upload settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UploadConfig {
    /// File extensions accepted by the upload route.
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
    /// Maximum upload size in bytes.
    #[serde(default = "default_upload_max_bytes")]
    pub max_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: default_allowed_extensions(),
            max_bytes: default_upload_max_bytes(),
        }
    }
}

impl UploadConfig {
    /// Returns the normalized extension of `filename` when it is allowed.
    #[must_use]
    pub fn allowed_extension(&self, filename: &str) -> Option<String> {
        let (stem, extension) = filename.rsplit_once('.')?;
        if stem.is_empty() {
            return None;
        }
        let extension = extension.to_ascii_lowercase();
        self.allowed_extensions
            .iter()
            .any(|allowed| normalize_extension(allowed) == extension)
            .then_some(extension)
    }

    /// Validates upload settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.allowed_extensions.is_empty() {
            return Err(ConfigError::Invalid("upload.allowed_extensions must not be empty".to_string()));
        }
        for extension in &self.allowed_extensions {
            let normalized = normalize_extension(extension);
            if !SUPPORTED_UPLOAD_EXTENSIONS.contains(&normalized.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "upload.allowed_extensions entry {extension} is not a supported format"
                )));
            }
        }
        validate_body_limit("upload.max_bytes", self.max_bytes)
    }
}

/// Lowercases an extension and strips a leading dot.
fn normalize_extension(extension: &str) -> String {
    extension.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// Enrichment and soft-check toggles.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalyticsConfig {
    /// Session metadata capture; enabled when present.
    #[serde(default)]
    pub sessiondata: Option<SessionDataConfig>,
    /// Honeypot check.
    #[serde(default)]
    pub l2: bool,
    /// Elapsed-time check.
    #[serde(default)]
    pub l3: bool,
    /// Minimum fill time for the elapsed-time check.
    #[serde(default = "default_elapsed_threshold_secs")]
    pub elapsed_threshold_secs: f64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            sessiondata: None,
            l2: false,
            l3: false,
            elapsed_threshold_secs: default_elapsed_threshold_secs(),
        }
    }
}

impl AnalyticsConfig {
    /// Returns the toggles consumed by the table schema and the orchestrator.
    #[must_use]
    pub const fn options(&self) -> AnalyticsOptions {
        AnalyticsOptions {
            session_data: self.sessiondata.is_some(),
            honeypot_check: self.l2,
            elapsed_time_check: self.l3,
        }
    }

    /// Validates analytics settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if !self.elapsed_threshold_secs.is_finite() || self.elapsed_threshold_secs < 0.0 {
            return Err(ConfigError::Invalid(
                "analytics.elapsed_threshold_secs must be a non-negative number".to_string(),
            ));
        }
        if let Some(sessiondata) = &self.sessiondata {
            sessiondata.validate()?;
        }
        Ok(())
    }
}

/// Session metadata settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionDataConfig {
    /// Geolocation API token; lookups are skipped when absent.
    #[serde(default)]
    pub ipinfo_token: Option<String>,
    /// Geolocation API base URL.
    #[serde(default = "default_ipinfo_base_url")]
    pub ipinfo_base_url: String,
    /// Geolocation request timeout.
    #[serde(default = "default_lookup_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for SessionDataConfig {
    fn default() -> Self {
        Self {
            ipinfo_token: None,
            ipinfo_base_url: default_ipinfo_base_url(),
            timeout_ms: default_lookup_timeout_ms(),
        }
    }
}

impl SessionDataConfig {
    /// Validates session metadata settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(token) = &self.ipinfo_token
            && token.trim().is_empty()
        {
            return Err(ConfigError::Invalid(
                "analytics.sessiondata.ipinfo_token must be non-empty when set".to_string(),
            ));
        }
        validate_http_url("analytics.sessiondata.ipinfo_base_url", &self.ipinfo_base_url)?;
        validate_timeout("analytics.sessiondata.timeout_ms", self.timeout_ms)
    }
}

/// Reminder email delivery settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmailConfig {
    /// Provider label used in diagnostics.
    pub provider_name: String,
    /// Message submission endpoint.
    pub api_url: String,
    /// Provider API key.
    pub api_key: String,
    /// Sender address.
    pub sender_address: String,
    /// Form field holding the recipient address.
    #[serde(default = "default_reminder_field")]
    pub reminder_field: String,
    /// Request timeout.
    #[serde(default = "default_email_timeout_ms")]
    pub timeout_ms: u64,
}

impl EmailConfig {
    /// Validates email settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.provider_name.trim().is_empty() {
            return Err(ConfigError::Invalid("email.provider_name must be non-empty".to_string()));
        }
        validate_http_url("email.api_url", &self.api_url)?;
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::Invalid("email.api_key must be non-empty".to_string()));
        }
        if !self.sender_address.contains('@') {
            return Err(ConfigError::Invalid("email.sender_address must be an address".to_string()));
        }
        if self.reminder_field.trim().is_empty() {
            return Err(ConfigError::Invalid("email.reminder_field must be non-empty".to_string()));
        }
        validate_timeout("email.timeout_ms", self.timeout_ms)
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum request body size for non-upload routes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ServerConfig {
    /// Parses the bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the address does not parse.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("server.bind {} is not an address", self.bind)))
    }

    /// Validates server settings.
    fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr()?;
        validate_body_limit("server.max_body_bytes", self.max_body_bytes)
    }
}

/// Access role granted by a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthRole {
    /// Dashboard, exports, and template download.
    Viewer,
    /// Viewer access plus bulk upload.
    Uploader,
}

/// A configured bearer token.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthTokenConfig {
    /// Token value.
    pub token: String,
    /// Granted role.
    #[serde(default = "default_role")]
    pub role: AuthRole,
}

/// Dashboard and upload access tokens.
///
/// No tokens means local-only access: only loopback peers are admitted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Configured tokens.
    #[serde(default)]
    pub tokens: Vec<AuthTokenConfig>,
}

impl AuthConfig {
    /// Validates token settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.tokens.len() > MAX_AUTH_TOKENS {
            return Err(ConfigError::Invalid("auth.tokens exceeds max entries".to_string()));
        }
        for entry in &self.tokens {
            let token = entry.token.as_str();
            if token.is_empty() || token.len() > MAX_AUTH_TOKEN_LENGTH {
                return Err(ConfigError::Invalid("auth token length out of range".to_string()));
            }
            if token.chars().any(char::is_whitespace) {
                return Err(ConfigError::Invalid("auth token must not contain whitespace".to_string()));
            }
        }
        Ok(())
    }
}

/// Dashboard views.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DashboardConfig {
    /// Field summarized in the category breakdown view.
    #[serde(default)]
    pub breakdown_field: Option<String>,
}

/// Audit log destination.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Whether audit events are emitted.
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    /// JSON lines file; stderr when absent.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            path: None,
        }
    }
}

impl AuditConfig {
    /// Validates audit settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            validate_path_string("audit.path", &path.to_string_lossy())?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default session id size.
const fn default_session_id_bytes() -> usize {
    MIN_SESSION_ID_BYTES
}

/// Default form document path.
fn default_form_path() -> PathBuf {
    PathBuf::from("form.xlsx")
}

/// Default database path.
fn default_datastore_path() -> PathBuf {
    PathBuf::from("formbuilder.sqlite")
}

/// Default `SQLite` busy timeout.
const fn default_busy_timeout_ms() -> u64 {
    5_000
}

/// Default upload extension allow-list.
fn default_allowed_extensions() -> Vec<String> {
    SUPPORTED_UPLOAD_EXTENSIONS.iter().map(|ext| (*ext).to_string()).collect()
}

/// Default upload size limit.
const fn default_upload_max_bytes() -> usize {
    10 * 1024 * 1024
}

/// Default elapsed-time threshold.
const fn default_elapsed_threshold_secs() -> f64 {
    DEFAULT_ELAPSED_THRESHOLD_SECS
}

/// Default geolocation endpoint.
fn default_ipinfo_base_url() -> String {
    "https://ipinfo.io".to_string()
}

/// Default geolocation timeout.
const fn default_lookup_timeout_ms() -> u64 {
    2_000
}

/// Default email timeout.
const fn default_email_timeout_ms() -> u64 {
    5_000
}

/// Default reminder address field.
fn default_reminder_field() -> String {
    "email".to_string()
}

/// Default bind address.
fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

/// Default request body limit.
const fn default_max_body_bytes() -> usize {
    1024 * 1024
}

/// Default token role.
const fn default_role() -> AuthRole {
    AuthRole::Viewer
}

/// Audit is on by default.
const fn default_audit_enabled() -> bool {
    true
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        if component.as_os_str().to_string_lossy().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Requires an absolute `http` or `https` URL.
fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value.trim())
        .map_err(|err| ConfigError::Invalid(format!("{field} is not a url: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::Invalid(format!("{field} must use http or https")));
    }
    Ok(())
}

/// Requires a timeout within `1 ..= MAX_TIMEOUT_MS`.
fn validate_timeout(field: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 || value > MAX_TIMEOUT_MS {
        return Err(ConfigError::Invalid(format!("{field} must be between 1 and {MAX_TIMEOUT_MS}")));
    }
    Ok(())
}

/// Requires a body limit within `1 ..= MAX_BODY_LIMIT_BYTES`.
fn validate_body_limit(field: &str, value: usize) -> Result<(), ConfigError> {
    if value == 0 || value > MAX_BODY_LIMIT_BYTES {
        return Err(ConfigError::Invalid(format!(
            "{field} must be between 1 and {MAX_BODY_LIMIT_BYTES}"
        )));
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_name_is_derived_from_stem() {
        assert_eq!(derive_table_name(Path::new("config/Job Application-2024.xlsx")), "job_application_2024");
    }

    #[test]
    fn validate_path_string_rejects_component_too_long() {
        let long_component = "a".repeat(MAX_PATH_COMPONENT_LENGTH + 1);
        let result = validate_path_string("test_path", &format!("./{long_component}"));
        assert!(result.is_err(), "component exceeding max length should fail");
    }

    #[test]
    fn validate_path_string_rejects_whitespace_only() {
        assert!(validate_path_string("test_path", "   ").is_err());
    }

    #[test]
    fn upload_extension_matching_ignores_case_and_dots() {
        let upload = UploadConfig {
            allowed_extensions: vec![".CSV".to_string()],
            max_bytes: 1,
        };
        assert_eq!(upload.allowed_extension("data.Csv"), Some("csv".to_string()));
        assert_eq!(upload.allowed_extension("data.xlsx"), None);
        assert_eq!(upload.allowed_extension(".csv"), None);
        assert_eq!(upload.allowed_extension("csv"), None);
    }

    #[test]
    fn analytics_options_follow_sections() {
        let analytics = AnalyticsConfig {
            sessiondata: Some(SessionDataConfig::default()),
            l2: true,
            ..AnalyticsConfig::default()
        };
        let options = analytics.options();
        assert!(options.session_data);
        assert!(options.honeypot_check);
        assert!(!options.elapsed_time_check);
    }
}
