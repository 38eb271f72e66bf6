// crates/formbuilder-server/src/server.rs
// ============================================================================
// Module: Form Server
// Description: axum routes for respondents and operators.
// Purpose: Serve the form, accept submissions, and expose dashboard tooling.
// Dependencies: axum, formbuilder-config, formbuilder-core, formbuilder-providers,
//               formbuilder-store-sqlite, serde_json, tokio, url
// ============================================================================

//! ## Overview
//! [`FormServer`] assembles every component from a [`FormBuilderConfig`]:
//! the form schema, the synchronized SQLite datastore, the optional
//! geolocation and mail adapters, and the access policy. Routes:
//!
//! | Route | Access | Purpose |
//! |-------|--------|---------|
//! | `GET /` | public | render the form with a fresh session id |
//! | `POST /submit` | public | store a submission, redirect to `/thank-you` |
//! | `GET /thank-you` | public | confirmation; reminder email on a valid receipt |
//! | `POST /load_form_data` | public | fetch a stored record by session id |
//! | `GET, POST /dashboard` | view | tables and summaries, file exports |
//! | `GET, POST /upload` | upload | bulk import from csv/xlsx |
//! | `GET /generate_data_upload_template` | upload | xlsx import template |
//!
//! Store and adapter calls are blocking and run off the async workers. Every
//! request emits one `http_request` audit event.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::ConnectInfo;
use axum::extract::DefaultBodyLimit;
use axum::extract::Multipart;
use axum::extract::Query;
use axum::extract::Request;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::StatusCode;
use axum::http::header;
use axum::middleware::Next;
use axum::middleware::from_fn_with_state;
use axum::response::Html;
use axum::response::IntoResponse;
use axum::response::Redirect;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use formbuilder_config::FormBuilderConfig;
use formbuilder_config::UploadConfig;
use formbuilder_config::load_form;
use formbuilder_core::AuditEvent;
use formbuilder_core::AuditSink;
use formbuilder_core::Datastore;
use formbuilder_core::Element;
use formbuilder_core::FormRenderer;
use formbuilder_core::FormSchema;
use formbuilder_core::GeoLookup;
use formbuilder_core::Mailer;
use formbuilder_core::RawSubmission;
use formbuilder_core::ReminderEmail;
use formbuilder_core::SessionId;
use formbuilder_core::StoreError;
use formbuilder_core::SubmissionError;
use formbuilder_core::SubmissionHandler;
use formbuilder_core::SubmissionPolicy;
use formbuilder_core::Timestamp;
use formbuilder_providers::HttpMailer;
use formbuilder_providers::HttpMailerConfig;
use formbuilder_providers::IpInfoConfig;
use formbuilder_providers::IpInfoLookup;
use formbuilder_store_sqlite::SqliteDatastore;
use serde::Deserialize;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;
use url::form_urlencoded;

use crate::auth::AccessPolicy;
use crate::auth::AuthError;
use crate::auth::Permission;
use crate::auth::RequestContext;
use crate::dashboard::load_dashboard;
use crate::export::ExportError;
use crate::export::ExportFormat;
use crate::export::XLSX_CONTENT_TYPE;
use crate::export::export_table;
use crate::pages;
use crate::receipt::ReceiptBook;
use crate::upload::UploadError;
use crate::upload::decode_upload;
use crate::upload::upload_template;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Header consulted for the original client address behind a proxy.
const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
/// Multipart framing allowance on top of the upload size limit.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;
/// Template download name.
const TEMPLATE_FILENAME: &str = "data_upload_template.xlsx";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Server construction and transport errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration is invalid.
    #[error("config error: {0}")]
    Config(String),
    /// A component failed to initialize.
    #[error("init error: {0}")]
    Init(String),
    /// The listener failed.
    #[error("transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Server
// ============================================================================

/// HTTP server for one form.
pub struct FormServer {
    /// Listen address.
    bind: SocketAddr,
    /// Handler state.
    state: ServerState,
}

/// Shared state for route handlers.
struct ServerState {
    /// Pages rendered once at startup.
    pages: Vec<Element>,
    /// Datastore for reads and bulk imports.
    datastore: Arc<dyn Datastore>,
    /// Submission pipeline.
    submissions: SubmissionHandler,
    /// Form schema, for the upload template.
    schema: Arc<FormSchema>,
    /// Reminder mail adapter with the record field holding the recipient.
    mailer: Option<(Arc<dyn Mailer>, String)>,
    /// Single-use receipts issued by `/submit`.
    receipts: ReceiptBook,
    /// Operator access policy.
    access: AccessPolicy,
    /// Upload limits.
    upload: UploadConfig,
    /// Field for the dashboard breakdown view.
    breakdown_field: Option<String>,
    /// Random bytes per generated session id.
    session_id_bytes: usize,
    /// Maximum request body size outside uploads.
    max_body_bytes: usize,
    /// Diagnostics sink.
    audit: Arc<dyn AuditSink>,
}

impl FormServer {
    /// Builds a server from validated configuration.
    ///
    /// Loads the form, opens and synchronizes the datastore, and builds the
    /// configured adapters. Call from a blocking context.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when configuration, schema sync, or adapter
    /// construction fails.
    pub fn from_config(
        config: &FormBuilderConfig,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, ServerError> {
        config.validate().map_err(|err| ServerError::Config(err.to_string()))?;
        let schema = load_form_schema(config)?;
        let datastore = open_datastore(config, &schema, Arc::clone(&audit))?;
        let report = datastore.sync_schema().map_err(|err| ServerError::Init(err.to_string()))?;
        audit.record(
            &AuditEvent::info("schema_synced", "datastore schema synchronized")
                .with_field("table", datastore.table_schema().name())
                .with_field("created", report.created)
                .with_field("added_columns", report.added_columns.len()),
        );
        let geo = build_geo_lookup(config)?;
        let mailer = build_mailer(config)?;
        let server = Self::assemble(config, schema, Arc::new(datastore), geo, audit)?;
        Ok(match mailer {
            Some((mailer, field)) => server.with_mailer(mailer, field),
            None => server,
        })
    }

    /// Builds a server around an already synchronized datastore.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Config`] when the bind address is invalid.
    pub fn assemble(
        config: &FormBuilderConfig,
        schema: FormSchema,
        datastore: Arc<dyn Datastore>,
        geo: Option<Arc<dyn GeoLookup>>,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, ServerError> {
        let bind = config.server.bind_addr().map_err(|err| ServerError::Config(err.to_string()))?;
        let schema = Arc::new(schema);
        let pages = FormRenderer::new(Arc::clone(&audit)).render_pages(&schema);
        let policy = SubmissionPolicy {
            analytics: config.analytics.options(),
            elapsed_threshold_secs: config.analytics.elapsed_threshold_secs,
            ..SubmissionPolicy::default()
        };
        let submissions = SubmissionHandler::new(
            Arc::clone(&schema),
            Arc::clone(&datastore),
            geo,
            policy,
            Arc::clone(&audit),
        );
        let access = AccessPolicy::from_config(&config.auth);
        if access.is_local_only() {
            audit.record(&AuditEvent::warn(
                "local_only_mode",
                "no auth tokens configured; operator routes admit loopback peers only",
            ));
        }
        Ok(Self {
            bind,
            state: ServerState {
                pages,
                datastore,
                submissions,
                schema,
                mailer: None,
                receipts: ReceiptBook::default(),
                access,
                upload: config.upload.clone(),
                breakdown_field: config.dashboard.breakdown_field.clone(),
                session_id_bytes: config.general.session_id_bytes,
                max_body_bytes: config.server.max_body_bytes,
                audit,
            },
        })
    }

    /// Enables reminder emails addressed to the value of `reminder_field`.
    #[must_use]
    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>, reminder_field: impl Into<String>) -> Self {
        self.state.mailer = Some((mailer, reminder_field.into()));
        self
    }

    /// Returns the configured listen address.
    #[must_use]
    pub const fn bind_addr(&self) -> SocketAddr {
        self.bind
    }

    /// Builds the route table.
    #[must_use]
    pub fn router(self) -> Router {
        let upload_limit = self.state.upload.max_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES);
        let body_limit = self.state.max_body_bytes;
        let state = Arc::new(self.state);
        Router::new()
            .route("/", get(form_view))
            .route("/submit", post(submit))
            .route("/thank-you", get(thank_you))
            .route("/load_form_data", post(load_form_data))
            .route("/dashboard", get(dashboard_view).post(dashboard_export))
            .route(
                "/upload",
                get(upload_view).post(upload_file).layer(DefaultBodyLimit::max(upload_limit)),
            )
            .route("/generate_data_upload_template", get(upload_template_download))
            .layer(DefaultBodyLimit::max(body_limit))
            .layer(from_fn_with_state(Arc::clone(&state), audit_requests))
            .with_state(state)
    }

    /// Binds the configured address and serves until the process exits.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Transport`] when binding or serving fails.
    pub async fn serve(self) -> Result<(), ServerError> {
        let listener = tokio::net::TcpListener::bind(self.bind)
            .await
            .map_err(|_| ServerError::Transport("http bind failed".to_string()))?;
        self.serve_on(listener, std::future::pending()).await
    }

    /// Serves on `listener` until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Transport`] when serving fails.
    pub async fn serve_on<F>(
        self,
        listener: tokio::net::TcpListener,
        shutdown: F,
    ) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.router();
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|_| ServerError::Transport("http server failed".to_string()))
    }
}

// ============================================================================
// SECTION: Bootstrap
// ============================================================================

/// Loads and cross-checks the configured form.
///
/// # Errors
///
/// Returns [`ServerError::Config`] when the form cannot be read or the
/// instance config references unknown fields.
pub fn load_form_schema(config: &FormBuilderConfig) -> Result<FormSchema, ServerError> {
    let schema =
        load_form(&config.form.path).map_err(|err| ServerError::Config(err.to_string()))?;
    config.validate_against(&schema).map_err(|err| ServerError::Config(err.to_string()))?;
    Ok(schema)
}

/// Opens the configured datastore without synchronizing it.
///
/// # Errors
///
/// Returns [`ServerError::Init`] when the store cannot be opened.
pub fn open_datastore(
    config: &FormBuilderConfig,
    schema: &FormSchema,
    audit: Arc<dyn AuditSink>,
) -> Result<SqliteDatastore, ServerError> {
    let table = schema.table_schema(&config.form.table_name(), config.analytics.options());
    SqliteDatastore::new(config.datastore.sqlite_config(), table, audit)
        .map(|store| store.with_id_bytes(config.general.session_id_bytes))
        .map_err(|err| ServerError::Init(err.to_string()))
}

/// Builds the geolocation adapter when a token is configured.
fn build_geo_lookup(config: &FormBuilderConfig) -> Result<Option<Arc<dyn GeoLookup>>, ServerError> {
    let Some(session) = &config.analytics.sessiondata else {
        return Ok(None);
    };
    let Some(token) = &session.ipinfo_token else {
        return Ok(None);
    };
    let lookup = IpInfoLookup::new(IpInfoConfig::new(
        session.ipinfo_base_url.as_str(),
        token.as_str(),
        session.timeout_ms,
    ))
    .map_err(|err| ServerError::Init(err.to_string()))?;
    Ok(Some(Arc::new(lookup)))
}

/// Builds the mail adapter when `[email]` is present.
fn build_mailer(
    config: &FormBuilderConfig,
) -> Result<Option<(Arc<dyn Mailer>, String)>, ServerError> {
    let Some(email) = &config.email else {
        return Ok(None);
    };
    let mailer = HttpMailer::new(HttpMailerConfig {
        provider_name: email.provider_name.clone(),
        api_url: email.api_url.clone(),
        api_key: email.api_key.clone(),
        sender_address: email.sender_address.clone(),
        timeout_ms: email.timeout_ms,
    })
    .map_err(|err| ServerError::Init(err.to_string()))?;
    Ok(Some((Arc::new(mailer), email.reminder_field.clone())))
}

// ============================================================================
// SECTION: Respondent Routes
// ============================================================================

/// Renders the form with a fresh session id.
async fn form_view(State(state): State<Arc<ServerState>>) -> Response {
    let session_id = SessionId::generate(state.session_id_bytes);
    Html(pages::form_page(&state.pages, session_id.as_str(), &Timestamp::now_utc())).into_response()
}

/// Stores a url-encoded submission.
async fn submit(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let raw = RawSubmission {
        form: form_urlencoded::parse(&body).into_owned().collect(),
        user_agent: header_text(&headers, header::USER_AGENT.as_str()),
        client_ip: Some(client_ip(&headers, peer)),
        received_at: Timestamp::now_utc(),
    };
    match run_blocking(|| state.submissions.handle_submission(&raw)) {
        Ok(record) => {
            let id = record.id().unwrap_or_default();
            let mut query = form_urlencoded::Serializer::new(String::new());
            query.append_pair("session_id", id);
            if let Some(receipt) = state.receipts.issue(id) {
                query.append_pair("receipt", &receipt);
            }
            Redirect::to(&format!("/thank-you?{}", query.finish())).into_response()
        }
        Err(SubmissionError::MissingSessionId) => {
            error_json(StatusCode::BAD_REQUEST, "missing session id")
        }
        Err(SubmissionError::Store(err)) => store_failure(&state, "submit", &err),
    }
}

/// Query string of the confirmation page.
#[derive(Debug, Deserialize)]
struct ThankYouQuery {
    /// Session id of the stored submission.
    session_id: Option<String>,
    /// Single-use receipt issued by `/submit`.
    receipt: Option<String>,
}

/// Confirms a submission and sends the optional reminder.
async fn thank_you(
    State(state): State<Arc<ServerState>>,
    Query(query): Query<ThankYouQuery>,
) -> Response {
    let Some(session_id) =
        query.session_id.as_deref().map(str::trim).filter(|id| !id.is_empty())
    else {
        return Html(pages::thank_you_page(
            None,
            "This page is shown after a form is submitted. Contact the team for support if you \
             reached it in error.",
        ))
        .into_response();
    };
    let redeemed = query
        .receipt
        .as_deref()
        .is_some_and(|receipt| state.receipts.redeem(session_id, receipt));
    if !redeemed {
        return Html(pages::thank_you_page(
            Some(session_id),
            "Thank you for your response. Copy the session code below to restore the session if \
             needed.",
        ))
        .into_response();
    }
    let message = run_blocking(|| send_reminder(&state, session_id));
    Html(pages::thank_you_page(Some(session_id), &message)).into_response()
}

/// Sends the reminder email when possible and returns the page message.
fn send_reminder(state: &ServerState, session_id: &str) -> String {
    let no_address = "Thank you for your response. No email address is on file for this \
                      submission, so the session code could not be sent. Copy the session code \
                      below; it will not be shown again."
        .to_string();
    let Some((mailer, field)) = &state.mailer else {
        return no_address;
    };
    let address = match state.datastore.query(Some(session_id)) {
        Ok(table) => table
            .value(0, field)
            .and_then(|value| value.as_text().map(str::trim).map(str::to_string))
            .filter(|address| !address.is_empty()),
        Err(err) => {
            state.audit.record(
                &AuditEvent::warn("reminder_lookup_failed", err.to_string())
                    .with_field("id", session_id),
            );
            None
        }
    };
    let Some(address) = address else {
        return no_address;
    };
    match mailer.send(&ReminderEmail::submission_reminder(address.as_str(), session_id)) {
        Ok(()) => {
            state.audit.record(
                &AuditEvent::info("reminder_email_sent", "session reminder sent")
                    .with_field("id", session_id),
            );
            format!(
                "Thank you for your response. The session code of this submission was sent to \
                 '{address}'. Use it to restore the session if needed. The code is also shown \
                 below."
            )
        }
        Err(err) => {
            state.audit.record(
                &AuditEvent::warn("reminder_email_failed", err.to_string())
                    .with_field("id", session_id),
            );
            "Thank you for your response. The reminder email could not be sent. Copy the session \
             code below; it will not be shown again."
                .to_string()
        }
    }
}

/// Returns the stored record for a session id.
async fn load_form_data(State(state): State<Arc<ServerState>>, body: Bytes) -> Response {
    let session_id = serde_json::from_slice::<Value>(&body)
        .ok()
        .and_then(|payload| payload.get("session_id").and_then(Value::as_str).map(str::to_string))
        .filter(|id| !id.trim().is_empty());
    let Some(session_id) = session_id else {
        return error_json(StatusCode::BAD_REQUEST, "No session code provided.");
    };
    match run_blocking(|| state.datastore.query(Some(session_id.trim()))) {
        Ok(table) => match table.record(0) {
            Some(record) => Json(record.to_json()).into_response(),
            None => error_json(StatusCode::NOT_FOUND, "Session code not found."),
        },
        Err(err) => store_failure(&state, "load_form_data", &err),
    }
}

// ============================================================================
// SECTION: Operator Routes
// ============================================================================

/// Renders the dashboard tables.
async fn dashboard_view(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    if let Err(denied) = authorize(&state, peer, &headers, Permission::View) {
        return denied;
    }
    let view = run_blocking(|| {
        load_dashboard(state.datastore.as_ref(), state.breakdown_field.as_deref())
    });
    match view {
        Ok(view) => Html(pages::dashboard_page(&view)).into_response(),
        Err(err) => store_failure(&state, "dashboard", &err),
    }
}

/// Export request body.
#[derive(Debug, Deserialize)]
struct ExportRequest {
    /// Requested format name.
    format: Option<String>,
}

/// Downloads every stored row in the requested format.
async fn dashboard_export(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(denied) = authorize(&state, peer, &headers, Permission::View) {
        return denied;
    }
    let Ok(request) = serde_json::from_slice::<ExportRequest>(&body) else {
        return error_json(StatusCode::BAD_REQUEST, "invalid export request");
    };
    let Some(format_name) = request.format else {
        return error_json(StatusCode::BAD_REQUEST, "missing format");
    };
    let format = match ExportFormat::parse(&format_name) {
        Ok(format) => format,
        Err(err) => return error_json(StatusCode::BAD_REQUEST, &err.to_string()),
    };
    let table = match run_blocking(|| state.datastore.query(None)) {
        Ok(table) => table,
        Err(err) => return store_failure(&state, "dashboard_export", &err),
    };
    match export_table(&table, format) {
        Ok(file) => attachment(file.content_type, file.filename, file.bytes),
        Err(err) => export_failure(&state, &err),
    }
}

/// Renders the upload page.
async fn upload_view(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    if let Err(denied) = authorize(&state, peer, &headers, Permission::Upload) {
        return denied;
    }
    Html(pages::upload_page(&state.upload.allowed_extensions)).into_response()
}

/// Bulk-imports the multipart `file` field.
async fn upload_file(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    if let Err(denied) = authorize(&state, peer, &headers, Permission::Upload) {
        return denied;
    }
    let mut upload = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some("file") {
                    continue;
                }
                let filename = field.file_name().unwrap_or_default().to_string();
                match field.bytes().await {
                    Ok(bytes) => {
                        upload = Some((filename, bytes));
                        break;
                    }
                    Err(err) => return error_json(err.status(), &err.body_text()),
                }
            }
            Ok(None) => break,
            Err(err) => return error_json(err.status(), &err.body_text()),
        }
    }
    let Some((filename, bytes)) = upload else {
        return error_json(StatusCode::BAD_REQUEST, "No file part");
    };
    if filename.trim().is_empty() {
        return error_json(StatusCode::BAD_REQUEST, "No selected file");
    }
    let table = match decode_upload(&filename, &bytes, &state.upload) {
        Ok(table) => table,
        Err(err) => {
            let status = match err {
                UploadError::TooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
                UploadError::UnsupportedFormat(_) | UploadError::Decode(_) => {
                    StatusCode::BAD_REQUEST
                }
            };
            return error_json(status, &err.to_string());
        }
    };
    match run_blocking(|| state.datastore.upsert_bulk(&table)) {
        Ok(report) => {
            state.audit.record(
                &AuditEvent::info("upload_completed", "bulk upload stored")
                    .with_field("filename", &filename)
                    .with_field("rows", report.rows),
            );
            Json(json!({
                "message": "File uploaded successfully",
                "rows": report.rows,
                "generated_ids": report.generated_ids,
                "generated_timestamp": report.generated_timestamp,
                "ignored_columns": report.ignored_columns,
            }))
            .into_response()
        }
        Err(err) => store_failure(&state, "upload", &err),
    }
}

/// Downloads the bulk import template.
async fn upload_template_download(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    if let Err(denied) = authorize(&state, peer, &headers, Permission::Upload) {
        return denied;
    }
    match upload_template(&state.schema) {
        Ok(bytes) => attachment(XLSX_CONTENT_TYPE, TEMPLATE_FILENAME, bytes),
        Err(err) => export_failure(&state, &err),
    }
}

// ============================================================================
// SECTION: Middleware
// ============================================================================

/// Records one `http_request` event per request.
async fn audit_requests(
    State(state): State<Arc<ServerState>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let response = next.run(request).await;
    state.audit.record(
        &AuditEvent::info("http_request", "request handled")
            .with_field("method", method)
            .with_field("path", path)
            .with_field("status", response.status().as_u16())
            .with_field("peer", peer.ip()),
    );
    response
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Runs blocking work, stepping off the async worker on multi-thread runtimes.
fn run_blocking<T>(work: impl FnOnce() -> T) -> T {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == tokio::runtime::RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(work)
        }
        _ => work(),
    }
}

/// Applies the access policy and records the decision.
fn authorize(
    state: &ServerState,
    peer: SocketAddr,
    headers: &HeaderMap,
    permission: Permission,
) -> Result<(), Response> {
    let ctx = RequestContext::http(
        Some(peer.ip()),
        header_text(headers, header::AUTHORIZATION.as_str()),
    );
    match state.access.authorize(&ctx, permission) {
        Ok(operator) => {
            let mut event = AuditEvent::info("operator_access", "allow")
                .with_field("permission", permission.label())
                .with_field("peer", peer.ip());
            if let Some(fingerprint) = operator.token_fingerprint {
                event = event.with_field("token_fingerprint", fingerprint);
            }
            state.audit.record(&event);
            Ok(())
        }
        Err(err) => {
            state.audit.record(
                &AuditEvent::warn("operator_access", "deny")
                    .with_field("permission", permission.label())
                    .with_field("peer", peer.ip())
                    .with_field("reason", &err),
            );
            Err(match err {
                AuthError::Unauthenticated(_) => (
                    StatusCode::UNAUTHORIZED,
                    [(header::WWW_AUTHENTICATE, "Bearer")],
                    Json(json!({ "error": err.to_string() })),
                )
                    .into_response(),
                AuthError::Unauthorized(_) => error_json(StatusCode::FORBIDDEN, &err.to_string()),
            })
        }
    }
}

/// Resolves the client address: first `X-Forwarded-For` entry, else the peer.
fn client_ip(headers: &HeaderMap, peer: SocketAddr) -> String {
    header_text(headers, FORWARDED_FOR_HEADER)
        .and_then(|value| value.split(',').next().map(str::trim).map(str::to_string))
        .filter(|first| !first.is_empty())
        .unwrap_or_else(|| peer.ip().to_string())
}

/// Returns a header as text when it is valid visible ASCII.
fn header_text(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name).and_then(|value| value.to_str().ok()).map(str::to_string)
}

/// JSON error body.
fn error_json(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// File download response.
fn attachment(content_type: &'static str, filename: &'static str, bytes: Vec<u8>) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{filename}\"")),
        ],
        bytes,
    )
        .into_response()
}

/// Maps a datastore failure, logging it.
fn store_failure(state: &ServerState, route: &'static str, err: &StoreError) -> Response {
    state.audit.record(
        &AuditEvent::error("store_request_failed", err.to_string()).with_field("route", route),
    );
    let status = match err {
        StoreError::MissingId | StoreError::UnknownColumn(_) | StoreError::Invalid(_) => {
            StatusCode::BAD_REQUEST
        }
        StoreError::Io(_)
        | StoreError::SchemaSync(_)
        | StoreError::NotSynced
        | StoreError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_json(status, &err.to_string())
}

/// Maps an encoder failure, logging it.
fn export_failure(state: &ServerState, err: &ExportError) -> Response {
    state.audit.record(&AuditEvent::error("export_failed", err.to_string()));
    error_json(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
