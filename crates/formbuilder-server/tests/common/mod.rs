// crates/formbuilder-server/tests/common/mod.rs
// =============================================================================
// Module: Server Test Harness
// Description: Spawns a real form server on a background runtime.
// Purpose: Drive routes over HTTP with a blocking client.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]
#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    reason = "Test harness setup fails loudly."
)]

use std::net::TcpListener as StdTcpListener;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use formbuilder_config::FormBuilderConfig;
use formbuilder_core::AuditSink;
use formbuilder_core::LookupError;
use formbuilder_core::Mailer;
use formbuilder_core::MemoryAuditSink;
use formbuilder_core::ReminderEmail;
use formbuilder_core::Timestamp;
use formbuilder_server::FormServer;
use reqwest::blocking::Client;
use reqwest::redirect::Policy;
use tempfile::TempDir;
use tokio::runtime::Builder;
use tokio::sync::oneshot;

/// Two pages, four fields; `full_name` is required.
pub const SAMPLE_FORM: &str = r#"
[[pages]]
page_number = 1
title = "About you"
description = "Basics"

[[pages]]
page_number = 2
title = "Details"
description = "Tell us more"

[[fields]]
backend_field_name = "full_name"
field_label = "Full name"
page_number = 1
field_type = "input"
data_type = "string"
required = "yes"

[[fields]]
backend_field_name = "email"
field_label = "Email"
page_number = 1
field_type = "input"
data_type = "string"
required = "no"

[[fields]]
backend_field_name = "age"
field_label = "Age"
page_number = 2
field_type = "input"
data_type = "integer"
required = "no"

[[fields]]
backend_field_name = "category"
field_label = "Category"
page_number = 2
field_type = "select"
data_type = "string"
required = "no"
select_options = "A,B"
"#;

/// Builds a config rooted in `dir` with both soft checks enabled.
pub fn test_config(dir: &Path) -> FormBuilderConfig {
    let form_path = dir.join("applications.toml");
    std::fs::write(&form_path, SAMPLE_FORM).unwrap();
    let mut config = FormBuilderConfig::default();
    config.form.path = form_path;
    config.datastore.path = dir.join("data").join("formbuilder.sqlite");
    config.analytics.l2 = true;
    config.analytics.l3 = true;
    config.dashboard.breakdown_field = Some("category".to_string());
    config
}

/// Mailer that records outgoing reminders.
#[derive(Default)]
pub struct RecordingMailer {
    /// Recipients in send order.
    pub sent: Mutex<Vec<String>>,
}

impl Mailer for RecordingMailer {
    fn send(&self, email: &ReminderEmail) -> Result<(), LookupError> {
        self.sent.lock().unwrap().push(email.to.clone());
        Ok(())
    }
}

/// Running server with its scratch directory and audit sink.
pub struct TestServer {
    base_url: String,
    shutdown: Option<oneshot::Sender<()>>,
    join: Option<thread::JoinHandle<()>>,
    pub audit: Arc<MemoryAuditSink>,
    _dir: TempDir,
}

impl TestServer {
    /// Returns an absolute URL for `path`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Spawns a server with the default test config.
pub fn spawn_server() -> TestServer {
    spawn_server_with(|_| {}, |server| server)
}

/// Spawns a server after adjusting the config and the assembled server.
pub fn spawn_server_with(
    adjust_config: impl FnOnce(&mut FormBuilderConfig),
    adjust_server: impl FnOnce(FormServer) -> FormServer,
) -> TestServer {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    adjust_config(&mut config);
    let audit = Arc::new(MemoryAuditSink::new());
    let sink: Arc<dyn AuditSink> = audit.clone();
    let server = adjust_server(FormServer::from_config(&config, sink).expect("server init"));

    let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let join = thread::spawn(move || {
        let runtime = Builder::new_multi_thread().worker_threads(2).enable_all().build().unwrap();
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            let _ = server
                .serve_on(listener, async move {
                    let _ = shutdown_rx.await;
                })
                .await;
        });
    });
    TestServer {
        base_url: format!("http://{addr}"),
        shutdown: Some(shutdown_tx),
        join: Some(join),
        audit,
        _dir: dir,
    }
}

/// Blocking client that does not follow redirects or pool connections.
pub fn client() -> Client {
    Client::builder()
        .redirect(Policy::none())
        .pool_max_idle_per_host(0)
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

/// Canonical timestamp `seconds` in the past.
pub fn seconds_ago(seconds: i64) -> String {
    Timestamp::from_unix_seconds(Timestamp::now_utc().unix_seconds() - seconds)
        .unwrap()
        .to_canonical_string()
}

/// Url-encodes form pairs.
pub fn form_body(pairs: &[(&str, &str)]) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in pairs {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}

/// Multipart boundary used by [`multipart_body`].
pub const BOUNDARY: &str = "formbuilder-test-boundary";

/// Builds a multipart body with one file field.
pub fn multipart_body(field: &str, filename: &str, contents: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; \
         filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(contents);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}
