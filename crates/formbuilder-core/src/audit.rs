// crates/formbuilder-core/src/audit.rs
// ============================================================================
// Module: Audit Logging
// Description: Structured audit events and sinks shared by every component.
// Purpose: Emit JSON-line diagnostics without a hard logging dependency.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Components report warnings and notable outcomes as [`AuditEvent`]s through
//! an injected [`AuditSink`]. Sinks serialize each event as one JSON line so
//! deployments can route them to their preferred logging pipeline.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Severity label for audit events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditLevel {
    /// Routine outcome.
    Info,
    /// Degraded but recoverable condition.
    Warn,
    /// Failed operation.
    Error,
}

/// Audit event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Severity.
    pub level: AuditLevel,
    /// Human readable summary.
    pub message: String,
    /// Additional string fields.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
}

impl AuditEvent {
    /// Builds an event stamped with the current time.
    #[must_use]
    pub fn new(event: &'static str, level: AuditLevel, message: impl Into<String>) -> Self {
        Self {
            event,
            timestamp_ms: now_millis(),
            level,
            message: message.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Builds an info event.
    #[must_use]
    pub fn info(event: &'static str, message: impl Into<String>) -> Self {
        Self::new(event, AuditLevel::Info, message)
    }

    /// Builds a warning event.
    #[must_use]
    pub fn warn(event: &'static str, message: impl Into<String>) -> Self {
        Self::new(event, AuditLevel::Warn, message)
    }

    /// Builds an error event.
    #[must_use]
    pub fn error(event: &'static str, message: impl Into<String>) -> Self {
        Self::new(event, AuditLevel::Error, message)
    }

    /// Returns the event with an extra field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.fields.insert(key.into(), value.to_string());
        self
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for component events.
pub trait AuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: &AuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl AuditSink for StderrAuditSink {
    fn record(&self, event: &AuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl AuditSink for FileAuditSink {
    fn record(&self, event: &AuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _event: &AuditEvent) {}
}

/// Audit sink that keeps events in memory.
#[derive(Default)]
pub struct MemoryAuditSink {
    /// Recorded events in arrival order.
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().map_or_else(|_| Vec::new(), |events| events.clone())
    }

    /// Returns the identifiers of recorded events.
    #[must_use]
    pub fn event_names(&self) -> Vec<&'static str> {
        self.events().iter().map(|event| event.event).collect()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: &AuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the current unix epoch in milliseconds.
fn now_millis() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions on known inputs.")]

    use super::*;

    #[test]
    fn file_sink_appends_json_lines() {
        let dir = std::env::temp_dir().join(format!("formbuilder-audit-{}", now_millis()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("audit.jsonl");
        let sink = FileAuditSink::new(&path).unwrap();
        sink.record(&AuditEvent::warn("schema_sync", "column added").with_field("column", "age"));
        sink.record(&AuditEvent::info("http_request", "ok"));
        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["event"], "schema_sync");
        assert_eq!(first["level"], "warn");
        assert_eq!(first["fields"]["column"], "age");
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn memory_sink_records_in_order() {
        let sink = MemoryAuditSink::new();
        sink.record(&AuditEvent::info("a", "first"));
        sink.record(&AuditEvent::error("b", "second"));
        assert_eq!(sink.event_names(), vec!["a", "b"]);
    }
}
