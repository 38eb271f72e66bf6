// crates/formbuilder-cli/src/main.rs
// ============================================================================
// Module: Form Builder CLI Entry Point
// Description: Command dispatcher for serving forms and administering the store.
// Purpose: Provide the `formbuilder` binary.
// Dependencies: clap, formbuilder-config, formbuilder-core, formbuilder-server,
//               serde, serde_json, thiserror, tokio
// ============================================================================

//! ## Overview
//! The `formbuilder` binary starts the HTTP server and exposes offline
//! utilities over the same configuration: validation, form rendering, schema
//! synchronization, exports, bulk imports, and the upload template. Every
//! command resolves configuration through [`FormBuilderConfig::load`], so the
//! `--config` flag, the `FORMBUILDER_CONFIG` variable, and the default file
//! name behave identically across commands.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use formbuilder_config::AuditConfig;
use formbuilder_config::FormBuilderConfig;
use formbuilder_core::AuditSink;
use formbuilder_core::Datastore;
use formbuilder_core::FileAuditSink;
use formbuilder_core::FormRenderer;
use formbuilder_core::NoopAuditSink;
use formbuilder_core::StderrAuditSink;
use formbuilder_server::ExportFormat;
use formbuilder_server::FormServer;
use formbuilder_server::decode_upload;
use formbuilder_server::export_table;
use formbuilder_server::load_form_schema;
use formbuilder_server::open_datastore;
use formbuilder_server::upload_template;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "formbuilder", version, disable_help_subcommand = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the form server.
    Serve(ConfigArgs),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Form definition utilities.
    Form {
        /// Selected form subcommand.
        #[command(subcommand)]
        command: FormCommand,
    },
    /// Datastore administration utilities.
    Store {
        /// Selected store subcommand.
        #[command(subcommand)]
        command: StoreCommand,
    },
    /// Write the bulk upload template workbook.
    Template(OutputArgs),
}

/// Shared `--config` flag.
#[derive(Args, Debug, Clone)]
struct ConfigArgs {
    /// Config file path (defaults to formbuilder.toml or `FORMBUILDER_CONFIG`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Config flag plus a required output path.
#[derive(Args, Debug)]
struct OutputArgs {
    /// Configuration selection.
    #[command(flatten)]
    location: ConfigArgs,
    /// Destination file.
    #[arg(long, value_name = "PATH")]
    output: PathBuf,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate the config file and the form definition it references.
    Validate(ConfigArgs),
}

/// Form subcommands.
#[derive(Subcommand, Debug)]
enum FormCommand {
    /// Render the form markup.
    Render(FormRenderCommand),
}

/// Arguments for `form render`.
#[derive(Args, Debug)]
struct FormRenderCommand {
    /// Configuration selection.
    #[command(flatten)]
    location: ConfigArgs,
    /// Write markup to a file instead of stdout.
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
}

/// Store subcommands.
#[derive(Subcommand, Debug)]
enum StoreCommand {
    /// Create or extend the response table.
    Sync(ConfigArgs),
    /// Export every stored row.
    Export(StoreExportCommand),
    /// Bulk upsert rows from a CSV or XLSX file.
    Import(StoreImportCommand),
}

/// Arguments for `store export`.
#[derive(Args, Debug)]
struct StoreExportCommand {
    /// Configuration selection.
    #[command(flatten)]
    location: ConfigArgs,
    /// Export format: json, excel, or parquet.
    #[arg(long, value_name = "FORMAT", default_value = "json")]
    format: String,
    /// Destination file; json is written to stdout when absent.
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,
}

/// Arguments for `store import`.
#[derive(Args, Debug)]
struct StoreImportCommand {
    /// Configuration selection.
    #[command(flatten)]
    location: ConfigArgs,
    /// Source file.
    #[arg(long, value_name = "PATH")]
    input: PathBuf,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(command) => command_serve(command).await,
        Commands::Config {
            command,
        } => match command {
            ConfigCommand::Validate(command) => command_config_validate(&command),
        },
        Commands::Form {
            command,
        } => match command {
            FormCommand::Render(command) => command_form_render(&command),
        },
        Commands::Store {
            command,
        } => command_store(command),
        Commands::Template(command) => command_template(&command),
    }
}

// ============================================================================
// SECTION: Serve Command
// ============================================================================

/// Executes the `serve` command.
async fn command_serve(command: ConfigArgs) -> CliResult<ExitCode> {
    let config = load_config(&command)?;
    let audit = build_audit_sink(&config.audit)?;
    let server = tokio::task::spawn_blocking(move || FormServer::from_config(&config, audit))
        .await
        .map_err(|err| CliError::new(format!("server init failed: init join failed: {err}")))?
        .map_err(|err| CliError::new(format!("server init failed: {err}")))?;
    write_stderr_line(&format!("formbuilder listening on http://{}", server.bind_addr()))
        .map_err(|err| CliError::new(output_error("stderr", &err)))?;
    server.serve().await.map_err(|err| CliError::new(format!("server failed: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Config and Form Commands
// ============================================================================

/// Executes `config validate`.
fn command_config_validate(command: &ConfigArgs) -> CliResult<ExitCode> {
    let config = load_config(command)?;
    let schema = load_form_schema(&config).map_err(|err| CliError::new(err.to_string()))?;
    let message = format!(
        "config ok: form {} ({} fields, {} pages), table {}",
        config.form.path.display(),
        schema.fields().len(),
        schema.pages().len(),
        config.form.table_name(),
    );
    write_stdout_line(&message).map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `form render`.
fn command_form_render(command: &FormRenderCommand) -> CliResult<ExitCode> {
    let config = load_config(&command.location)?;
    let audit = build_audit_sink(&config.audit)?;
    let schema = load_form_schema(&config).map_err(|err| CliError::new(err.to_string()))?;
    let markup = FormRenderer::new(audit).render(&schema);
    match &command.output {
        Some(path) => write_output_file(path, markup.as_bytes())?,
        None => write_stdout_line(&markup)
            .map_err(|err| CliError::new(output_error("stdout", &err)))?,
    }
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Store Commands
// ============================================================================

/// Dispatches store subcommands.
fn command_store(command: StoreCommand) -> CliResult<ExitCode> {
    match command {
        StoreCommand::Sync(command) => command_store_sync(&command),
        StoreCommand::Export(command) => command_store_export(&command),
        StoreCommand::Import(command) => command_store_import(&command),
    }
}

/// Executes `store sync`.
fn command_store_sync(command: &ConfigArgs) -> CliResult<ExitCode> {
    let config = load_config(command)?;
    let store = open_store(&config)?;
    let report =
        store.sync_schema().map_err(|err| CliError::new(format!("schema sync failed: {err}")))?;
    write_json(&report)?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `store export`.
fn command_store_export(command: &StoreExportCommand) -> CliResult<ExitCode> {
    let format = ExportFormat::parse(&command.format).map_err(|err| CliError::new(err.to_string()))?;
    if command.output.is_none() && format != ExportFormat::Json {
        return Err(CliError::new(format!("--output is required for {} exports", command.format)));
    }
    let config = load_config(&command.location)?;
    let store = open_store(&config)?;
    store.sync_schema().map_err(|err| CliError::new(format!("schema sync failed: {err}")))?;
    let table = store.query(None).map_err(|err| CliError::new(format!("query failed: {err}")))?;
    let file = export_table(&table, format).map_err(|err| CliError::new(err.to_string()))?;
    match &command.output {
        Some(path) => write_output_file(path, &file.bytes)?,
        None => write_stdout_bytes(&file.bytes)
            .map_err(|err| CliError::new(output_error("stdout", &err)))?,
    }
    Ok(ExitCode::SUCCESS)
}

/// Executes `store import`.
fn command_store_import(command: &StoreImportCommand) -> CliResult<ExitCode> {
    let config = load_config(&command.location)?;
    let bytes = read_bytes_with_limit(&command.input, config.upload.max_bytes)?;
    let filename = command
        .input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let table = decode_upload(&filename, &bytes, &config.upload)
        .map_err(|err| CliError::new(err.to_string()))?;
    let store = open_store(&config)?;
    store.sync_schema().map_err(|err| CliError::new(format!("schema sync failed: {err}")))?;
    let report =
        store.upsert_bulk(&table).map_err(|err| CliError::new(format!("import failed: {err}")))?;
    write_json(&report)?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `template`.
fn command_template(command: &OutputArgs) -> CliResult<ExitCode> {
    let config = load_config(&command.location)?;
    let schema = load_form_schema(&config).map_err(|err| CliError::new(err.to_string()))?;
    let bytes = upload_template(&schema).map_err(|err| CliError::new(err.to_string()))?;
    write_output_file(&command.output, &bytes)?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Loads and validates configuration.
fn load_config(args: &ConfigArgs) -> CliResult<FormBuilderConfig> {
    FormBuilderConfig::load(args.config.as_deref())
        .map_err(|err| CliError::new(format!("config load failed: {err}")))
}

/// Builds the audit sink selected by `[audit]`.
fn build_audit_sink(config: &AuditConfig) -> CliResult<Arc<dyn AuditSink>> {
    if !config.enabled {
        return Ok(Arc::new(NoopAuditSink));
    }
    match &config.path {
        Some(path) => FileAuditSink::new(path)
            .map(|sink| Arc::new(sink) as Arc<dyn AuditSink>)
            .map_err(|err| CliError::new(format!("audit log open failed: {err}"))),
        None => Ok(Arc::new(StderrAuditSink)),
    }
}

/// Opens the configured datastore for offline commands.
fn open_store(config: &FormBuilderConfig) -> CliResult<impl Datastore> {
    let audit = build_audit_sink(&config.audit)?;
    let schema = load_form_schema(config).map_err(|err| CliError::new(err.to_string()))?;
    open_datastore(config, &schema, audit).map_err(|err| CliError::new(err.to_string()))
}

/// Reads a file, failing when it exceeds `max_bytes`.
fn read_bytes_with_limit(path: &Path, max_bytes: usize) -> CliResult<Vec<u8>> {
    let read_error =
        |err: std::io::Error| CliError::new(format!("failed to read {}: {err}", path.display()));
    let file = File::open(path).map_err(read_error)?;
    let limit = u64::try_from(max_bytes).unwrap_or(u64::MAX);
    let mut bytes = Vec::new();
    file.take(limit.saturating_add(1)).read_to_end(&mut bytes).map_err(read_error)?;
    if bytes.len() > max_bytes {
        return Err(CliError::new(format!(
            "{} exceeds the upload limit of {max_bytes} bytes",
            path.display()
        )));
    }
    Ok(bytes)
}

/// Writes `bytes` to `path`.
fn write_output_file(path: &Path, bytes: &[u8]) -> CliResult<()> {
    fs::write(path, bytes)
        .map_err(|err| CliError::new(format!("failed to write {}: {err}", path.display())))
}

/// Writes pretty JSON to stdout.
fn write_json<T: Serialize>(value: &T) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::new(format!("serialize failed: {err}")))?;
    write_stdout_line(&text).map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes raw bytes to stdout without adding a newline.
fn write_stdout_bytes(bytes: &[u8]) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    stdout.write_all(bytes)?;
    stdout.flush()
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
