//! Command implementations. Every command that touches a project runs with a
//! usage statistics handler that is drained under the shutdown coordinator
//! before the process exits.

use std::fs;
use std::path::Path;
use std::time::Duration;

use config_rs::{resolve_config_path, ConfigError, ProjectConfig};
use error_handling::{Error, ErrorKind, Result, ShutdownCoordinator};
use serde_json::{json, Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use usage_statistics::{
    DeliveryError, DrainReport, HttpTransport, Transport, UsageStatisticsHandler,
    UsageStatisticsSettings,
};

use crate::cli::{Cli, Command, ListCommand, ProjectCommand, UsageStatisticsCommand};
use crate::context::ProjectContext;
use crate::util::{cli_message, cli_message_dict};

pub const LIBRARY_VERSION: &str = env!("CARGO_PKG_VERSION");

/// TEST-NET-1 address, never routed; used by `project instantiate --offline`
pub const OFFLINE_COLLECTOR_URL: &str = "http://192.0.2.1/great_expectations/v1/usage_statistics";

const HANDLER_DRAIN_MARGIN: Duration = Duration::from_millis(50);

pub async fn run(cli: Cli) -> Result<()> {
    let config_path = resolve_config_path(cli.config.as_deref());

    if let Command::Init = cli.command {
        return init_project(&config_path);
    }

    let config = ProjectConfig::load(&config_path).map_err(config_error)?;
    let mut settings = config.usage_statistics_settings(LIBRARY_VERSION);
    if let Command::Project(ProjectCommand::Instantiate { offline: true, .. }) = cli.command {
        settings = settings.with_url(OFFLINE_COLLECTOR_URL);
    }

    let coordinator = ShutdownCoordinator::new("great_expectations");
    let signals = coordinator.install_signal_handler();
    let handler = UsageStatisticsHandler::from_settings(&settings);

    let result = dispatch(cli.command, &config, &settings, &handler, coordinator.token()).await;

    let report = drain_usage_statistics(&coordinator, &handler).await;
    debug!(report = ?report, "Usage statistics handler shut down");
    signals.abort();

    interrupt_wins(result, coordinator.is_interrupted())
}

/// Budget given to the handler inside the coordinator's grace period, so the
/// handler's own timeout fires first and aborts the sender itself
pub(crate) fn handler_drain_budget(grace: Duration) -> Duration {
    grace.saturating_sub(HANDLER_DRAIN_MARGIN)
}

async fn drain_usage_statistics(
    coordinator: &ShutdownCoordinator,
    handler: &UsageStatisticsHandler,
) -> Option<DrainReport> {
    let budget = handler_drain_budget(coordinator.grace_period());
    let mut report = None;
    coordinator
        .drain(async {
            report = Some(handler.shutdown(budget).await);
        })
        .await;
    report
}

/// A command that finished after SIGINT still reports the interrupt
fn interrupt_wins(result: Result<()>, interrupted: bool) -> Result<()> {
    match result {
        Ok(()) if interrupted => Err(Error::interrupted()),
        other => other,
    }
}

async fn dispatch(
    command: Command,
    config: &ProjectConfig,
    settings: &UsageStatisticsSettings,
    handler: &UsageStatisticsHandler,
    token: CancellationToken,
) -> Result<()> {
    match command {
        Command::Init => Ok(()),
        Command::Datasource(ListCommand::List) => {
            let context = ProjectContext::new(config, handler);
            print_entries(&context.list_datasources(), "Datasource");
            handler.emit("cli.datasource.list", json!({}), true);
            Ok(())
        }
        Command::Store(ListCommand::List) => {
            let context = ProjectContext::new(config, handler);
            print_entries(&context.list_stores(), "Store");
            handler.emit("cli.store.list", json!({}), true);
            Ok(())
        }
        Command::ValidationOperator(ListCommand::List) => {
            let context = ProjectContext::new(config, handler);
            print_entries(&context.list_validation_operators(), "Validation Operator");
            handler.emit("cli.validation_operator.list", json!({}), true);
            Ok(())
        }
        Command::Project(ProjectCommand::Instantiate { nap_seconds, .. }) => {
            instantiate(config, handler, nap_seconds, token).await
        }
        Command::UsageStatistics(UsageStatisticsCommand::Status) => {
            print_status(settings, handler);
            Ok(())
        }
        Command::UsageStatistics(UsageStatisticsCommand::Send { file }) => {
            send_record(settings, &file, token).await
        }
    }
}

fn init_project(path: &Path) -> Result<()> {
    let config = ProjectConfig::new_project();
    config.write(path).map_err(config_error)?;
    cli_message(&format!(
        "<green>Created</green> {} with data_context_id {}",
        path.display(),
        config.data_context_id()
    ));
    Ok(())
}

/// Constructs a context (four usage events), then naps until done or
/// interrupted.
async fn instantiate(
    config: &ProjectConfig,
    handler: &UsageStatisticsHandler,
    nap_seconds: u64,
    token: CancellationToken,
) -> Result<()> {
    let context = ProjectContext::new(config, handler);
    context.list_datasources();
    context.list_stores();
    context.list_validation_operators();
    println!("Done constructing a DataContext");

    if token.is_cancelled() {
        return Err(Error::interrupted());
    }

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(nap_seconds)) => {
            println!("Ending a long nap");
            Ok(())
        }
        _ = token.cancelled() => Err(Error::interrupted()),
    }
}

fn print_entries(entries: &[Map<String, Value>], noun: &str) {
    match entries.len() {
        0 => cli_message(&format!("No {noun}s found")),
        1 => cli_message(&format!("1 {noun} found:")),
        n => cli_message(&format!("{n} {noun}s found:")),
    }
    for entry in entries {
        println!();
        cli_message_dict(entry, 1, Some('-'));
    }
}

fn print_status(settings: &UsageStatisticsSettings, handler: &UsageStatisticsHandler) {
    let mut status = Map::new();
    status.insert("enabled".to_string(), json!(handler.is_enabled()));
    status.insert("usage_statistics_url".to_string(), json!(settings.url));
    status.insert(
        "data_context_id".to_string(),
        json!(settings.identity.data_context_id.to_string()),
    );
    status.insert(
        "retry".to_string(),
        json!({
            "max_attempts": settings.retry.max_attempts,
            "backoff_ms": settings.retry.backoff.as_millis() as u64,
        }),
    );
    cli_message("<cyan>Anonymous usage statistics</cyan>");
    cli_message_dict(&status, 2, None);
}

/// Posts a raw record and reports the collector's answer. A rejected record
/// is reported, not treated as a failure.
async fn send_record(
    settings: &UsageStatisticsSettings,
    file: &Path,
    token: CancellationToken,
) -> Result<()> {
    let contents = fs::read_to_string(file).map_err(|e| {
        Error::new(ErrorKind::IO, format!("unable to read {}", file.display())).cause(e)
    })?;
    let body: Value = serde_json::from_str(&contents)?;

    let transport =
        HttpTransport::new(settings.url.clone(), settings.request_timeout, settings.connect_timeout)?;

    let outcome = tokio::select! {
        biased;
        _ = token.cancelled() => return Err(Error::interrupted()),
        outcome = transport.post(&body) => outcome,
    };

    match outcome {
        Ok(status) => {
            cli_message(&format!("<green>{status}</green> {}", transport.url()));
            Ok(())
        }
        Err(DeliveryError::Rejected(status)) => {
            cli_message(&format!(
                "<red>{status}</red> the collector rejected the record as malformed"
            ));
            Ok(())
        }
        Err(e) => Err(Error::new(ErrorKind::Transport, e.to_string()).transient().cause(e)),
    }
}

fn config_error(err: ConfigError) -> Error {
    let kind = match &err {
        ConfigError::IoError(_) => ErrorKind::IO,
        _ => ErrorKind::Configuration,
    };
    Error::new(kind, err.to_string()).cause(err)
}

/// The line printed on stderr for a failed command
pub fn error_message(err: &Error) -> String {
    if err.is_interrupt() {
        "Aborted! KeyboardInterrupt (SIGINT)".to_string()
    } else {
        format!("Error: {}", err.message)
    }
}
