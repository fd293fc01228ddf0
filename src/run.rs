//! Application execution logic.
//!
//! This module runs the `dispatch`, `test` and `logs` subcommands against a
//! validated configuration.

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tokio::signal;

use formhook::config::{Command, ValidatedConfig};
use formhook::dispatch::{DispatchReport, Dispatcher, FormSubmission, InMemoryRepository};
use formhook::history::{FileLogStore, LogStoreError, Logger};
use formhook::settings::{EnvSettings, SettingsProvider, StaticSettings};
use formhook::webhook::{HttpError, Outcome, PolicyRejection, ReqwestClient, Sender};

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;

/// Error type for runtime execution failures.
#[derive(Debug, Error)]
pub enum RunError {
    /// Failed to read the submission.
    #[error("Failed to read event from {origin}: {source}")]
    EventRead {
        /// File path, or `stdin`
        origin: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The submission is not valid JSON.
    #[error("Invalid event: {0}")]
    EventParse(#[source] serde_json::Error),

    /// No webhook with this id is configured.
    #[error("Unknown webhook '{0}'")]
    UnknownWebhook(String),

    /// A test send was refused by the destination policy.
    #[error("Webhook {webhook} not sent: {reason}")]
    Rejected {
        /// Webhook id
        webhook: String,
        /// Why the destination was refused
        reason: PolicyRejection,
    },

    /// Failed to update the execution log.
    #[error("Failed to clear log: {0}")]
    LogClear(#[source] LogStoreError),

    /// The HTTP client could not be created.
    #[error("HTTP client unavailable: {0}")]
    Client(#[source] HttpError),

    /// Failed to render output.
    #[error("Failed to render output: {0}")]
    Output(#[source] serde_json::Error),

    /// Shutdown signal received before the delivery finished.
    #[error("Interrupted before delivery finished")]
    Interrupted,
}

/// Executes one subcommand.
///
/// `init` and `check` need no runtime and are handled by the caller.
///
/// # Errors
///
/// Returns an error if:
/// - The submission cannot be read or parsed
/// - A test send names an unknown webhook or is refused
/// - The log cannot be cleared
/// - A dispatch is interrupted by Ctrl+C
pub async fn execute(command: &Command, config: ValidatedConfig) -> Result<(), RunError> {
    match command {
        Command::Dispatch { event } => {
            let submission = read_event(event.as_deref())?;
            dispatch(config, &submission).await
        }
        Command::Test { webhook_id, event } => {
            let submission = match event.as_deref() {
                Some(path) => read_event(Some(path))?,
                None => FormSubmission::default(),
            };
            test_send(&config, webhook_id, &submission).await
        }
        Command::Logs { webhook_id, clear } => show_logs(&config, webhook_id, *clear).await,
        Command::Init { .. } | Command::Check => Ok(()),
    }
}

/// Dispatches one submission, stopping early on Ctrl+C.
async fn dispatch(config: ValidatedConfig, submission: &FormSubmission) -> Result<(), RunError> {
    let sender = create_sender(&config)?;
    let repository = InMemoryRepository::new(config.webhooks);
    let dispatcher = Dispatcher::new(sender, repository).with_fan_out(config.fan_out);

    let report = tokio::select! {
        biased;

        () = shutdown_signal() => {
            tracing::warn!("Shutdown signal received, abandoning delivery");
            return Err(RunError::Interrupted);
        }

        report = dispatcher.handle(submission) => report,
    };

    tracing::info!("{}", describe_report(&report));
    Ok(())
}

/// Sends one webhook without recording it and prints the attempt as JSON.
async fn test_send(
    config: &ValidatedConfig,
    webhook_id: &str,
    submission: &FormSubmission,
) -> Result<(), RunError> {
    let webhook = config
        .webhook(webhook_id)
        .ok_or_else(|| RunError::UnknownWebhook(webhook_id.to_string()))?;

    let sender = create_sender(config)?;
    match sender.test_send(webhook, &submission.to_context()).await {
        Outcome::Completed(entry) => {
            let rendered = serde_json::to_string_pretty(&entry).map_err(RunError::Output)?;
            println!("{rendered}");
            Ok(())
        }
        Outcome::Rejected(reason) => Err(RunError::Rejected {
            webhook: webhook.id.clone(),
            reason,
        }),
    }
}

/// Prints or clears the log of one webhook.
async fn show_logs(config: &ValidatedConfig, webhook_id: &str, clear: bool) -> Result<(), RunError> {
    let logger = create_logger(config, settings_provider(config));

    if clear {
        let removed = logger.clear(webhook_id).await.map_err(RunError::LogClear)?;
        println!("Removed {removed} log entries for webhook {webhook_id}");
        return Ok(());
    }

    let entries = logger.entries(webhook_id);
    let rendered = serde_json::to_string_pretty(&entries).map_err(RunError::Output)?;
    println!("{rendered}");
    Ok(())
}

/// Builds the settings provider: file settings with `FORMHOOK_*` overrides.
fn settings_provider(config: &ValidatedConfig) -> Arc<dyn SettingsProvider> {
    Arc::new(EnvSettings::new(StaticSettings(config.settings.clone())))
}

fn create_logger(
    config: &ValidatedConfig,
    settings: Arc<dyn SettingsProvider>,
) -> Logger<FileLogStore> {
    Logger::new(FileLogStore::new(&config.log_path), settings)
}

/// Creates the HTTP sender from configuration.
fn create_sender(
    config: &ValidatedConfig,
) -> Result<Sender<ReqwestClient, FileLogStore>, RunError> {
    let client = ReqwestClient::new().map_err(RunError::Client)?;
    let settings = settings_provider(config);
    let logger = create_logger(config, settings.clone());
    Ok(Sender::new(client, settings, logger))
}

/// Reads a submission from a file, or from stdin when no path is given.
fn read_event(path: Option<&Path>) -> Result<FormSubmission, RunError> {
    let text = match path {
        Some(path) => std::fs::read_to_string(path).map_err(|e| RunError::EventRead {
            origin: path.display().to_string(),
            source: e,
        })?,
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .map_err(|e| RunError::EventRead {
                    origin: "stdin".to_string(),
                    source: e,
                })?;
            text
        }
    };

    parse_event(&text)
}

/// Parses a submission from JSON text.
fn parse_event(text: &str) -> Result<FormSubmission, RunError> {
    serde_json::from_str(text).map_err(RunError::EventParse)
}

fn describe_report(report: &DispatchReport) -> String {
    match report {
        DispatchReport::Sent(id) => format!("Submission delivered to webhook {id}"),
        DispatchReport::Dropped(reason) => format!("Submission dropped: {reason}"),
        DispatchReport::FannedOut(0) => "No webhook matched the submission".to_string(),
        DispatchReport::FannedOut(n) => format!("Submission delivered to {n} webhook(s)"),
    }
}

/// Returns a future that completes when a shutdown signal is received.
///
/// If a handler cannot be installed, that signal is never reported.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
