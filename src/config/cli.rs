//! CLI argument parsing using clap.
//!
//! Defines the command-line interface with all options and subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use super::defaults;

/// formhook: outbound webhooks for form submissions
///
/// Renders configured webhooks against submitted form data, delivers
/// them, and keeps a bounded execution log per webhook.
#[derive(Debug, Parser)]
#[command(name = "formhook")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the execution log (overrides log.path)
    #[arg(long = "log-file", global = true)]
    pub log_file: Option<PathBuf>,

    /// Request timeout in seconds (overrides settings.timeout)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Enable verbose logging
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

/// Subcommands for formhook
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Generate a default configuration file
    Init {
        /// Output path for the configuration file
        #[arg(long, short, default_value = defaults::CONFIG_PATH)]
        output: PathBuf,
    },

    /// Dispatch one form submission (JSON) to its webhooks
    Dispatch {
        /// File holding the submission; read from stdin when omitted
        #[arg(long, short)]
        event: Option<PathBuf>,
    },

    /// Send a webhook once without recording it, printing the attempt
    Test {
        /// Id of the webhook to send
        webhook_id: String,

        /// File holding the submission; an empty submission when omitted
        #[arg(long, short)]
        event: Option<PathBuf>,
    },

    /// Print the execution log of a webhook
    Logs {
        /// Id of the webhook
        webhook_id: String,

        /// Delete the log instead of printing it
        #[arg(long)]
        clear: bool,
    },

    /// Validate the configuration and exit
    Check,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Parses CLI arguments from an iterator (useful for testing).
    pub fn parse_from_iter<I, T>(iter: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::parse_from(iter)
    }
}
