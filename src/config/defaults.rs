//! Default values for configuration options.
//!
//! Centralized constants to avoid magic numbers scattered across the codebase.

use std::time::Duration;

/// Default upper bound for one webhook request, in seconds.
pub const TIMEOUT_SECS: u64 = 10;

/// Largest accepted request timeout, in seconds.
pub const MAX_TIMEOUT_SECS: u64 = 300;

/// Default number of log entries kept per webhook.
pub const RETENTION_PER_ID: usize = 50;

/// Default maximum age of a log entry, in days.
pub const TTL_DAYS: u64 = 30;

/// Default location of the execution log.
pub const LOG_PATH: &str = "formhook-logs.json";

/// Default output path of `formhook init`.
pub const CONFIG_PATH: &str = "formhook.toml";

/// Default request timeout as Duration.
#[must_use]
pub const fn timeout() -> Duration {
    Duration::from_secs(TIMEOUT_SECS)
}
