//! Configuration layer for formhook.
//!
//! This module provides:
//! - CLI argument parsing ([`Cli`], [`Command`])
//! - TOML configuration file parsing ([`TomlConfig`])
//! - Validated configuration ([`ValidatedConfig`])
//! - Configuration file generation ([`write_default_config`])
//! - Default values ([`defaults`])
//!
//! # Priority
//!
//! Configuration values are resolved with the following priority (highest to lowest):
//!
//! 1. **Explicit CLI arguments** - `--timeout` and `--log-file`
//! 2. **TOML config file** - Values from the configuration file
//! 3. **Built-in defaults** - Hardcoded default values
//!
//! Webhooks, allow/deny lists, retention and dispatch behavior are file-only.
//!
//! # Validation
//!
//! Every `[[webhooks]]` entry is checked before anything is sent: id and URL
//! are required, ids are unique, the URL must be an http(s) URL with a
//! non-loopback host, and method, format, header names and row keys must be
//! valid. Delivery re-checks the destination against the allow/deny lists
//! at send time.
//!
//! # Environment Overrides
//!
//! At runtime [`EnvSettings`](crate::settings::EnvSettings) layers the
//! `FORMHOOK_*` variables over the validated settings.

mod cli;
pub mod defaults;
mod error;
mod toml;
mod validated;

#[cfg(test)]
mod validated_tests;

pub use cli::{Cli, Command};
pub use error::{ConfigError, field};
pub use toml::{
    DispatchSection, LogSection, SettingsSection, TomlConfig, WebhookEntry,
    default_config_template,
};
pub use validated::{ValidatedConfig, expand_tilde, write_default_config};
