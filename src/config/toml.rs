//! TOML configuration file parsing.
//!
//! Defines the structure of the configuration file with serde. Values stay
//! raw here; [`ValidatedConfig`](super::ValidatedConfig) checks them.

use std::path::Path;

use serde::Deserialize;

use super::ConfigError;
use crate::template::Row;
use crate::webhook::Targeting;

/// Root configuration structure from TOML file.
///
/// All fields are optional to allow partial configuration
/// that can be merged with CLI arguments.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    /// Delivery and retention settings
    #[serde(default)]
    pub settings: SettingsSection,

    /// Execution log configuration
    #[serde(default)]
    pub log: LogSection,

    /// Dispatch behavior
    #[serde(default)]
    pub dispatch: DispatchSection,

    /// Configured webhooks, in dispatch order
    #[serde(default)]
    pub webhooks: Vec<WebhookEntry>,
}

/// Delivery and retention settings section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsSection {
    /// Request timeout in seconds
    pub timeout: Option<u64>,

    /// Log entries kept per webhook (0 = unlimited)
    pub retention_per_id: Option<usize>,

    /// Maximum log entry age in days (0 = unlimited)
    pub ttl_days: Option<u64>,

    /// Host glob patterns that are the only allowed destinations
    #[serde(default)]
    pub allowlist: Vec<String>,

    /// Host glob patterns that are never allowed
    #[serde(default)]
    pub denylist: Vec<String>,
}

/// Execution log section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogSection {
    /// Path of the JSON log file; `~` expands to the home directory
    pub path: Option<String>,
}

/// Dispatch section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchSection {
    /// Deliver unbound submissions to every matching webhook
    #[serde(default)]
    pub fan_out: bool,
}

/// One `[[webhooks]]` entry.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebhookEntry {
    pub id: Option<String>,
    pub name: Option<String>,
    pub enabled: Option<bool>,
    pub url: Option<String>,
    pub method: Option<String>,
    pub request_format: Option<String>,
    #[serde(default)]
    pub headers: Vec<Row>,
    #[serde(default)]
    pub body_mapping: Vec<Row>,
    pub trigger_when: Option<String>,
    #[serde(default)]
    pub consent_required: bool,
    #[serde(default)]
    pub targeting: Targeting,
}

impl TomlConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse(&content)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::from)
    }
}

/// Generates a default configuration file with comments.
#[must_use]
pub fn default_config_template() -> String {
    r#"# formhook configuration file

[settings]
# Request timeout in seconds (default: 10)
# timeout = 10

# Log entries kept per webhook, newest first (default: 50, 0 = unlimited)
# retention_per_id = 50

# Drop log entries older than this many days (default: 30, 0 = never)
# ttl_days = 30

# Host glob patterns; when set, only matching hosts are allowed
# allowlist = ["*.example.com"]

# Host glob patterns that are always rejected
# denylist = ["*.internal"]

[log]
# Execution log location (default: formhook-logs.json)
# path = "~/.local/share/formhook/logs.json"

[dispatch]
# Deliver submissions without a webhook binding to every enabled webhook
# whose targeting matches (default: false)
# fan_out = false

# [[webhooks]]
# id = "crm"
# name = "CRM lead capture"
# url = "https://crm.example.com/api/leads"
# method = "POST"                # GET, POST, PUT, PATCH or DELETE
# request_format = "json"        # form, json or xml
# trigger_when = "on_submit"
# consent_required = true
#
# Placeholders: {{data.<field>}}, {{form_id}}, {{post_id}}, {{slug}},
# {{user.email}}, {{user.last_login}}, ...
# headers = [
#     { key = "Authorization", value = "Bearer your-token-here" },
# ]
# body_mapping = [
#     { key = "contact[email]", value = "{{data.email}}" },
#     { key = "contact[name]", value = "{{data.first_name}} {{data.last_name}}" },
#     { key = "interests", value = "{{data.interests}}" },
# ]
#
# [webhooks.targeting]
# scope = "include"              # all, include or exclude
# form_ids = ["7"]
"#
    .to_string()
}
