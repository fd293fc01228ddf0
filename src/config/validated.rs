//! Validated configuration after merging CLI and TOML sources.
//!
//! This module contains the final, validated configuration that is used
//! by the application. All validation is performed during construction.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use http::HeaderName;

use crate::context::Trigger;
use crate::settings::Settings;
use crate::template::Row;
use crate::webhook::{Method, RequestFormat, WebhookConfig, check_url, glob_to_regex};

use super::cli::Cli;
use super::defaults;
use super::error::{ConfigError, field};
use super::toml::{TomlConfig, WebhookEntry};

/// Fully validated configuration ready for use by the application.
///
/// # Construction
///
/// Use [`ValidatedConfig::from_raw`] to create from CLI args and optional TOML config.
/// The function validates all inputs and returns errors for invalid configurations.
#[derive(Debug)]
pub struct ValidatedConfig {
    /// Delivery and retention settings
    pub settings: Settings,

    /// Execution log location, `~` already expanded
    pub log_path: PathBuf,

    /// Whether unbound submissions fan out by targeting
    pub fan_out: bool,

    /// Configured webhooks, in file order
    pub webhooks: Vec<WebhookConfig>,

    /// Verbose logging enabled
    pub verbose: bool,
}

impl fmt::Display for ValidatedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let enabled = self.webhooks.iter().filter(|w| w.enabled).count();

        write!(
            f,
            "Config {{ webhooks: {}/{} enabled, timeout: {}s, retention: {}, ttl: {}d, \
             allowlist: {}, denylist: {}, fan_out: {}, log: {} }}",
            enabled,
            self.webhooks.len(),
            self.settings.timeout.as_secs(),
            self.settings.retention_per_id,
            self.settings.ttl_days,
            self.settings.allowlist.len(),
            self.settings.denylist.len(),
            self.fan_out,
            self.log_path.display(),
        )
    }
}

impl ValidatedConfig {
    /// Creates a validated configuration from CLI arguments and optional TOML config.
    ///
    /// CLI arguments take precedence over TOML config values.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The timeout is zero or too large
    /// - An allow or deny pattern does not compile
    /// - A webhook is missing its id or URL, or ids repeat
    /// - A webhook URL is not an allowed destination
    /// - A method, format, header name or row key is invalid
    pub fn from_raw(cli: &Cli, toml: Option<&TomlConfig>) -> Result<Self, ConfigError> {
        let settings = Self::resolve_settings(cli, toml)?;
        let log_path = Self::resolve_log_path(cli, toml);
        let fan_out = toml.is_some_and(|t| t.dispatch.fan_out);
        let webhooks = Self::build_webhooks(toml)?;

        Ok(Self {
            settings,
            log_path,
            fan_out,
            webhooks,
            verbose: cli.verbose,
        })
    }

    /// Loads and merges configuration from CLI and optional config file.
    ///
    /// If `cli.config` is set, loads the TOML file from that path.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The config file cannot be read or parsed
    /// - The merged configuration is invalid
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        let toml = if let Some(ref path) = cli.config {
            Some(TomlConfig::load(path)?)
        } else {
            None
        };

        Self::from_raw(cli, toml.as_ref())
    }

    /// Returns the webhook with this id.
    #[must_use]
    pub fn webhook(&self, id: &str) -> Option<&WebhookConfig> {
        self.webhooks.iter().find(|w| w.id == id)
    }

    fn resolve_settings(cli: &Cli, toml: Option<&TomlConfig>) -> Result<Settings, ConfigError> {
        let section = toml.map(|t| &t.settings);

        // Priority: CLI explicit > TOML > default
        let timeout = Self::resolve_timeout(
            cli.timeout
                .or_else(|| section.and_then(|s| s.timeout))
                .unwrap_or(defaults::TIMEOUT_SECS),
        )?;

        let retention_per_id = section
            .and_then(|s| s.retention_per_id)
            .unwrap_or(defaults::RETENTION_PER_ID);

        let ttl_days = section
            .and_then(|s| s.ttl_days)
            .unwrap_or(defaults::TTL_DAYS);

        let allowlist = section.map(|s| s.allowlist.clone()).unwrap_or_default();
        let denylist = section.map(|s| s.denylist.clone()).unwrap_or_default();
        validate_patterns(&allowlist)?;
        validate_patterns(&denylist)?;

        Ok(Settings {
            timeout,
            retention_per_id,
            ttl_days,
            allowlist,
            denylist,
        })
    }

    fn resolve_timeout(seconds: u64) -> Result<Duration, ConfigError> {
        if seconds == 0 {
            return Err(ConfigError::InvalidDuration {
                field: "timeout",
                reason: "must be greater than 0".to_string(),
            });
        }

        if seconds > defaults::MAX_TIMEOUT_SECS {
            return Err(ConfigError::InvalidDuration {
                field: "timeout",
                reason: format!("must be at most {}s", defaults::MAX_TIMEOUT_SECS),
            });
        }

        Ok(Duration::from_secs(seconds))
    }

    fn resolve_log_path(cli: &Cli, toml: Option<&TomlConfig>) -> PathBuf {
        // CLI takes precedence
        if let Some(ref path) = cli.log_file {
            return path.clone();
        }

        toml.and_then(|t| t.log.path.as_deref())
            .map_or_else(|| PathBuf::from(defaults::LOG_PATH), expand_tilde)
    }

    fn build_webhooks(toml: Option<&TomlConfig>) -> Result<Vec<WebhookConfig>, ConfigError> {
        let Some(toml) = toml else {
            return Ok(Vec::new());
        };

        let mut seen = HashSet::new();
        let mut webhooks = Vec::with_capacity(toml.webhooks.len());

        for (index, entry) in toml.webhooks.iter().enumerate() {
            let webhook = validate_webhook(index, entry)?;
            if !seen.insert(webhook.id.clone()) {
                return Err(ConfigError::DuplicateId(webhook.id));
            }
            webhooks.push(webhook);
        }

        Ok(webhooks)
    }
}

/// Writes the default configuration template to a file.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_default_config(path: &Path) -> Result<(), ConfigError> {
    let template = super::toml::default_config_template();
    std::fs::write(path, template).map_err(|e| ConfigError::FileWrite {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Expands a leading `~` to the home directory.
///
/// Paths without `~`, and all paths when no home directory is known, are
/// returned unchanged.
#[must_use]
pub fn expand_tilde(path: &str) -> PathBuf {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with(['/', '\\']) => rest,
        _ => return PathBuf::from(path),
    };

    match dirs::home_dir() {
        Some(home) => home.join(rest.trim_start_matches(['/', '\\'])),
        None => PathBuf::from(path),
    }
}

// Helper functions

fn validate_webhook(index: usize, entry: &WebhookEntry) -> Result<WebhookConfig, ConfigError> {
    let id = required(entry.id.as_deref())
        .ok_or_else(|| ConfigError::missing(format!("#{}", index + 1), field::ID))?;
    let url =
        required(entry.url.as_deref()).ok_or_else(|| ConfigError::missing(&id, field::URL))?;

    check_url(&url, &[], &[]).map_err(|reason| ConfigError::InvalidUrl {
        webhook: id.clone(),
        url: url.clone(),
        reason: reason.to_string(),
    })?;

    let method = match entry.method.as_deref() {
        Some(raw) => raw
            .parse::<Method>()
            .map_err(|source| ConfigError::InvalidMethod {
                webhook: id.clone(),
                source,
            })?,
        None => Method::default(),
    };

    let request_format = match entry.request_format.as_deref() {
        Some(raw) => parse_request_format(&id, raw)?,
        None => RequestFormat::default(),
    };

    let headers = validate_rows(&id, "headers", &entry.headers)?;
    for row in &headers {
        row.key
            .parse::<HeaderName>()
            .map_err(|e| ConfigError::InvalidHeaderName {
                webhook: id.clone(),
                name: row.key.clone(),
                reason: e.to_string(),
            })?;
    }
    let body_mapping = validate_rows(&id, "body_mapping", &entry.body_mapping)?;

    let trigger_when = required(entry.trigger_when.as_deref())
        .map(Trigger::new)
        .unwrap_or_default();

    Ok(WebhookConfig {
        name: entry.name.clone().unwrap_or_else(|| id.clone()),
        enabled: entry.enabled.unwrap_or(true),
        method,
        request_format,
        headers,
        body_mapping,
        trigger_when,
        consent_required: entry.consent_required,
        targeting: entry.targeting.clone(),
        ..WebhookConfig::new(id, url)
    })
}

fn required(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(ToString::to_string)
}

fn validate_rows(
    webhook: &str,
    section: &'static str,
    rows: &[Row],
) -> Result<Vec<Row>, ConfigError> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let key = row.key.trim();
            if key.is_empty() {
                return Err(ConfigError::EmptyKey {
                    webhook: webhook.to_string(),
                    section,
                    row: i + 1,
                });
            }
            Ok(Row::new(key, row.value.clone()))
        })
        .collect()
}

fn parse_request_format(webhook: &str, raw: &str) -> Result<RequestFormat, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "form" => Ok(RequestFormat::Form),
        "json" => Ok(RequestFormat::Json),
        "xml" => Ok(RequestFormat::Xml),
        _ => Err(ConfigError::InvalidFormat {
            webhook: webhook.to_string(),
            value: raw.to_string(),
        }),
    }
}

fn validate_patterns(patterns: &[String]) -> Result<(), ConfigError> {
    for pattern in patterns {
        glob_to_regex(pattern).map_err(|source| ConfigError::InvalidPattern {
            pattern: pattern.clone(),
            source,
        })?;
    }
    Ok(())
}
