//! Error types for configuration parsing and validation.

use std::path::PathBuf;

use thiserror::Error;

/// Error type for configuration operations.
///
/// Covers errors from parsing, validation, and file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("Failed to read config file '{}': {source}", path.display())]
    FileRead {
        /// Path to the config file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("Failed to parse TOML config: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Failed to write configuration file (for init command).
    #[error("Failed to write config file '{}': {source}", path.display())]
    FileWrite {
        /// Path to the config file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A webhook lacks a required field.
    #[error("Webhook {webhook}: missing required field '{field}'")]
    MissingRequired {
        /// Webhook id, or its position when the id itself is missing
        webhook: String,
        /// Name of the missing field
        field: &'static str,
    },

    /// Two webhooks share an id.
    #[error("Duplicate webhook id '{0}'")]
    DuplicateId(String),

    /// Invalid webhook URL.
    #[error("Webhook {webhook}: invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// Webhook id
        webhook: String,
        /// The invalid URL string
        url: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Invalid HTTP method.
    #[error("Webhook {webhook}: {source}")]
    InvalidMethod {
        /// Webhook id
        webhook: String,
        /// Parse error naming the method
        #[source]
        source: crate::webhook::UnsupportedMethod,
    },

    /// Invalid request format.
    #[error("Webhook {webhook}: invalid request format '{value}': expected form, json, or xml")]
    InvalidFormat {
        /// Webhook id
        webhook: String,
        /// The invalid value provided
        value: String,
    },

    /// A header or mapping row has an empty key.
    #[error("Webhook {webhook}: {section} row {row} has an empty key")]
    EmptyKey {
        /// Webhook id
        webhook: String,
        /// `headers` or `body_mapping`
        section: &'static str,
        /// 1-based row number
        row: usize,
    },

    /// Invalid header name.
    #[error("Webhook {webhook}: invalid header name '{name}': {reason}")]
    InvalidHeaderName {
        /// Webhook id
        webhook: String,
        /// The invalid header name
        name: String,
        /// Reason for invalidity
        reason: String,
    },

    /// Invalid host glob pattern in an allow or deny list.
    #[error("Invalid host pattern '{pattern}': {source}")]
    InvalidPattern {
        /// The invalid pattern
        pattern: String,
        /// Underlying regex error
        #[source]
        source: regex::Error,
    },

    /// Invalid duration value (zero or too large).
    #[error("Invalid duration for {field}: {reason}")]
    InvalidDuration {
        /// Name of the field
        field: &'static str,
        /// Reason for invalidity
        reason: String,
    },
}

/// Well-known field names for `MissingRequired` errors.
///
/// Use these constants for compile-time safety when matching field names.
pub mod field {
    /// The webhook id field.
    pub const ID: &str = "id";
    /// The webhook URL field.
    pub const URL: &str = "url";
}

impl ConfigError {
    /// Creates a `MissingRequired` error for a webhook field.
    #[must_use]
    pub fn missing(webhook: impl Into<String>, field: &'static str) -> Self {
        Self::MissingRequired {
            webhook: webhook.into(),
            field,
        }
    }
}
