//! Log entry records and the masking/truncation applied before storage.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::context::Trigger;

/// Replacement text for sensitive header values.
pub const MASK: &str = "***";

/// Maximum number of characters of a body kept in a log entry.
pub const BODY_LIMIT: usize = 2000;

/// Appended to bodies cut at [`BODY_LIMIT`].
pub const ELLIPSIS: &str = "...";

/// Header names whose values never reach the log.
pub const SENSITIVE_HEADERS: [&str; 6] = [
    "authorization",
    "api_key",
    "api-key",
    "token",
    "x-api-key",
    "x-auth-token",
];

/// Outcome code of one attempt: an HTTP status or a transport error code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeliveryStatus {
    /// The exchange completed with this HTTP status.
    Http(u16),
    /// The exchange failed before a response arrived.
    Transport(String),
}

impl DeliveryStatus {
    /// Returns true for a completed exchange with a 2xx status.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Http(code) if *code >= 200 && *code < 300)
    }
}

impl Default for DeliveryStatus {
    fn default() -> Self {
        Self::Transport(String::new())
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http(code) => write!(f, "{code}"),
            Self::Transport(code) => f.write_str(code),
        }
    }
}

/// Masked header map as stored in a log entry.
pub type HeaderSnapshot = BTreeMap<String, String>;

/// What was sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestSnapshot {
    pub url: String,
    pub method: String,
    pub headers: HeaderSnapshot,
    pub body: String,
}

/// What came back, or the transport error message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseSnapshot {
    pub headers: HeaderSnapshot,
    pub body: String,
}

/// One delivery attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Unix seconds, stamped by the logger.
    #[serde(default)]
    pub timestamp: u64,
    #[serde(default)]
    pub webhook_id: String,
    pub status_code: DeliveryStatus,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub request: RequestSnapshot,
    #[serde(default)]
    pub response: ResponseSnapshot,
    #[serde(default)]
    pub trigger_when: Trigger,
}

/// Returns true if a header's value must be masked in logs.
#[must_use]
pub fn is_sensitive(name: &str) -> bool {
    let name = name.trim().to_ascii_lowercase();
    SENSITIVE_HEADERS.contains(&name.as_str())
}

/// Builds a log-safe copy of headers: names lower-cased, sensitive values
/// replaced with [`MASK`].
pub fn mask_headers<I, K, V>(headers: I) -> HeaderSnapshot
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    headers
        .into_iter()
        .map(|(name, value)| {
            let name = name.as_ref().trim().to_ascii_lowercase();
            let value = if is_sensitive(&name) {
                MASK.to_string()
            } else {
                value.as_ref().to_string()
            };
            (name, value)
        })
        .collect()
}

/// Masks an `http` header map; non-text values are shown lossily.
#[must_use]
pub fn mask_header_map(headers: &http::HeaderMap) -> HeaderSnapshot {
    mask_headers(
        headers
            .iter()
            .map(|(name, value)| (name.as_str(), String::from_utf8_lossy(value.as_bytes()))),
    )
}

/// Cuts `body` to [`BODY_LIMIT`] characters, marking the cut with [`ELLIPSIS`].
#[must_use]
pub fn truncate_body(body: &str) -> String {
    match body.char_indices().nth(BODY_LIMIT) {
        Some((cut, _)) => format!("{}{ELLIPSIS}", &body[..cut]),
        None => body.to_string(),
    }
}
