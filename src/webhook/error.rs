//! Transport error types.

use thiserror::Error;

/// Failure to complete an HTTP exchange.
///
/// Non-2xx responses are not errors; they are completed exchanges.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Network connection failed (DNS, refused connection, TLS, reset).
    #[error("Connection error: {0}")]
    Connection(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The server did not answer within the configured timeout.
    #[error("Request timed out")]
    Timeout,

    /// The URL or request could not be built.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The HTTP client itself could not be set up.
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl HttpError {
    /// Stable code recorded in place of an HTTP status.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection_failed",
            Self::Timeout => "timeout",
            Self::InvalidUrl(_) => "invalid_url",
            Self::Client(_) => "client_error",
        }
    }
}
