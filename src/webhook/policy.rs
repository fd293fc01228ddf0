//! Destination policy applied before any request is attempted.
//!
//! # Rules
//!
//! 1. The URL must parse and use the `http` or `https` scheme.
//! 2. The host must be present and must not name the local machine:
//!    `localhost` (with or without a trailing dot), any 127.0.0.0/8 address,
//!    `::1`, the unspecified addresses, or an IPv4-mapped loopback address.
//! 3. The host must not match any denylist pattern.
//! 4. If an allowlist is configured, the host must match one of its patterns.
//!
//! Patterns are shell-style globs over the host name (`*.example.com`,
//! `hooks-?.test`), matched case-insensitively.

use std::net::{Ipv4Addr, Ipv6Addr};

use regex::Regex;
use thiserror::Error;
use url::{Host, Url};

use crate::settings::Settings;

/// Reason a destination was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyRejection {
    /// No URL configured.
    #[error("destination URL is empty")]
    EmptyUrl,

    /// The URL could not be parsed.
    #[error("destination URL '{url}' is invalid: {reason}")]
    Unparseable {
        /// The rejected URL
        url: String,
        /// Parser message
        reason: String,
    },

    /// Scheme other than http/https.
    #[error("scheme '{0}' is not allowed")]
    Scheme(String),

    /// URL without a host.
    #[error("destination URL has no host")]
    MissingHost,

    /// Host refers to the local machine.
    #[error("loopback host '{0}' is not allowed")]
    Loopback(String),

    /// Host matched a denylist pattern.
    #[error("host '{host}' matches denylist pattern '{pattern}'")]
    Denied {
        /// The rejected host
        host: String,
        /// The matching pattern
        pattern: String,
    },

    /// Allowlist configured and the host matched none of it.
    #[error("host '{0}' is not on the allowlist")]
    NotAllowlisted(String),
}

/// Checks `url` against the destination policy and returns it parsed.
///
/// # Errors
///
/// Returns the first [`PolicyRejection`] rule the URL violates.
pub fn check_url(
    url: &str,
    allowlist: &[String],
    denylist: &[String],
) -> Result<Url, PolicyRejection> {
    let url = url.trim();
    if url.is_empty() {
        return Err(PolicyRejection::EmptyUrl);
    }

    let parsed = Url::parse(url).map_err(|e| PolicyRejection::Unparseable {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    // The parser lower-cases schemes and hosts.
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(PolicyRejection::Scheme(parsed.scheme().to_string()));
    }

    let host = parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or(PolicyRejection::MissingHost)?
        .to_string();

    if parsed.host().is_some_and(|h| is_local_host(&h)) {
        return Err(PolicyRejection::Loopback(host));
    }

    if let Some(pattern) = denylist.iter().find(|p| glob_matches(p, &host)) {
        return Err(PolicyRejection::Denied {
            host,
            pattern: pattern.clone(),
        });
    }

    if !allowlist.is_empty() && !allowlist.iter().any(|p| glob_matches(p, &host)) {
        return Err(PolicyRejection::NotAllowlisted(host));
    }

    Ok(parsed)
}

fn is_local_host(host: &Host<&str>) -> bool {
    match host {
        Host::Domain(name) => name.trim_end_matches('.').eq_ignore_ascii_case("localhost"),
        Host::Ipv4(addr) => is_local_v4(*addr),
        Host::Ipv6(addr) => is_local_v6(addr),
    }
}

const fn is_local_v4(addr: Ipv4Addr) -> bool {
    addr.is_loopback() || addr.is_unspecified()
}

fn is_local_v6(addr: &Ipv6Addr) -> bool {
    addr.is_loopback() || addr.is_unspecified() || addr.to_ipv4_mapped().is_some_and(is_local_v4)
}

/// Returns true if `url` passes the destination policy under `settings`.
///
/// ```
/// use formhook::settings::Settings;
/// use formhook::webhook::is_url_allowed;
///
/// let settings = Settings::default();
/// assert!(is_url_allowed("https://example.com", &settings));
/// assert!(!is_url_allowed("http://localhost/x", &settings));
/// ```
#[must_use]
pub fn is_url_allowed(url: &str, settings: &Settings) -> bool {
    check_url(url, &settings.allowlist, &settings.denylist).is_ok()
}

/// Matches `host` against a shell-style glob (`*` any run, `?` one char).
#[must_use]
pub fn glob_matches(pattern: &str, host: &str) -> bool {
    let pattern = pattern.trim();
    if pattern.is_empty() {
        return false;
    }
    glob_to_regex(pattern).is_ok_and(|re| re.is_match(host))
}

/// Compiles a glob into an anchored, case-insensitive regex.
///
/// # Errors
///
/// Returns the regex error if the translated pattern exceeds regex limits.
pub fn glob_to_regex(pattern: &str) -> Result<Regex, regex::Error> {
    let mut source = String::with_capacity(pattern.len() + 8);
    source.push_str("(?i)^");
    for c in pattern.chars() {
        match c {
            '*' => source.push_str(".*"),
            '?' => source.push('.'),
            other => source.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    source.push('$');
    Regex::new(&source)
}
