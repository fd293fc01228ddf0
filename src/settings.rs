//! Runtime settings consumed by the sender and the logger.
//!
//! Settings are read through a [`SettingsProvider`] on every operation, so a
//! provider may change its answers between two sends.

use std::sync::Arc;
use std::time::Duration;

use crate::config::defaults;

/// Environment variable overriding the request timeout, in seconds.
pub const ENV_TIMEOUT: &str = "FORMHOOK_TIMEOUT";
/// Environment variable overriding the per-webhook log retention.
pub const ENV_RETENTION_PER_ID: &str = "FORMHOOK_RETENTION_PER_ID";
/// Environment variable overriding the log TTL, in days.
pub const ENV_TTL_DAYS: &str = "FORMHOOK_TTL_DAYS";
/// Environment variable overriding the host allowlist (comma-separated).
pub const ENV_ALLOWLIST: &str = "FORMHOOK_ALLOWLIST";
/// Environment variable overriding the host denylist (comma-separated).
pub const ENV_DENYLIST: &str = "FORMHOOK_DENYLIST";

/// Snapshot of delivery and retention settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Upper bound for one HTTP exchange.
    pub timeout: Duration,
    /// Log entries kept per webhook; 0 disables the count limit.
    pub retention_per_id: usize,
    /// Maximum age of a log entry in days; 0 disables age pruning.
    pub ttl_days: u64,
    /// Host glob patterns; when non-empty only matching hosts are allowed.
    pub allowlist: Vec<String>,
    /// Host glob patterns that are always rejected.
    pub denylist: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timeout: defaults::timeout(),
            retention_per_id: defaults::RETENTION_PER_ID,
            ttl_days: defaults::TTL_DAYS,
            allowlist: Vec::new(),
            denylist: Vec::new(),
        }
    }
}

/// Source of [`Settings`].
pub trait SettingsProvider: Send + Sync {
    /// Returns the current settings.
    fn settings(&self) -> Settings;
}

impl<T: SettingsProvider + ?Sized> SettingsProvider for Arc<T> {
    fn settings(&self) -> Settings {
        (**self).settings()
    }
}

/// Provider that always returns the same settings.
#[derive(Debug, Clone, Default)]
pub struct StaticSettings(pub Settings);

impl SettingsProvider for StaticSettings {
    fn settings(&self) -> Settings {
        self.0.clone()
    }
}

/// Provider that overlays environment variables on a base provider.
///
/// Variables are looked up on every call. Values that fail to parse are
/// ignored and the base value is kept.
pub struct EnvSettings<P> {
    base: P,
    lookup: Box<dyn Fn(&str) -> Option<String> + Send + Sync>,
}

impl<P: SettingsProvider> EnvSettings<P> {
    /// Overlays the process environment on `base`.
    #[must_use]
    pub fn new(base: P) -> Self {
        Self::with_lookup(base, |name| std::env::var(name).ok())
    }

    /// Overlays a custom variable source on `base`.
    #[must_use]
    pub fn with_lookup(
        base: P,
        lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            base,
            lookup: Box::new(lookup),
        }
    }

    fn var<T: std::str::FromStr>(&self, name: &str) -> Option<T> {
        let raw = (self.lookup)(name)?;
        let parsed = raw.trim().parse().ok();
        if parsed.is_none() {
            tracing::warn!("Ignoring invalid value for {name}: {raw:?}");
        }
        parsed
    }

    fn list(&self, name: &str) -> Option<Vec<String>> {
        (self.lookup)(name).map(|raw| split_patterns(&raw))
    }
}

impl<P> std::fmt::Debug for EnvSettings<P>
where
    P: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvSettings")
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

impl<P: SettingsProvider> SettingsProvider for EnvSettings<P> {
    fn settings(&self) -> Settings {
        let mut settings = self.base.settings();

        match self.var::<u64>(ENV_TIMEOUT) {
            Some(secs @ 1..=defaults::MAX_TIMEOUT_SECS) => {
                settings.timeout = Duration::from_secs(secs);
            }
            Some(secs) => tracing::warn!(
                "Ignoring {ENV_TIMEOUT}={secs}: must be between 1 and {} seconds",
                defaults::MAX_TIMEOUT_SECS
            ),
            None => {}
        }
        if let Some(retention) = self.var(ENV_RETENTION_PER_ID) {
            settings.retention_per_id = retention;
        }
        if let Some(days) = self.var(ENV_TTL_DAYS) {
            settings.ttl_days = days;
        }
        if let Some(allowlist) = self.list(ENV_ALLOWLIST) {
            settings.allowlist = allowlist;
        }
        if let Some(denylist) = self.list(ENV_DENYLIST) {
            settings.denylist = denylist;
        }

        settings
    }
}

/// Splits a comma-separated pattern list, dropping blanks.
#[must_use]
pub fn split_patterns(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> + Send + Sync + 'static {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn static_settings_returns_base() {
        let provider = StaticSettings(Settings {
            retention_per_id: 3,
            ..Settings::default()
        });
        assert_eq!(provider.settings().retention_per_id, 3);
    }

    #[test]
    fn env_overrides_scalars() {
        let provider = EnvSettings::with_lookup(
            StaticSettings::default(),
            env(&[
                (ENV_TIMEOUT, "3"),
                (ENV_RETENTION_PER_ID, "7"),
                (ENV_TTL_DAYS, " 2 "),
            ]),
        );

        let settings = provider.settings();
        assert_eq!(settings.timeout, Duration::from_secs(3));
        assert_eq!(settings.retention_per_id, 7);
        assert_eq!(settings.ttl_days, 2);
    }

    #[test]
    fn env_overrides_lists() {
        let provider = EnvSettings::with_lookup(
            StaticSettings::default(),
            env(&[(ENV_ALLOWLIST, "*.example.com, hooks.test ,"), (ENV_DENYLIST, "")]),
        );

        let settings = provider.settings();
        assert_eq!(settings.allowlist, vec!["*.example.com", "hooks.test"]);
        assert!(settings.denylist.is_empty());
    }

    #[test]
    fn invalid_env_value_keeps_base() {
        let provider = EnvSettings::with_lookup(
            StaticSettings::default(),
            env(&[(ENV_TIMEOUT, "soon")]),
        );
        assert_eq!(provider.settings().timeout, defaults::timeout());
    }

    #[test]
    fn out_of_range_timeout_keeps_base() {
        let base = StaticSettings(Settings {
            timeout: Duration::from_secs(20),
            ..Settings::default()
        });
        let too_long = (defaults::MAX_TIMEOUT_SECS + 1).to_string();

        for raw in ["0", too_long.as_str()] {
            let provider = EnvSettings::with_lookup(base.clone(), env(&[(ENV_TIMEOUT, raw)]));
            assert_eq!(provider.settings().timeout, Duration::from_secs(20), "{raw}");
        }
    }

    #[test]
    fn timeout_at_upper_bound_is_accepted() {
        let max = defaults::MAX_TIMEOUT_SECS.to_string();
        let provider = EnvSettings::with_lookup(
            StaticSettings::default(),
            env(&[(ENV_TIMEOUT, max.as_str())]),
        );
        assert_eq!(
            provider.settings().timeout,
            Duration::from_secs(defaults::MAX_TIMEOUT_SECS)
        );
    }

    #[test]
    fn missing_env_keeps_base() {
        let provider = EnvSettings::with_lookup(StaticSettings::default(), env(&[]));
        assert_eq!(provider.settings(), Settings::default());
    }
}
