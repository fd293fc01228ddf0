//! Appends delivery attempts to the bounded history.

use std::sync::Arc;

use tokio::sync::Mutex;

use super::{LoadResult, LogBook, LogEntry, LogStore, LogStoreError};
use crate::settings::SettingsProvider;
use crate::time::{Clock, SystemClock};

/// Records delivery attempts into a [`LogStore`].
///
/// Retention and TTL are read from the settings provider on every append.
/// Load-modify-save cycles are serialized, within this logger by a mutex and
/// across loggers and processes by [`LogStore::lock`], so concurrent appends
/// never lose entries or trim against a stale book.
///
/// A book that exists but cannot be read is never overwritten: the new entry
/// is dropped instead.
pub struct Logger<S> {
    store: S,
    settings: Arc<dyn SettingsProvider>,
    clock: Arc<dyn Clock>,
    write_lock: Mutex<()>,
}

impl<S: LogStore> Logger<S> {
    /// Creates a logger using the system clock.
    #[must_use]
    pub fn new(store: S, settings: Arc<dyn SettingsProvider>) -> Self {
        Self::with_clock(store, settings, Arc::new(SystemClock))
    }

    /// Creates a logger with a custom clock.
    #[must_use]
    pub fn with_clock(store: S, settings: Arc<dyn SettingsProvider>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            settings,
            clock,
            write_lock: Mutex::new(()),
        }
    }

    /// Current time in Unix seconds, as used to stamp entries.
    #[must_use]
    pub fn now(&self) -> u64 {
        self.clock.unix_seconds()
    }

    /// Stamps `entry` and prepends it to the bucket for `webhook_id`, then
    /// trims the bucket by count and age and persists the book.
    ///
    /// Never fails: a persistence error is logged and the entry is lost.
    pub async fn log(&self, webhook_id: &str, mut entry: LogEntry) {
        let settings = self.settings.settings();
        let now = self.clock.unix_seconds();

        entry.timestamp = now;
        entry.webhook_id = webhook_id.to_string();

        let result = self
            .update(|book| {
                book.append(entry, settings.retention_per_id, settings.ttl_days, now);
                true
            })
            .await;

        if let Err(e) = result {
            tracing::error!("Failed to persist log entry for webhook {webhook_id}: {e}");
        }
    }

    /// Returns the entries recorded for `webhook_id`, newest first.
    #[must_use]
    pub fn entries(&self, webhook_id: &str) -> Vec<LogEntry> {
        self.load_book().bucket(webhook_id).to_vec()
    }

    /// Deletes every entry recorded for `webhook_id`, returning how many
    /// were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the book cannot be locked, read or written.
    pub async fn clear(&self, webhook_id: &str) -> Result<usize, LogStoreError> {
        let mut removed = 0;
        self.update(|book| {
            removed = book.remove(webhook_id);
            removed > 0
        })
        .await?;
        Ok(removed)
    }

    /// Runs one locked load-modify-save cycle. `apply` returns whether the
    /// book changed and needs saving.
    async fn update(
        &self,
        apply: impl FnOnce(&mut LogBook) -> bool + Send,
    ) -> Result<(), LogStoreError> {
        let _guard = self.write_lock.lock().await;
        let _store_lock = self.store.lock().await?;

        let result = self.store.load();
        if let LoadResult::Corrupted { reason } = &result {
            tracing::warn!("Log store corrupted ({reason}), starting from an empty log");
        }

        let mut book = result.into_writable_book()?;
        if apply(&mut book) {
            self.store.save(&book).await?;
        }
        Ok(())
    }

    fn load_book(&self) -> LogBook {
        let result = self.store.load();
        match &result {
            LoadResult::Corrupted { reason } | LoadResult::Unavailable { reason } => {
                tracing::warn!("Log store not readable ({reason})");
            }
            LoadResult::Loaded(_) | LoadResult::NotFound => {}
        }
        result.into_book()
    }
}

impl<S: std::fmt::Debug> std::fmt::Debug for Logger<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}
