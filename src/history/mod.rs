//! Bounded per-webhook execution history.
//!
//! Every delivery attempt produces one [`LogEntry`]. Entries are kept in a
//! [`LogBook`]: one bucket per webhook id, newest first. Each append trims
//! the bucket to the retention count and then drops entries past the TTL.
//!
//! Persistence goes through a [`LogStore`]:
//! - [`FileLogStore`] keeps the book in a JSON file with atomic writes and
//!   an advisory lock file shared by every process using the same path
//! - [`MemoryLogStore`] keeps it in memory

mod entry;
mod file;
mod logger;
mod memory;

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

use std::collections::BTreeMap;
use std::fs::File;
use std::io;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use entry::{
    BODY_LIMIT, DeliveryStatus, ELLIPSIS, HeaderSnapshot, LogEntry, MASK, RequestSnapshot,
    ResponseSnapshot, SENSITIVE_HEADERS, is_sensitive, mask_header_map, mask_headers,
    truncate_body,
};
pub use file::FileLogStore;
pub use logger::Logger;
pub use memory::MemoryLogStore;

const SECONDS_PER_DAY: u64 = 86_400;

/// All buckets, keyed by webhook id. Each bucket is newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogBook {
    buckets: BTreeMap<String, Vec<LogEntry>>,
}

impl LogBook {
    /// Creates an empty book.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the bucket for `webhook_id`, newest first.
    #[must_use]
    pub fn bucket(&self, webhook_id: &str) -> &[LogEntry] {
        self.buckets.get(webhook_id).map_or(&[], Vec::as_slice)
    }

    /// Returns the ids that have a bucket.
    pub fn webhook_ids(&self) -> impl Iterator<Item = &str> {
        self.buckets.keys().map(String::as_str)
    }

    /// Removes the bucket for `webhook_id`, returning how many entries it held.
    pub fn remove(&mut self, webhook_id: &str) -> usize {
        self.buckets.remove(webhook_id).map_or(0, |b| b.len())
    }

    /// Prepends `entry` to its bucket, then enforces the bounds.
    ///
    /// `retention` of 0 keeps any number of entries; `ttl_days` of 0 keeps
    /// entries of any age. The count bound is applied before the age bound.
    pub fn append(&mut self, entry: LogEntry, retention: usize, ttl_days: u64, now: u64) {
        let bucket = self.buckets.entry(entry.webhook_id.clone()).or_default();
        bucket.insert(0, entry);

        if retention > 0 && bucket.len() > retention {
            bucket.truncate(retention);
        }

        if ttl_days > 0 {
            let cutoff = now.saturating_sub(ttl_days.saturating_mul(SECONDS_PER_DAY));
            bucket.retain(|e| e.timestamp >= cutoff);
        }
    }
}

/// Result of loading the book from persistent storage.
#[derive(Debug, Clone)]
pub enum LoadResult {
    /// A previously saved book.
    Loaded(LogBook),

    /// Nothing saved yet.
    NotFound,

    /// Saved data exists but is not a valid book. The next save overwrites it.
    Corrupted {
        /// Reason for corruption (for logging/debugging).
        reason: String,
    },

    /// Saved data exists but could not be read (permissions, I/O, encoding).
    /// It must not be overwritten.
    Unavailable {
        /// Underlying read failure.
        reason: String,
    },
}

impl LoadResult {
    /// Returns the loaded book, or an empty book otherwise.
    #[must_use]
    pub fn into_book(self) -> LogBook {
        match self {
            Self::Loaded(book) => book,
            Self::NotFound | Self::Corrupted { .. } | Self::Unavailable { .. } => LogBook::new(),
        }
    }

    /// Returns the book to modify and save.
    ///
    /// `NotFound` and `Corrupted` start from an empty book.
    ///
    /// # Errors
    ///
    /// Returns [`LogStoreError::Unavailable`] when saving would overwrite
    /// history that merely failed to load.
    pub fn into_writable_book(self) -> Result<LogBook, LogStoreError> {
        match self {
            Self::Unavailable { reason } => Err(LogStoreError::Unavailable(reason)),
            other => Ok(other.into_book()),
        }
    }

    /// Returns `true` if a book was successfully loaded.
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }
}

/// Errors writing the book.
#[derive(Debug, Error)]
pub enum LogStoreError {
    /// Failed to write the log file.
    #[error("Failed to write log file: {0}")]
    Write(#[source] io::Error),

    /// Failed to serialize the book.
    #[error("Failed to serialize log book: {0}")]
    Serialize(#[source] serde_json::Error),

    /// The stored book could not be read, so it was left untouched.
    #[error("Log file unreadable: {0}")]
    Unavailable(String),

    /// Failed to acquire the store lock.
    #[error("Failed to lock log file: {0}")]
    Lock(#[source] io::Error),
}

/// Exclusive access to a store for one load-modify-save cycle.
///
/// Released when dropped.
#[derive(Debug, Default)]
pub struct StoreLock {
    _file: Option<File>,
}

impl StoreLock {
    /// A lock backed by a locked file handle.
    pub(crate) const fn file(file: File) -> Self {
        Self { _file: Some(file) }
    }
}

/// Persistence for the [`LogBook`].
///
/// Loads degrade gracefully (see [`LoadResult`]); only saves can fail.
pub trait LogStore: Send + Sync {
    /// Loads the whole book.
    fn load(&self) -> LoadResult;

    /// Waits for exclusive access to the store.
    ///
    /// Stores shared only within one process need no lock of their own.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock cannot be acquired.
    fn lock(
        &self,
    ) -> impl std::future::Future<Output = Result<StoreLock, LogStoreError>> + Send {
        async { Ok(StoreLock::default()) }
    }

    /// Replaces the stored book.
    ///
    /// # Errors
    ///
    /// Returns an error if the book cannot be written.
    fn save(
        &self,
        book: &LogBook,
    ) -> impl std::future::Future<Output = Result<(), LogStoreError>> + Send;
}

impl<T: LogStore> LogStore for Arc<T> {
    fn load(&self) -> LoadResult {
        (**self).load()
    }

    async fn lock(&self) -> Result<StoreLock, LogStoreError> {
        (**self).lock().await
    }

    async fn save(&self, book: &LogBook) -> Result<(), LogStoreError> {
        (**self).save(book).await
    }
}
