//! In-memory log persistence.

use std::sync::RwLock;

use super::{LoadResult, LogBook, LogStore, LogStoreError};

/// [`LogStore`] that keeps the book in memory.
///
/// Useful when the host keeps its own records, and in tests.
#[derive(Debug, Default)]
pub struct MemoryLogStore {
    book: RwLock<Option<LogBook>>,
}

impl MemoryLogStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the stored book, if anything was saved.
    #[must_use]
    pub fn snapshot(&self) -> Option<LogBook> {
        self.book
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl LogStore for MemoryLogStore {
    fn load(&self) -> LoadResult {
        self.snapshot().map_or(LoadResult::NotFound, LoadResult::Loaded)
    }

    async fn save(&self, book: &LogBook) -> Result<(), LogStoreError> {
        *self
            .book
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(book.clone());
        Ok(())
    }
}
