//! File-based log persistence.

use std::fs::OpenOptions;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use fs4::fs_std::FileExt;
use serde::{Deserialize, Serialize};

use super::{LoadResult, LogBook, LogStore, LogStoreError, StoreLock};

/// Current log file format version.
///
/// Files with another version are treated as corrupted and replaced.
const LOG_FILE_VERSION: u32 = 1;

/// On-disk format.
#[derive(Debug, Serialize, Deserialize)]
struct LogFile {
    version: u32,
    webhooks: LogBook,
}

/// JSON file implementation of [`LogStore`].
///
/// Writes go to `{path}.tmp` first and are renamed over `{path}`, so the
/// file is either the old book or the new one, never a partial write.
///
/// [`LogStore::lock`] takes an exclusive advisory lock on `{path}.lock`, so
/// separate processes appending to the same file do not lose each other's
/// entries.
#[derive(Debug, Clone)]
pub struct FileLogStore {
    path: PathBuf,
}

impl FileLogStore {
    /// Creates a store backed by the file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the path to the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path of the sidecar lock file.
    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        PathBuf::from(format!("{}.lock", self.path.display()))
    }

    fn create_parent(path: &Path) -> io::Result<()> {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
            _ => Ok(()),
        }
    }

    fn lock_blocking(path: &Path) -> Result<StoreLock, LogStoreError> {
        Self::create_parent(path).map_err(LogStoreError::Lock)?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .map_err(LogStoreError::Lock)?;
        file.lock_exclusive().map_err(LogStoreError::Lock)?;
        Ok(StoreLock::file(file))
    }

    fn save_blocking(path: &Path, file: &LogFile) -> Result<(), LogStoreError> {
        let content = serde_json::to_string_pretty(file).map_err(LogStoreError::Serialize)?;

        Self::create_parent(path).map_err(LogStoreError::Write)?;

        // logs.json -> logs.json.tmp, not logs.tmp
        let temp_path = PathBuf::from(format!("{}.tmp", path.display()));
        std::fs::write(&temp_path, content).map_err(LogStoreError::Write)?;
        std::fs::rename(&temp_path, path).map_err(LogStoreError::Write)?;

        Ok(())
    }
}

impl LogStore for FileLogStore {
    fn load(&self) -> LoadResult {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return LoadResult::NotFound,
            Err(e) => {
                return LoadResult::Unavailable {
                    reason: format!("Failed to read {}: {e}", self.path.display()),
                };
            }
        };

        match serde_json::from_str::<LogFile>(&content) {
            Ok(file) if file.version == LOG_FILE_VERSION => LoadResult::Loaded(file.webhooks),
            Ok(file) => LoadResult::Corrupted {
                reason: format!(
                    "Incompatible version: expected {LOG_FILE_VERSION}, got {}",
                    file.version
                ),
            },
            Err(e) => LoadResult::Corrupted {
                reason: format!("Invalid JSON: {e}"),
            },
        }
    }

    async fn lock(&self) -> Result<StoreLock, LogStoreError> {
        let path = self.lock_path();

        match tokio::task::spawn_blocking(move || Self::lock_blocking(&path)).await {
            Ok(result) => result,
            Err(e) => Err(LogStoreError::Lock(io::Error::other(e))),
        }
    }

    async fn save(&self, book: &LogBook) -> Result<(), LogStoreError> {
        let path = self.path.clone();
        let file = LogFile {
            version: LOG_FILE_VERSION,
            webhooks: book.clone(),
        };

        match tokio::task::spawn_blocking(move || Self::save_blocking(&path, &file)).await {
            Ok(result) => result,
            Err(e) => Err(LogStoreError::Write(io::Error::other(e))),
        }
    }
}
