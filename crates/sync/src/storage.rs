//! Durable key-value storage for the client.
//!
//! The cart and the session are mirrored into a small string key-value store,
//! the client-side equivalent of browser local storage. [`FileStorage`] keeps
//! one file per key; [`MemoryStorage`] lives in process and is used for
//! ephemeral sessions and tests.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tracing::debug;

/// Errors from a durable storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed.
    #[error("storage I/O error: {0}")]
    Io(#[from] io::Error),

    /// Value could not be serialized.
    #[error("storage serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Key contains characters that are not allowed.
    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    /// Backend refused the write.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// A synchronous string key-value store.
pub trait DurableStorage: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key`. Deleting a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Storage shared between the mirror store and the session context.
pub type SharedStorage = Arc<dyn DurableStorage>;

// =============================================================================
// FileStorage
// =============================================================================

/// One JSON file per key inside a data directory.
///
/// Writes go to a temporary file that is renamed into place, so a crash
/// mid-write never leaves a truncated value behind.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Open (creating if needed) the storage directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        debug!(dir = %dir.display(), "opened file storage");
        Ok(Self { dir })
    }

    /// The storage directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl DurableStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)?) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)?) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

// =============================================================================
// MemoryStorage
// =============================================================================

/// In-process storage. Counts writes per key so callers can observe
/// persistence side effects.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
    writes: Mutex<HashMap<String, usize>>,
    read_only: AtomicBool,
}

impl MemoryStorage {
    /// Empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-populated with one entry (not counted as a write).
    #[must_use]
    pub fn with_entry(key: &str, value: &str) -> Self {
        let storage = Self::new();
        lock(&storage.entries).insert(key.to_string(), value.to_string());
        storage
    }

    /// Number of `set`/`remove` calls made for `key`, including refused ones.
    #[must_use]
    pub fn writes_to(&self, key: &str) -> usize {
        lock(&self.writes).get(key).copied().unwrap_or(0)
    }

    /// Make every subsequent write fail with [`StorageError::Unavailable`].
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    fn record_write(&self, key: &str) -> Result<(), StorageError> {
        *lock(&self.writes).entry(key.to_string()).or_insert(0) += 1;
        if self.read_only.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("storage is read-only".to_string()));
        }
        Ok(())
    }
}

impl DurableStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(lock(&self.entries).get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.record_write(key)?;
        lock(&self.entries).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.record_write(key)?;
        lock(&self.entries).remove(key);
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_file_storage_roundtrip() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();
        assert_eq!(storage.dir(), dir.path());

        assert_eq!(storage.get("cartItems").unwrap(), None);
        storage.set("cartItems", "[]").unwrap();
        assert_eq!(storage.get("cartItems").unwrap().as_deref(), Some("[]"));
        storage.set("cartItems", "[1]").unwrap();
        assert_eq!(storage.get("cartItems").unwrap().as_deref(), Some("[1]"));

        storage.remove("cartItems").unwrap();
        assert_eq!(storage.get("cartItems").unwrap(), None);
        storage.remove("cartItems").unwrap();
        assert!(!dir.path().join("cartItems.json.tmp").exists());
    }

    #[test]
    fn test_file_storage_creates_nested_dir() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("profile").join("data");
        let storage = FileStorage::open(&nested).unwrap();
        storage.set("token", "abc").unwrap();
        assert_eq!(
            fs::read_to_string(nested.join("token.json")).unwrap(),
            "abc"
        );
    }

    #[test]
    fn test_file_storage_rejects_path_keys() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();
        assert!(matches!(
            storage.set("../escape", "x"),
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(storage.get(""), Err(StorageError::InvalidKey(_))));
    }

    #[test]
    fn test_memory_storage_counts_writes() {
        let storage = MemoryStorage::with_entry("token", "abc");
        assert_eq!(storage.writes_to("token"), 0);
        storage.set("token", "def").unwrap();
        storage.remove("token").unwrap();
        assert_eq!(storage.writes_to("token"), 2);
        assert_eq!(storage.get("token").unwrap(), None);
    }

    #[test]
    fn test_memory_storage_read_only() {
        let storage = MemoryStorage::new();
        storage.set_read_only(true);
        assert!(matches!(
            storage.set("k", "v"),
            Err(StorageError::Unavailable(_))
        ));
        assert_eq!(storage.get("k").unwrap(), None);
        storage.set_read_only(false);
        storage.set("k", "v").unwrap();
        assert_eq!(storage.get("k").unwrap().as_deref(), Some("v"));
    }
}
