//! Session-scoped key/value storage backends
//!
//! Calls are synchronous and treated as fast; there is no retry or timeout.
//! Every failure is returned as a [`StorageError`] so the caller decides how
//! to degrade.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::error::{StorageError, StorageResult};

/// Key holding the serialized [`AudiencePreference`](crate::types::AudiencePreference)
pub const PREFERENCE_KEY: &str = "homepage_audience_preference";
/// Key holding the raw session id
pub const SESSION_ID_KEY: &str = "homepage_session_id";

/// Browser-storage-like key/value backend
pub trait Storage: Send + Sync {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> StorageResult<()>;
    fn remove_item(&self, key: &str) -> StorageResult<()>;
}

/// In-memory storage living as long as the page instance
///
/// An optional byte quota (keys plus values) mimics browser quota errors.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RwLock<HashMap<String, String>>,
    quota: Option<usize>,
    unavailable: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage rejecting writes that would push usage past `bytes`
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            quota: Some(bytes),
            ..Self::default()
        }
    }

    /// Storage where every call fails, as in a sandboxed frame
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    fn check_available(&self) -> StorageResult<()> {
        if self.unavailable {
            Err(StorageError::Unavailable("storage is disabled".to_string()))
        } else {
            Ok(())
        }
    }

    fn poisoned() -> StorageError {
        StorageError::Unavailable("storage lock poisoned".to_string())
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        self.check_available()?;
        let items = self.items.read().map_err(|_| Self::poisoned())?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        self.check_available()?;
        let mut items = self.items.write().map_err(|_| Self::poisoned())?;

        if let Some(quota) = self.quota {
            let others: usize = items
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = others + key.len() + value.len();
            if needed > quota {
                return Err(StorageError::QuotaExceeded {
                    key: key.to_string(),
                    needed,
                    quota,
                });
            }
        }

        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> StorageResult<()> {
        self.check_available()?;
        let mut items = self.items.write().map_err(|_| Self::poisoned())?;
        items.remove(key);
        Ok(())
    }
}

/// Storage persisted to a JSON object file
///
/// Lets a session survive process restarts, the way browser session storage
/// survives page reloads. Writes go to a sibling temp file and are renamed
/// into place.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn load(&self) -> StorageResult<BTreeMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, items: &BTreeMap<String, String>) -> StorageResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(items)?)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!("Saved {} storage item(s) to {}", items.len(), self.path.display());
        Ok(())
    }

    fn update(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> StorageResult<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| StorageError::Unavailable("storage lock poisoned".to_string()))?;
        let mut items = match self.load() {
            Ok(items) => items,
            Err(StorageError::Serialization(e)) => {
                warn!(
                    error = %e,
                    path = %self.path.display(),
                    "Storage file is corrupt, starting it over"
                );
                BTreeMap::new()
            }
            Err(e) => return Err(e),
        };
        f(&mut items);
        self.save(&items)
    }
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.load()?.remove(key))
    }

    fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        self.update(|items| {
            items.insert(key.to_string(), value.to_string());
        })
    }

    fn remove_item(&self, key: &str) -> StorageResult<()> {
        self.update(|items| {
            items.remove(key);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_basic_operations() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get_item("k").unwrap(), None);

        storage.set_item("k", "v1").unwrap();
        storage.set_item("k", "v2").unwrap();
        assert_eq!(storage.get_item("k").unwrap().as_deref(), Some("v2"));

        storage.remove_item("k").unwrap();
        assert_eq!(storage.get_item("k").unwrap(), None);
    }

    #[test]
    fn test_memory_storage_quota() {
        let storage = MemoryStorage::with_quota(10);
        storage.set_item("ab", "cdef").unwrap();

        let err = storage.set_item("key", "too-long-value").unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { quota: 10, .. }));
        assert!(err.to_string().contains("quota exceeded"));

        // Overwriting an existing key only counts the new value
        storage.set_item("ab", "12345678").unwrap();
        assert_eq!(storage.get_item("key").unwrap(), None);
    }

    #[test]
    fn test_unavailable_memory_storage() {
        let storage = MemoryStorage::unavailable();
        assert!(matches!(storage.get_item("k"), Err(StorageError::Unavailable(_))));
        assert!(matches!(storage.set_item("k", "v"), Err(StorageError::Unavailable(_))));
        assert!(matches!(storage.remove_item("k"), Err(StorageError::Unavailable(_))));
    }

    #[test]
    fn test_file_storage_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("session.json");

        let first = FileStorage::new(&path);
        assert_eq!(first.get_item(PREFERENCE_KEY).unwrap(), None);
        first.set_item(SESSION_ID_KEY, "session_1_abc").unwrap();
        first.set_item("other", "x").unwrap();
        first.remove_item("other").unwrap();

        let second = FileStorage::new(&path);
        assert_eq!(
            second.get_item(SESSION_ID_KEY).unwrap().as_deref(),
            Some("session_1_abc")
        );
        assert_eq!(second.get_item("other").unwrap(), None);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_file_storage_recovers_from_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{not json").unwrap();

        let storage = FileStorage::new(&path);
        assert!(matches!(storage.get_item("k"), Err(StorageError::Serialization(_))));

        // A write replaces the unreadable file
        storage.set_item("k", "v").unwrap();
        assert_eq!(storage.get_item("k").unwrap().as_deref(), Some("v"));
        assert_eq!(FileStorage::new(&path).get_item("k").unwrap().as_deref(), Some("v"));
    }
}
