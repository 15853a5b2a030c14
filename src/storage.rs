//! Key/value persistence for dApp state.
//!
//! Collections are stored as serialized JSON strings under fixed keys, the
//! same way the browser dApp kept them in local storage.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::error::{DappError, DappResult};

/// A string key/value store
pub trait Storage: Send + Sync {
    fn load(&self, key: &str) -> DappResult<Option<String>>;
    fn save(&self, key: &str, value: &str) -> DappResult<()>;
    fn remove(&self, key: &str) -> DappResult<()>;
}

/// Loads and deserializes a JSON value stored under `key`
pub fn load_json<T: DeserializeOwned>(storage: &dyn Storage, key: &str) -> DappResult<Option<T>> {
    match storage.load(key)? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Serializes `value` as JSON under `key`
pub fn save_json<T: Serialize + ?Sized>(storage: &dyn Storage, key: &str, value: &T) -> DappResult<()> {
    storage.save(key, &serde_json::to_string(value)?)
}

/// Volatile storage
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn load(&self, key: &str) -> DappResult<Option<String>> {
        Ok(self.values.lock().map_err(poisoned)?.get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> DappResult<()> {
        self.values
            .lock()
            .map_err(poisoned)?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> DappResult<()> {
        self.values.lock().map_err(poisoned)?.remove(key);
        Ok(())
    }
}

/// Storage kept in a single JSON object file
///
/// Every write rewrites the whole file through a temporary sibling and a rename.
#[derive(Debug)]
pub struct JsonFileStorage {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl JsonFileStorage {
    /// Opens the file, starting empty when it does not exist yet
    pub fn open(path: impl AsRef<Path>) -> DappResult<Self> {
        let path = path.as_ref().to_path_buf();
        let values = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            if raw.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&raw)
                    .map_err(|e| DappError::Storage(format!("{} is not a storage file: {}", path.display(), e)))?
            }
        } else {
            BTreeMap::new()
        };
        debug!(path = %path.display(), keys = values.len(), "opened storage");

        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    fn flush(&self, values: &BTreeMap<String, String>) -> DappResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(values)?)?;
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }
}

impl Storage for JsonFileStorage {
    fn load(&self, key: &str) -> DappResult<Option<String>> {
        Ok(self.values.lock().map_err(poisoned)?.get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> DappResult<()> {
        let mut values = self.values.lock().map_err(poisoned)?;
        let mut next = values.clone();
        next.insert(key.to_string(), value.to_string());
        self.flush(&next)?;
        *values = next;
        Ok(())
    }

    fn remove(&self, key: &str) -> DappResult<()> {
        let mut values = self.values.lock().map_err(poisoned)?;
        if !values.contains_key(key) {
            return Ok(());
        }
        let mut next = values.clone();
        next.remove(key);
        self.flush(&next)?;
        *values = next;
        Ok(())
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> DappError {
    DappError::Storage("storage lock poisoned".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_memory_storage() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.load("keys").unwrap(), None);

        save_json(&storage, "keys", &vec!["a", "b"]).unwrap();
        let loaded: Option<Vec<String>> = load_json(&storage, "keys").unwrap();
        assert_eq!(loaded, Some(vec!["a".to_string(), "b".to_string()]));

        storage.remove("keys").unwrap();
        assert_eq!(storage.load("keys").unwrap(), None);
    }

    #[test]
    fn test_file_storage_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        {
            let storage = JsonFileStorage::open(&path).unwrap();
            storage.save("dappConfig", "{}").unwrap();
            storage.save("keys", "[]").unwrap();
            storage.remove("dappConfig").unwrap();
        }

        let storage = JsonFileStorage::open(&path).unwrap();
        assert_eq!(storage.load("keys").unwrap().as_deref(), Some("[]"));
        assert_eq!(storage.load("dappConfig").unwrap(), None);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_failed_flush_keeps_previous_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        let storage = JsonFileStorage::open(&path).unwrap();
        storage.save("keys", "[]").unwrap();

        // Renaming onto a directory fails
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();

        assert!(storage.save("resolverHistory", "[]").is_err());
        assert_eq!(storage.load("resolverHistory").unwrap(), None);
        assert!(storage.remove("keys").is_err());
        assert_eq!(storage.load("keys").unwrap().as_deref(), Some("[]"));
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_file_storage_rejects_garbage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "not json").unwrap();

        assert!(matches!(JsonFileStorage::open(&path), Err(DappError::Storage(_))));
    }

    #[test]
    fn test_load_json_reports_corrupt_values() {
        let storage = MemoryStorage::new();
        storage.save("resolverHistory", "[{").unwrap();

        let loaded: DappResult<Option<Vec<String>>> = load_json(&storage, "resolverHistory");
        assert!(matches!(loaded, Err(DappError::JsonError(_))));
    }
}
