//! Key-value persistence
//!
//! The engine persists UI/playback state through this interface rather than
//! owning a storage format. Missing keys and malformed JSON always degrade
//! to the caller's default, never to an error.

use crate::error::{Result, StreamError};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// String key-value store consumed by the registry and the live session.
pub trait Storage {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;

    /// Read a JSON value, falling back to `default` on a missing key or
    /// a body that fails to parse.
    fn get_json<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key)
            .and_then(|body| serde_json::from_str(&body).ok())
            .unwrap_or(default)
    }

    fn set_json<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let body = serde_json::to_string(value)
            .map_err(|e| StreamError::Storage(format!("Failed to serialize '{key}': {e}")))?;
        self.set(key, &body)
    }

    fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some(value) => value == "true",
            None => default,
        }
    }

    fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        self.set(key, if value { "true" } else { "false" })
    }
}

// =============================================================================
// MemoryStorage - in-process store, used by tests and embedders
// =============================================================================

/// Volatile in-memory store
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
        Ok(())
    }
}

// =============================================================================
// JsonFileStorage - single JSON document in the config directory
// =============================================================================

/// Application name used for the config directory
const APP_DIR: &str = "tunedeck";

/// State file name inside the config directory
const STATE_FILE: &str = "state.json";

/// File-backed store: one JSON object of string keys and values.
/// Stateless between calls, so clones may point at the same file.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    /// Open the default state file under the platform config directory
    pub fn open_default() -> Result<Self> {
        let dir = dirs::config_dir().ok_or_else(|| {
            StreamError::Storage(
                "Could not determine config directory. HOME may not be set.".to_string(),
            )
        })?;
        Ok(Self::open(dir.join(APP_DIR).join(STATE_FILE)))
    }

    /// Open a state file at a specific path
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_map(&self) -> HashMap<String, String> {
        match fs::read_to_string(&self.path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
            Err(_) => HashMap::new(),
        }
    }

    fn write_map(&self, map: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                create_dir_if_needed(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(map)
            .map_err(|e| StreamError::Storage(format!("Failed to serialize state: {e}")))?;
        fs::write(&self.path, content).map_err(|e| {
            StreamError::Storage(format!("Failed to write {:?}: {e}", self.path))
        })
    }
}

impl Storage for JsonFileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.read_map().remove(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut map = self.read_map();
        map.insert(key.to_string(), value.to_string());
        self.write_map(&map)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut map = self.read_map();
        if map.remove(key).is_some() {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

fn create_dir_if_needed(path: &Path) -> Result<()> {
    match fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) => {
            let msg = match e.kind() {
                ErrorKind::PermissionDenied => {
                    format!("Permission denied: cannot create directory {path:?}")
                }
                _ => format!("Failed to create directory {path:?}: {e}"),
            };
            Err(StreamError::Storage(msg))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env::temp_dir;
    use std::sync::atomic::{AtomicU32, Ordering};

    static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

    fn temp_path() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        temp_dir().join(format!("tunedeck_storage_test_{id}.json"))
    }

    #[test]
    fn memory_set_get_remove() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("k"), None);

        storage.set("k", "v").unwrap();
        assert_eq!(storage.get("k"), Some("v".to_string()));

        storage.remove("k").unwrap();
        assert_eq!(storage.get("k"), None);
    }

    #[test]
    fn get_json_missing_key_returns_default() {
        let storage = MemoryStorage::new();
        let value: Vec<String> = storage.get_json("missing", vec!["d".to_string()]);
        assert_eq!(value, vec!["d".to_string()]);
    }

    #[test]
    fn get_json_malformed_returns_default() {
        let storage = MemoryStorage::new();
        storage.set("k", "{not json").unwrap();
        let value: Vec<String> = storage.get_json("k", Vec::new());
        assert!(value.is_empty());
    }

    #[test]
    fn json_roundtrip() {
        let storage = MemoryStorage::new();
        storage.set_json("list", &vec![1, 2, 3]).unwrap();
        let value: Vec<i32> = storage.get_json("list", Vec::new());
        assert_eq!(value, vec![1, 2, 3]);
    }

    #[test]
    fn bool_defaults_and_roundtrip() {
        let storage = MemoryStorage::new();
        assert!(!storage.get_bool("flag", false));
        assert!(storage.get_bool("flag", true));

        storage.set_bool("flag", true).unwrap();
        assert!(storage.get_bool("flag", false));

        storage.set_bool("flag", false).unwrap();
        assert!(!storage.get_bool("flag", true));
    }

    #[test]
    fn file_storage_persists_across_instances() {
        let path = temp_path();

        {
            let storage = JsonFileStorage::open(&path);
            storage.set("liveStreamUrl", "http://a/x").unwrap();
        }
        {
            let storage = JsonFileStorage::open(&path);
            assert_eq!(storage.get("liveStreamUrl"), Some("http://a/x".to_string()));
            storage.remove("liveStreamUrl").unwrap();
            assert_eq!(storage.get("liveStreamUrl"), None);
        }

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn file_storage_missing_file_is_empty() {
        let storage = JsonFileStorage::open(temp_path());
        assert_eq!(storage.get("anything"), None);
    }

    #[test]
    fn file_storage_corrupt_file_is_empty() {
        let path = temp_path();
        fs::write(&path, "not json at all").unwrap();

        let storage = JsonFileStorage::open(&path);
        assert_eq!(storage.get("k"), None);

        // Writing replaces the corrupt document
        storage.set("k", "v").unwrap();
        assert_eq!(storage.get("k"), Some("v".to_string()));

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn file_storage_creates_parent_dirs() {
        let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let dir = temp_dir().join(format!("tunedeck_storage_dir_{id}"));
        let storage = JsonFileStorage::open(dir.join("nested").join("state.json"));

        storage.set("k", "v").unwrap();
        assert_eq!(storage.get("k"), Some("v".to_string()));

        let _ = fs::remove_dir_all(&dir);
    }
}
