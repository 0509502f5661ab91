//! Persistent key-value storage
//!
//! The trading engine treats the store as the source of truth for orders
//! and trade history; collections are read and written whole, never row by
//! row. Read failures fall back to the caller's default, write failures are
//! logged and swallowed.

use std::path::PathBuf;
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

/// Generic get/set of JSON-serializable values under string keys
pub trait KvStore {
    /// Read the value under `key`, falling back to `default` when the key
    /// is absent or the stored blob fails to decode
    fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T;

    /// Store `value` under `key`
    fn set<T: Serialize>(&self, key: &str, value: &T);
}

/// Durable store backed by a single JSON document on disk
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: Mutex<Map<String, Value>>,
}

impl JsonFileStore {
    /// Open the store at `path`, starting empty when the file is missing
    /// or unreadable
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(Value::Object(map)) => map,
                Ok(_) | Err(_) => {
                    warn!(path = %path.display(), "State file is not a JSON object, starting empty");
                    Map::new()
                }
            },
            Err(_) => Map::new(),
        };

        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    fn flush(&self, entries: &Map<String, Value>) {
        match serde_json::to_vec_pretty(entries) {
            Ok(raw) => {
                if let Err(e) = std::fs::write(&self.path, raw) {
                    warn!(path = %self.path.display(), error = %e, "Failed to write state file");
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to serialize state file");
            }
        }
    }
}

impl KvStore for JsonFileStore {
    fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        let entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(value) => serde_json::from_value(value.clone()).unwrap_or(default),
            None => default,
        }
    }

    fn set<T: Serialize>(&self, key: &str, value: &T) {
        let json = match serde_json::to_value(value) {
            Ok(json) => json,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to serialize value");
                return;
            }
        };

        let mut entries = self.entries.lock().unwrap();
        entries.insert(key.to_string(), json);
        self.flush(&entries);
    }
}

/// Ephemeral store for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<Map<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryStore {
    fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        let entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(value) => serde_json::from_value(value.clone()).unwrap_or(default),
            None => default,
        }
    }

    fn set<T: Serialize>(&self, key: &str, value: &T) {
        let json = match serde_json::to_value(value) {
            Ok(json) => json,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to serialize value");
                return;
            }
        };

        self.entries.lock().unwrap().insert(key.to_string(), json);
    }
}
