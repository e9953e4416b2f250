//! Synchronous key-value contract shared by the ledger and feature toggles.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::DatabaseError;

/// Boolean-as-int flag: schedule overlay enabled.
pub const SCHEDULE_FLAG: &str = "schedule";
/// Boolean-as-int flag: vibration alerts enabled.
pub const VIBRATION_FLAG: &str = "vibration";

/// A small durable key-value store callable from the render path and from
/// timer callbacks.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, DatabaseError>;

    fn put(&self, key: &str, value: &str) -> Result<(), DatabaseError>;

    fn remove(&self, key: &str) -> Result<(), DatabaseError>;

    /// Atomically replace the value at `key` with `new` if it currently equals
    /// `expected` (`None` meaning absent). Returns whether the swap happened.
    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: &str,
    ) -> Result<bool, DatabaseError>;

    /// All keys starting with `prefix`, sorted.
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, DatabaseError>;

    fn read_string(&self, key: &str, default: &str) -> String {
        match self.get(key) {
            Ok(Some(value)) => value,
            Ok(None) => default.to_string(),
            Err(e) => {
                tracing::warn!(key, error = %e, "store read failed, using default");
                default.to_string()
            }
        }
    }

    fn read_int(&self, key: &str, default: i64) -> i64 {
        match self.get(key) {
            Ok(Some(value)) => value.parse().unwrap_or_else(|_| {
                tracing::warn!(key, value = %value, "non-integer value in store, using default");
                default
            }),
            Ok(None) => default,
            Err(e) => {
                tracing::warn!(key, error = %e, "store read failed, using default");
                default
            }
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        self.put(key, value)
    }

    fn write_int(&self, key: &str, value: i64) -> Result<(), DatabaseError> {
        self.put(key, &value.to_string())
    }

    /// Read a boolean-as-int flag; any non-zero value is on.
    fn flag(&self, key: &str, default: bool) -> bool {
        self.read_int(key, i64::from(default)) != 0
    }

    fn set_flag(&self, key: &str, on: bool) -> Result<(), DatabaseError> {
        self.write_int(key, i64::from(on))
    }
}

/// In-memory store for tests and hosts without durable storage.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, DatabaseError> {
        self.values.lock().map_err(|_| DatabaseError::Poisoned)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), DatabaseError> {
        self.lock()?.remove(key);
        Ok(())
    }

    fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: &str,
    ) -> Result<bool, DatabaseError> {
        let mut values = self.lock()?;
        if values.get(key).map(String::as_str) != expected {
            return Ok(false);
        }
        values.insert(key.to_string(), new.to_string());
        Ok(true)
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, DatabaseError> {
        let mut keys: Vec<String> = self
            .lock()?
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}
