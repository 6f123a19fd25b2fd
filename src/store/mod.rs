//! Durable integer key-value storage used to persist computed budgets.

pub mod preferences;

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::core::errors::Result;

pub use preferences::JsonFileStore;

/// Get/set of named integers, durable across process restarts.
pub trait KeyValueStore: Send + Sync {
    /// Stored value for `key`, or `default` when nothing is stored.
    fn get_int(&self, key: &str, default: i64) -> Result<i64>;
    /// Store `value` under `key`, replacing any previous value.
    fn set_int(&self, key: &str, value: i64) -> Result<()>;
    /// Clear `key`. Clearing a missing key is a no-op.
    fn remove(&self, key: &str) -> Result<()>;
}

/// Process-local store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, i64>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get_int(&self, key: &str, default: i64) -> Result<i64> {
        Ok(self.values.read().get(key).copied().unwrap_or(default))
    }

    fn set_int(&self, key: &str, value: i64) -> Result<()> {
        self.values.write().insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.values.write().remove(key);
        Ok(())
    }
}
