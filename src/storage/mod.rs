//! Key-value persistence for checkpoints and UI state.
//!
//! The tracker and the CLI only need a handful of JSON documents, each under
//! a fixed key. [`KeyValueStore`] abstracts where they live: [`JsonFileStore`]
//! keeps one file per key inside the state directory, [`MemoryStore`] keeps
//! them in process for tests and embedding.

mod file;

pub use file::JsonFileStore;

use crate::error::{CanopyError, Result};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::warn;

/// Map of query id to its checkpoint.
pub const CHECKPOINTS_KEY: &str = "checkpoints";
/// Map of query id to its pending-changes flag.
pub const PENDING_CHANGES_KEY: &str = "pending-changes";
/// Array of expanded issue keys.
pub const EXPANDED_NODES_KEY: &str = "expanded-nodes";

/// Minimal JSON document store.
pub trait KeyValueStore {
    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read or holds data
    /// that is not valid JSON.
    fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Replace the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be written.
    fn set(&mut self, key: &str, value: &Value) -> Result<()>;

    /// Delete `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store refuses the removal.
    fn remove(&mut self, key: &str) -> Result<()>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Box<S> {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &Value) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}

/// In-process store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, Value>,
    fail_writes: bool,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose writes always fail; reads still succeed.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            values: HashMap::new(),
            fail_writes: true,
        }
    }

    /// Seed a value directly, bypassing `fail_writes`.
    #[must_use]
    pub fn with_value(mut self, key: &str, value: Value) -> Self {
        self.values.insert(key.to_string(), value);
        self
    }

    pub const fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &Value) -> Result<()> {
        if self.fail_writes {
            return Err(CanopyError::storage(key, "writes disabled"));
        }
        self.values.insert(key.to_string(), value.clone());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        if self.fail_writes {
            return Err(CanopyError::storage(key, "writes disabled"));
        }
        self.values.remove(key);
        Ok(())
    }
}

/// Load the persisted set of expanded keys.
///
/// Missing or malformed data yields an empty set.
pub fn load_expanded_keys<S: KeyValueStore + ?Sized>(store: &S) -> HashSet<String> {
    match store.get(EXPANDED_NODES_KEY) {
        Ok(Some(value)) => serde_json::from_value::<Vec<String>>(value).map_or_else(
            |err| {
                warn!(error = %err, "Ignoring malformed expanded-nodes state");
                HashSet::new()
            },
            |keys| keys.into_iter().collect(),
        ),
        Ok(None) => HashSet::new(),
        Err(err) => {
            warn!(error = %err, "Failed to read expanded-nodes state");
            HashSet::new()
        }
    }
}

/// Persist the set of expanded keys, sorted for stable output.
///
/// # Errors
///
/// Returns an error if the store rejects the write.
pub fn save_expanded_keys<S: KeyValueStore + ?Sized>(
    store: &mut S,
    keys: &HashSet<String>,
) -> Result<()> {
    let sorted: BTreeSet<&String> = keys.iter().collect();
    store.set(EXPANDED_NODES_KEY, &serde_json::to_value(sorted)?)
}
