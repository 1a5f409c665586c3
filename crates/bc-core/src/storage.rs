//! Persisted key-value configuration
//!
//! Every key is namespaced with [`KEY_PREFIX`]. Values are read once at
//! construction time with a default fallback and written back synchronously.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::types::StoredValue;

/// Namespace prepended to every persisted key.
pub const KEY_PREFIX: &str = "BILICLEANER_";

/// Full storage key for a logical key.
pub fn namespaced(key: &str) -> String {
    format!("{KEY_PREFIX}{key}")
}

/// Synchronous key-value store. Keys passed in are already namespaced.
pub trait KvStore {
    fn get(&self, key: &str) -> Option<StoredValue>;
    fn set(&self, key: &str, value: StoredValue);
}

/// Typed reads with defaults. `key` is the logical (un-prefixed) key.
pub trait KvStoreExt: KvStore {
    fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get(&namespaced(key))
            .and_then(|v| v.as_bool())
            .unwrap_or(default)
    }

    fn get_number(&self, key: &str, default: f64) -> f64 {
        self.get(&namespaced(key))
            .and_then(|v| v.as_number())
            .filter(|n| n.is_finite())
            .unwrap_or(default)
    }

    fn get_list(&self, key: &str) -> Vec<String> {
        match self.get(&namespaced(key)) {
            Some(StoredValue::List(items)) => items,
            _ => Vec::new(),
        }
    }

    fn put(&self, key: &str, value: impl Into<StoredValue>) {
        self.set(&namespaced(key), value.into());
    }
}

impl<T: KvStore + ?Sized> KvStoreExt for T {}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RefCell<HashMap<String, StoredValue>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all stored values.
    pub fn entries(&self) -> HashMap<String, StoredValue> {
        self.values.borrow().clone()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Option<StoredValue> {
        self.values.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: StoredValue) {
        self.values.borrow_mut().insert(key.to_string(), value);
    }
}
