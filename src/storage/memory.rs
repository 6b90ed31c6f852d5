use super::{StorageAdapter, StorageError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// In-memory medium.
///
/// Clones share the same contents, so a test can hand one clone to a
/// runtime, drop the runtime, and mount a fresh one over the same items.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    items: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw text stored under `key`.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.items.lock().get(key).cloned()
    }

    /// Store raw text directly, bypassing any store.
    pub fn insert_raw(&self, key: impl Into<String>, value: impl Into<String>) {
        self.items.lock().insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

impl StorageAdapter for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.raw(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.insert_raw(key, value);
        Ok(())
    }
}
