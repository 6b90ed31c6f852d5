use crate::runtime::ChangeListener;
use crate::storage::StorageAdapter;
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// One-shot boot action run when the first root scope mounts.
pub type InitHook = Arc<dyn Fn() + Send + Sync>;

/// Maps a deserialized stored value to the live value.
pub type Transform = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// How a slot is kept in the durable medium.
#[derive(Clone)]
pub enum PersistenceRule {
    /// Store and restore the value as-is.
    AsIs,
    /// Restore through a transform applied to the parsed stored value.
    Transform(Transform),
}

impl PersistenceRule {
    /// Live value for a parsed stored value.
    pub fn restore(&self, stored: Value) -> Value {
        match self {
            PersistenceRule::AsIs => stored,
            PersistenceRule::Transform(f) => f(stored),
        }
    }
}

impl fmt::Debug for PersistenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistenceRule::AsIs => f.write_str("AsIs"),
            PersistenceRule::Transform(_) => f.write_str("Transform(..)"),
        }
    }
}

/// Declaration of a batch of slots.
///
/// # Examples
///
/// ```
/// use slotcan::{MemoryStorage, StoreConfig};
/// use serde_json::{json, Value};
///
/// let config = StoreConfig::new()
///     .initial("count", 0)
///     .initial("theme", "light")
///     .initial("user", Value::Null)
///     .persist("theme")
///     .on_change("user", |user: &Value| println!("user is now {user}"))
///     .storage(MemoryStorage::new());
///
/// assert_eq!(config.initial_values["theme"], json!("light"));
/// ```
#[derive(Clone, Default)]
pub struct StoreConfig {
    /// Key to default value, in declaration order.
    pub initial_values: IndexMap<String, Value>,
    pub storage_mappings: IndexMap<String, PersistenceRule>,
    pub on_init: Option<InitHook>,
    pub on_change: IndexMap<String, ChangeListener>,
    /// Durable medium to install into the runtime.
    pub storage: Option<Arc<dyn StorageAdapter>>,
}

impl StoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `key` with a default value.
    pub fn initial(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.initial_values.insert(key.into(), value.into());
        self
    }

    /// Persist `key` as-is.
    pub fn persist(mut self, key: impl Into<String>) -> Self {
        self.storage_mappings.insert(key.into(), PersistenceRule::AsIs);
        self
    }

    /// Persist `key`, restoring it through `transform`.
    pub fn persist_with<F>(mut self, key: impl Into<String>, transform: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.storage_mappings
            .insert(key.into(), PersistenceRule::Transform(Arc::new(transform)));
        self
    }

    /// Set the init hook. Declaring a second hook replaces the first.
    pub fn on_init<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_init = Some(Arc::new(hook));
        self
    }

    /// Bind a change listener to `key`.
    pub fn on_change<F>(mut self, key: impl Into<String>, listener: F) -> Self
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.on_change.insert(key.into(), Arc::new(listener));
        self
    }

    /// Bind an already shared listener, keeping its identity for removal.
    pub fn on_change_shared(mut self, key: impl Into<String>, listener: ChangeListener) -> Self {
        self.on_change.insert(key.into(), listener);
        self
    }

    pub fn storage(mut self, storage: impl StorageAdapter + 'static) -> Self {
        self.storage = Some(Arc::new(storage));
        self
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("initial_values", &self.initial_values)
            .field("storage_mappings", &self.storage_mappings)
            .field("on_init", &self.on_init.is_some())
            .field("on_change", &self.on_change.keys().collect::<Vec<_>>())
            .field("storage", &self.storage.is_some())
            .finish()
    }
}
