use super::config::{InitHook, StoreConfig};
use super::store::Store;
use crate::channel::Channel;
use crate::error::{Result, StoreError};
use crate::runtime::{ChangeListener, ReactiveRuntime};
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;

impl ReactiveRuntime {
    /// Declare a batch of slots in this runtime.
    ///
    /// Keys seen for the first time get a channel; keys declared before keep
    /// their channel and live value and only have their default refreshed.
    /// Listeners are appended, persistence rules merged (later wins), and a
    /// provided init hook replaces any earlier one.
    ///
    /// Every key named by `storage_mappings` or `on_change` must be declared
    /// by this call or an earlier one, otherwise nothing is changed and
    /// [`StoreError::UndeclaredKey`] is returned.
    pub fn declare(self: &Arc<Self>, config: StoreConfig) -> Result<Store> {
        let StoreConfig {
            initial_values,
            storage_mappings,
            on_init,
            on_change,
            storage,
        } = config;

        {
            let registry = self.registry();
            let unknown = storage_mappings
                .keys()
                .chain(on_change.keys())
                .find(|key| !initial_values.contains_key(*key) && !registry.contains(key));
            if let Some(key) = unknown {
                return Err(StoreError::undeclared(key.as_str()));
            }
        }

        let replaced_hook = {
            let mut registry = self.registry();
            for (key, default) in initial_values.iter() {
                registry.declare(key, default.clone(), |initial| Channel::new(self, initial.clone()));
            }
            for (key, rule) in storage_mappings {
                registry.set_rule(key, rule);
            }
            if let Some(storage) = storage {
                registry.set_storage(storage);
            }
            on_init.map(|hook| registry.set_init_hook(hook)).unwrap_or(false)
        };

        if replaced_hook {
            tracing::warn!(target: "slotcan::declare", "init hook replaced by a later declaration");
        }

        {
            let mut listeners = self.listeners();
            for (key, listener) in on_change {
                listeners.add(&key, listener);
            }
        }

        tracing::debug!(
            target: "slotcan::declare",
            keys = ?initial_values.keys().collect::<Vec<_>>(),
            "declared store slots"
        );
        Ok(Store::new(Arc::clone(self)))
    }
}

/// Declare a batch of slots in the current runtime and return its facade.
///
/// # Examples
///
/// ```
/// use slotcan::runtime::ReactiveRuntime;
/// use slotcan::{declare_store, StoreConfig};
///
/// ReactiveRuntime::scope(|| {
///     let store = declare_store(StoreConfig::new().initial("count", 0)).unwrap();
///     assert_eq!(store.get("count").unwrap(), 0);
///     assert!(store.get("missing").is_err());
/// });
/// ```
pub fn declare_store(config: StoreConfig) -> Result<Store> {
    ReactiveRuntime::current().declare(config)
}

/// Two-argument declaration form kept for older callers.
#[deprecated(note = "use `declare_store(StoreConfig)` instead")]
pub fn create_store(initial_values: IndexMap<String, Value>, on_init: Option<InitHook>) -> Result<Store> {
    declare_store(StoreConfig {
        initial_values,
        on_init,
        ..StoreConfig::default()
    })
}

/// Append a change listener for a declared key in the current runtime.
pub fn add_change_listener(key: &str, listener: ChangeListener) -> Result<()> {
    Store::new(ReactiveRuntime::current()).add_change_listener(key, listener)
}

/// Remove every registration of `listener` for `key` in the current
/// runtime. Unknown keys and listeners are ignored.
pub fn remove_change_listener(key: &str, listener: &ChangeListener) {
    Store::new(ReactiveRuntime::current()).remove_change_listener(key, listener)
}
