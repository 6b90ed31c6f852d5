use crate::error::{Result, StoreError};
use crate::runtime::{ChangeListener, ReactiveRuntime};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Field-style access to every slot of a runtime.
///
/// Reads return the registry's last published value (a snapshot, not a
/// subscription). Writes go through the dispatcher installed by the
/// mounted scope of the key, so they need a mounted
/// [`StoreProvider`](crate::StoreProvider).
///
/// Handles are cheap to clone and all address the same runtime.
#[derive(Clone)]
pub struct Store {
    runtime: Arc<ReactiveRuntime>,
}

impl Store {
    pub(crate) fn new(runtime: Arc<ReactiveRuntime>) -> Self {
        Self { runtime }
    }

    /// The runtime this facade addresses.
    pub fn runtime(&self) -> &Arc<ReactiveRuntime> {
        &self.runtime
    }

    /// Get a clone of the current value of `key`.
    pub fn get(&self, key: &str) -> Result<Value> {
        Ok(self.runtime.registry().slot(key)?.current.clone())
    }

    /// Get the current value of `key` as `T`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self.get(key)?;
        serde_json::from_value(value).map_err(|source| StoreError::Conversion {
            key: key.to_string(),
            source,
        })
    }

    /// Run a function on a snapshot of the current value.
    pub fn read<F, R>(&self, key: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Value) -> R,
    {
        let value = self.get(key)?;
        Ok(f(&value))
    }

    /// Write `value` to `key` through the full write chain.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        let dispatcher = {
            let registry = self.runtime.registry();
            registry.slot(key)?.dispatcher.clone()
        };
        let dispatcher = dispatcher.ok_or_else(|| StoreError::unmounted(key))?;
        dispatcher.dispatch(value)
    }

    /// Serialize `value` and write it to `key`.
    pub fn set_as<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value).map_err(|source| StoreError::Conversion {
            key: key.to_string(),
            source,
        })?;
        self.set(key, value)
    }

    /// Write a value computed from the current one.
    pub fn update<F>(&self, key: &str, f: F) -> Result<()>
    where
        F: FnOnce(&Value) -> Value,
    {
        let next = f(&self.get(key)?);
        self.set(key, next)
    }

    /// Whether `key` has been declared.
    pub fn contains(&self, key: &str) -> bool {
        self.runtime.registry().contains(key)
    }

    /// Whether a mounted scope currently owns the dispatcher of `key`.
    pub fn is_mounted(&self, key: &str) -> bool {
        self.runtime
            .registry()
            .slot(key)
            .map(|slot| slot.dispatcher.is_some())
            .unwrap_or(false)
    }

    /// Declared keys in declaration order.
    pub fn keys(&self) -> Vec<String> {
        self.runtime.registry().keys()
    }

    /// Append a change listener for a declared key.
    ///
    /// Listeners run synchronously on every write, in registration order,
    /// before the new value reaches the channel. Registering the same
    /// listener twice makes it run twice.
    pub fn add_change_listener(&self, key: &str, listener: ChangeListener) -> Result<()> {
        if !self.contains(key) {
            return Err(StoreError::undeclared(key));
        }
        self.runtime.listeners().add(key, listener);
        Ok(())
    }

    /// Remove every registration of `listener` (by identity) for `key`.
    pub fn remove_change_listener(&self, key: &str, listener: &ChangeListener) {
        let removed = self.runtime.listeners().remove(key, listener);
        tracing::trace!(target: "slotcan::listeners", key, removed, "removed change listener");
    }
}
