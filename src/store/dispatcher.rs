use super::persistence;
use crate::error::{Result, StoreError};
use crate::runtime::ReactiveRuntime;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Weak};

/// Write handle installed by a mounted scope for one key.
///
/// Every dispatch runs the write chain in order: persistence write-through,
/// change listeners (synchronously, in registration order), then the
/// scope's local state and channel, which re-renders dependent consumers
/// when the value changed.
#[derive(Clone)]
pub struct Dispatcher {
    key: Arc<str>,
    mount_id: usize,
    /// Render-scoped state of the scope that installed this dispatcher.
    state: Arc<RwLock<Value>>,
    runtime: Weak<ReactiveRuntime>,
}

impl Dispatcher {
    pub(crate) fn new(key: &str, mount_id: usize, state: Arc<RwLock<Value>>, runtime: &Arc<ReactiveRuntime>) -> Self {
        Self {
            key: Arc::from(key),
            mount_id,
            state,
            runtime: Arc::downgrade(runtime),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn mount_id(&self) -> usize {
        self.mount_id
    }

    /// Write a new value through the full chain.
    ///
    /// Fails with [`StoreError::UnmountedKey`] without any side effect when
    /// the scope that installed this dispatcher no longer owns the key.
    pub fn dispatch(&self, value: impl Into<Value>) -> Result<()> {
        let runtime = self.owning_runtime()?;
        let value = value.into();
        let seq = runtime.registry().slot_mut(&self.key)?.begin_write();
        tracing::trace!(target: "slotcan::dispatch", key = %self.key, seq, %value, "dispatch");

        persistence::write_through(&runtime, &self.key, &value);
        notify_listeners(&runtime, &self.key, &value);
        self.propagate(&runtime, value, seq)
    }

    /// Serialize a typed value and dispatch it.
    pub fn dispatch_as<T: Serialize>(&self, value: &T) -> Result<()> {
        let value = serde_json::to_value(value).map_err(|source| StoreError::Conversion {
            key: self.key.to_string(),
            source,
        })?;
        self.dispatch(value)
    }

    /// Dispatch a value computed from the scope's current state.
    pub fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&Value) -> Value,
    {
        let current = self.state.read().clone();
        self.dispatch(f(&current))
    }

    fn owning_runtime(&self) -> Result<Arc<ReactiveRuntime>> {
        let runtime = self.runtime.upgrade().ok_or_else(|| StoreError::unmounted(&*self.key))?;
        let owner = runtime.registry().slot(&self.key)?.owner();
        if owner != Some(self.mount_id) {
            return Err(StoreError::unmounted(&*self.key));
        }
        Ok(runtime)
    }

    /// Land `value` in the scope state, the registry and the channel.
    ///
    /// A nested write on the same key (from a listener) propagates before
    /// this one, so when `seq` is no longer the latest dispatch the value is
    /// stored again: the medium must end up holding what propagated last.
    /// Consumers only re-render when the value actually changed.
    fn propagate(&self, runtime: &ReactiveRuntime, value: Value, seq: u64) -> Result<()> {
        *self.state.write() = value.clone();
        let (channel, overtaken) = {
            let mut registry = runtime.registry();
            let slot = registry.slot_mut(&self.key)?;
            slot.current = value.clone();
            (slot.channel.clone(), slot.writes != seq)
        };
        if overtaken {
            persistence::write_through(runtime, &self.key, &value);
        }
        channel.publish(value);
        Ok(())
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("key", &self.key)
            .field("mount_id", &self.mount_id)
            .finish()
    }
}

/// Invoke every change listener of `key` in registration order.
fn notify_listeners(runtime: &ReactiveRuntime, key: &str, value: &Value) {
    let listeners = runtime.listeners().snapshot(key);
    for listener in listeners {
        listener(value);
    }
}
