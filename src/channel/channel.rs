use crate::runtime::ReactiveRuntime;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::{Arc, Weak};

/// Broadcast handle delivering one slot's value to the consumers beneath
/// its scope.
///
/// A channel is created once, when its key is first declared, and is never
/// replaced afterwards. Clones share the same value and identity.
#[derive(Clone)]
pub struct Channel {
    value: Arc<RwLock<Value>>,
    id: usize,
    runtime: Weak<ReactiveRuntime>,
}

impl Channel {
    /// Create a new channel carrying `initial`, owned by `runtime`.
    pub fn new(runtime: &Arc<ReactiveRuntime>, initial: Value) -> Self {
        Self {
            value: Arc::new(RwLock::new(initial)),
            id: runtime.next_id(),
            runtime: Arc::downgrade(runtime),
        }
    }

    /// Get the current value, recording a dependency for the consumer
    /// currently rendering.
    pub fn get(&self) -> Value {
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.track_read(self.id);
        }
        self.value.read().clone()
    }

    /// Get the current value without recording a dependency.
    pub fn get_untracked(&self) -> Value {
        self.value.read().clone()
    }

    /// Run a function on a snapshot of the value.
    ///
    /// The lock is released before `f` runs, so `f` may write this channel.
    pub fn with<R>(&self, f: impl FnOnce(&Value) -> R) -> R {
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.track_read(self.id);
        }
        let value = self.value.read().clone();
        f(&value)
    }

    /// Store a new value and re-render every consumer that read it.
    pub fn announce(&self, value: Value) {
        *self.value.write() = value;
        self.notify();
    }

    /// Like [`announce`](Self::announce), but only when the value changed.
    ///
    /// Returns whether consumers were notified.
    pub fn publish(&self, value: Value) -> bool {
        {
            let mut current = self.value.write();
            if *current == value {
                return false;
            }
            *current = value;
        }
        self.notify();
        true
    }

    /// Get the channel's unique ID.
    pub fn id(&self) -> usize {
        self.id
    }

    fn notify(&self) {
        // Write lock is released before consumers run, they read us back.
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.notify_consumers(self.id);
        }
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.id)
            .field("value", &*self.value.read())
            .finish()
    }
}
