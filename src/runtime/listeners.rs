use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Out-of-band change callback for one key.
///
/// Identity (for removal) is the `Arc` allocation, so keep a clone of the
/// listener you register if you intend to remove it later.
pub type ChangeListener = Arc<dyn Fn(&Value) + Send + Sync>;

/// Per-key ordered lists of change callbacks.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    listeners: HashMap<String, Vec<ChangeListener>>,
}

impl ListenerRegistry {
    pub(crate) fn add(&mut self, key: &str, listener: ChangeListener) {
        self.listeners.entry(key.to_string()).or_default().push(listener);
    }

    /// Remove every occurrence of `listener` from the key's list.
    pub(crate) fn remove(&mut self, key: &str, listener: &ChangeListener) -> usize {
        let Some(list) = self.listeners.get_mut(key) else {
            return 0;
        };
        let before = list.len();
        list.retain(|cb| !Arc::ptr_eq(cb, listener));
        before - list.len()
    }

    /// Listeners of a key in registration order.
    ///
    /// Callers invoke the returned snapshot after releasing the registry
    /// lock, so callbacks may add or remove listeners themselves.
    pub(crate) fn snapshot(&self, key: &str) -> Vec<ChangeListener> {
        self.listeners.get(key).cloned().unwrap_or_default()
    }

    pub(crate) fn clear(&mut self) {
        self.listeners.clear();
    }
}
