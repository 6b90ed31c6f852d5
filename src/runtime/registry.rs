use crate::channel::Channel;
use crate::error::{Result, StoreError};
use crate::storage::StorageAdapter;
use crate::store::{Dispatcher, InitHook, PersistenceRule};
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Registry entry for one key.
pub(crate) struct Slot {
    pub(crate) channel: Channel,
    pub(crate) default: Value,
    /// Last value announced on the channel.
    pub(crate) current: Value,
    pub(crate) dispatcher: Option<Dispatcher>,
    /// Set once a mount has resolved the live value (durable or default).
    pub(crate) resolved: bool,
    /// Number of dispatches started on this key.
    pub(crate) writes: u64,
}

impl Slot {
    fn new(channel: Channel, default: Value) -> Self {
        Self {
            channel,
            current: default.clone(),
            default,
            dispatcher: None,
            resolved: false,
            writes: 0,
        }
    }

    /// Start a dispatch and return its sequence number.
    pub(crate) fn begin_write(&mut self) -> u64 {
        self.writes += 1;
        self.writes
    }

    /// Id of the mount that owns the live dispatcher, if any.
    pub(crate) fn owner(&self) -> Option<usize> {
        self.dispatcher.as_ref().map(Dispatcher::mount_id)
    }
}

/// Global table of declared slots, keyed in declaration order.
#[derive(Default)]
pub(crate) struct SlotRegistry {
    slots: IndexMap<String, Slot>,
    rules: HashMap<String, PersistenceRule>,
    storage: Option<Arc<dyn StorageAdapter>>,
    init_hook: Option<InitHook>,
    init_ran: bool,
}

impl SlotRegistry {
    pub(crate) fn contains(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    pub(crate) fn slot(&self, key: &str) -> Result<&Slot> {
        self.slots.get(key).ok_or_else(|| StoreError::undeclared(key))
    }

    pub(crate) fn slot_mut(&mut self, key: &str) -> Result<&mut Slot> {
        self.slots.get_mut(key).ok_or_else(|| StoreError::undeclared(key))
    }

    /// Declare a key, or refresh the default of an existing one.
    ///
    /// An existing slot keeps its channel, dispatcher and live value. The
    /// channel factory only runs for keys seen for the first time.
    pub(crate) fn declare(&mut self, key: &str, default: Value, channel: impl FnOnce(&Value) -> Channel) {
        match self.slots.get_mut(key) {
            Some(slot) => {
                if !slot.resolved {
                    slot.current = default.clone();
                }
                slot.default = default;
            }
            None => {
                let channel = channel(&default);
                self.slots.insert(key.to_string(), Slot::new(channel, default));
            }
        }
    }

    /// Snapshot of the declared keys in declaration order.
    pub(crate) fn keys(&self) -> Vec<String> {
        self.slots.keys().cloned().collect()
    }

    pub(crate) fn rule(&self, key: &str) -> Option<PersistenceRule> {
        self.rules.get(key).cloned()
    }

    pub(crate) fn set_rule(&mut self, key: String, rule: PersistenceRule) {
        self.rules.insert(key, rule);
    }

    pub(crate) fn storage(&self) -> Option<Arc<dyn StorageAdapter>> {
        self.storage.clone()
    }

    pub(crate) fn set_storage(&mut self, storage: Arc<dyn StorageAdapter>) {
        self.storage = Some(storage);
    }

    /// Replace the init hook, returning whether one was already set.
    pub(crate) fn set_init_hook(&mut self, hook: InitHook) -> bool {
        self.init_hook.replace(hook).is_some()
    }

    /// Hand out the init hook if it has not run yet in this runtime.
    pub(crate) fn take_pending_init(&mut self) -> Option<InitHook> {
        if self.init_ran {
            return None;
        }
        let hook = self.init_hook.clone()?;
        self.init_ran = true;
        Some(hook)
    }

    /// Drop the dispatchers owned by a mount, returning how many were cleared.
    pub(crate) fn release_mount(&mut self, mount_id: usize) -> usize {
        let mut released = 0;
        for slot in self.slots.values_mut() {
            if slot.owner() == Some(mount_id) {
                slot.dispatcher = None;
                released += 1;
            }
        }
        released
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.rules.clear();
        self.storage = None;
        self.init_hook = None;
        self.init_ran = false;
    }
}
