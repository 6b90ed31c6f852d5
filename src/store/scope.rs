use super::dispatcher::Dispatcher;
use super::persistence;
use crate::channel::Consumer;
use crate::error::{Result, StoreError};
use crate::runtime::{ReactiveRuntime, RenderPass};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// One scope wrapper: enters its key's scope, then renders what it wraps.
type ScopeFn = Box<dyn FnOnce(&mut MountedStore) -> Result<()>>;

/// Root mount primitive wrapping a consumer subtree in one propagation
/// scope per declared key.
///
/// # Examples
///
/// ```
/// use slotcan::runtime::ReactiveRuntime;
/// use slotcan::{declare_store, use_store_slot, StoreConfig, StoreProvider};
/// use serde_json::json;
/// use std::sync::{Arc, Mutex};
///
/// ReactiveRuntime::scope(|| {
///     let store = declare_store(StoreConfig::new().initial("count", 0)).unwrap();
///     let seen = Arc::new(Mutex::new(Vec::new()));
///
///     let provider = StoreProvider::new({
///         let seen = seen.clone();
///         move || {
///             let (count, _set_count) = use_store_slot("count").unwrap();
///             seen.lock().unwrap().push(count);
///         }
///     });
///     let _mounted = provider.mount().unwrap();
///
///     store.set("count", 5).unwrap();
///     assert_eq!(*seen.lock().unwrap(), vec![json!(0), json!(5)]);
/// });
/// ```
pub struct StoreProvider {
    runtime: Arc<ReactiveRuntime>,
    children: RenderPass,
}

impl StoreProvider {
    /// Provider over the current runtime.
    pub fn new<F>(children: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self::in_runtime(ReactiveRuntime::current(), children)
    }

    /// Provider over a specific runtime.
    pub fn in_runtime<F>(runtime: Arc<ReactiveRuntime>, children: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            runtime,
            children: Arc::new(children),
        }
    }

    /// Mount the provider: build every scope, render the children once and,
    /// on the first mount of the runtime, run the init hook.
    pub fn mount(&self) -> Result<MountedStore> {
        let id = self.runtime.next_id();
        let children = Arc::clone(&self.children);
        let mut mounted = MountedStore {
            id,
            runtime: Arc::clone(&self.runtime),
            locals: HashMap::new(),
            consumer: Consumer::new(&self.runtime, move || children()),
        };
        mounted.render()?;
        tracing::debug!(target: "slotcan::scope", mount = id, keys = mounted.locals.len(), "mounted store provider");

        let pending = self.runtime.registry().take_pending_init();
        if let Some(hook) = pending {
            tracing::debug!(target: "slotcan::scope", mount = id, "running init hook");
            hook();
        }
        Ok(mounted)
    }
}

/// A mounted provider. Dropping it unmounts every scope it still owns.
pub struct MountedStore {
    id: usize,
    runtime: Arc<ReactiveRuntime>,
    /// Render-scoped state of each entered scope.
    locals: HashMap<String, Arc<RwLock<Value>>>,
    consumer: Consumer,
}

impl MountedStore {
    pub fn id(&self) -> usize {
        self.id
    }

    /// Re-render the root.
    ///
    /// Every declared key gets its scope (re-)entered, outermost first, which
    /// republishes the scope's state and re-installs its dispatcher; then
    /// the children render at the innermost position. Keys declared since
    /// the last render get a fresh scope.
    pub fn render(&mut self) -> Result<()> {
        let keys = self.runtime.registry().keys();

        let children: ScopeFn = Box::new(|mounted: &mut MountedStore| -> Result<()> {
            mounted.consumer.render();
            Ok(())
        });
        let tree = keys.into_iter().rev().fold(children, |inner, key| {
            let wrapped: ScopeFn = Box::new(move |mounted: &mut MountedStore| -> Result<()> {
                mounted.enter_scope(&key)?;
                inner(mounted)
            });
            wrapped
        });
        tree(self)
    }

    /// State held by this mount's scope for `key`.
    pub fn scoped_value(&self, key: &str) -> Option<Value> {
        self.locals.get(key).map(|state| state.read().clone())
    }

    /// Unmount explicitly. Equivalent to dropping.
    pub fn unmount(self) {}

    fn enter_scope(&mut self, key: &str) -> Result<()> {
        let state = match self.locals.get(key) {
            Some(state) => Arc::clone(state),
            None => {
                let seed = persistence::resolve_live_value(&self.runtime, key)?;
                tracing::trace!(
                    target: "slotcan::scope",
                    mount = self.id,
                    key,
                    persisted = persistence::is_persisted(&self.runtime, key),
                    "seeded scope"
                );
                let state = Arc::new(RwLock::new(seed));
                self.locals.insert(key.to_string(), Arc::clone(&state));
                state
            }
        };

        let value = state.read().clone();
        let dispatcher = Dispatcher::new(key, self.id, state, &self.runtime);
        let (channel, previous_owner) = {
            let mut registry = self.runtime.registry();
            let slot = registry.slot_mut(key)?;
            let previous_owner = slot.owner();
            slot.current = value.clone();
            slot.dispatcher = Some(dispatcher);
            (slot.channel.clone(), previous_owner)
        };
        if let Some(previous) = previous_owner.filter(|owner| *owner != self.id) {
            tracing::debug!(target: "slotcan::scope", key, from = previous, to = self.id, "scope took over key");
        }

        channel.publish(value);
        Ok(())
    }
}

impl Drop for MountedStore {
    fn drop(&mut self) {
        let released = self.runtime.registry().release_mount(self.id);
        tracing::debug!(target: "slotcan::scope", mount = self.id, released, "unmounted store provider");
    }
}

/// Scoped read/write of a slot from inside a consumer subtree.
///
/// The returned value is read through the key's channel, so the calling
/// render pass re-runs whenever the slot changes.
pub fn use_store_slot(key: &str) -> Result<(Value, Dispatcher)> {
    let runtime = ReactiveRuntime::current();
    let (channel, dispatcher) = {
        let registry = runtime.registry();
        let slot = registry.slot(key)?;
        (slot.channel.clone(), slot.dispatcher.clone())
    };
    let dispatcher = dispatcher.ok_or_else(|| StoreError::unmounted(key))?;
    Ok((channel.get(), dispatcher))
}

/// Typed form of [`use_store_slot`].
pub fn use_store_slot_as<T: DeserializeOwned>(key: &str) -> Result<(T, Dispatcher)> {
    let (value, dispatcher) = use_store_slot(key)?;
    let value = serde_json::from_value(value).map_err(|source| StoreError::Conversion {
        key: key.to_string(),
        source,
    })?;
    Ok((value, dispatcher))
}
