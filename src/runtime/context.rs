use super::listeners::ListenerRegistry;
use super::registry::SlotRegistry;
use parking_lot::{Mutex, MutexGuard};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub(crate) type RenderPass = Arc<dyn Fn() + Send + Sync>;

/// Dependency tracking between channels and the consumers that read them.
struct ReactiveContext {
    current_consumer: Option<usize>,
    // Map from channel ID to set of consumer IDs that read it
    dependencies: HashMap<usize, HashSet<usize>>,
    // Map from consumer ID to set of channel IDs it read during its last pass
    consumer_deps: HashMap<usize, HashSet<usize>>,
    // Map from consumer ID to its render pass
    consumers: HashMap<usize, RenderPass>,
}

impl ReactiveContext {
    fn new() -> Self {
        Self {
            current_consumer: None,
            dependencies: HashMap::new(),
            consumer_deps: HashMap::new(),
            consumers: HashMap::new(),
        }
    }

    fn forget_dependencies(&mut self, consumer_id: usize) {
        if let Some(old_deps) = self.consumer_deps.remove(&consumer_id) {
            for channel_id in old_deps {
                if let Some(deps) = self.dependencies.get_mut(&channel_id) {
                    deps.remove(&consumer_id);
                }
            }
        }
    }

    fn clear(&mut self) {
        self.current_consumer = None;
        self.dependencies.clear();
        self.consumer_deps.clear();
        self.consumers.clear();
    }
}

/// Inner runtime state: the tracking context plus the store tables.
pub(crate) struct RuntimeInner {
    context: Mutex<ReactiveContext>,
    registry: Mutex<SlotRegistry>,
    listeners: Mutex<ListenerRegistry>,
}

impl RuntimeInner {
    fn new() -> Self {
        Self {
            context: Mutex::new(ReactiveContext::new()),
            registry: Mutex::new(SlotRegistry::default()),
            listeners: Mutex::new(ListenerRegistry::default()),
        }
    }

    fn clear(&self) {
        self.context.lock().clear();
        self.registry.lock().clear();
        self.listeners.lock().clear();
    }
}

/// Hybrid reactive runtime holding the slot registry, the listener registry
/// and the consumer dependency graph.
///
/// Supports both a process-wide global runtime (default) and scoped runtimes
/// for isolation. None of the internal locks is held while user code runs,
/// so listeners, init hooks and consumers may re-enter the store freely.
///
/// # Examples
///
/// Using scoped runtimes for isolation:
///
/// ```
/// use slotcan::runtime::ReactiveRuntime;
/// use slotcan::{declare_store, StoreConfig};
///
/// ReactiveRuntime::scope(|| {
///     let store = declare_store(StoreConfig::new().initial("count", 0)).unwrap();
///     assert_eq!(store.get("count").unwrap(), 0);
/// });
/// // Runtime and all its slots are dropped here
/// ```
pub struct ReactiveRuntime {
    next_id: AtomicUsize,
    inner: Arc<RuntimeInner>,
}

// Thread-local stack for scoped runtimes
thread_local! {
    static RUNTIME_STACK: RefCell<Vec<Arc<ReactiveRuntime>>> = const { RefCell::new(vec![]) };
}

impl ReactiveRuntime {
    /// Create a new isolated runtime.
    ///
    /// The runtime has its own slots, listeners, init hook and storage
    /// adapter. Useful for testing or for hosting several independent
    /// stores in one process.
    pub fn new() -> Arc<Self> {
        Arc::new(ReactiveRuntime {
            next_id: AtomicUsize::new(0),
            inner: Arc::new(RuntimeInner::new()),
        })
    }

    /// Run a function with a fresh isolated runtime.
    ///
    /// The runtime and all its state is dropped when the function returns.
    pub fn scope<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let runtime = Self::new();
        Self::with_runtime(runtime, f)
    }

    /// Get or create the global runtime (fallback).
    pub fn global() -> Arc<Self> {
        use std::sync::OnceLock;
        static RUNTIME: OnceLock<Arc<ReactiveRuntime>> = OnceLock::new();
        Arc::clone(RUNTIME.get_or_init(Self::new))
    }

    /// Get the current runtime (scoped or global fallback).
    ///
    /// Returns the runtime from the top of the thread-local stack,
    /// or the global runtime if no scoped runtime is active.
    pub fn current() -> Arc<Self> {
        RUNTIME_STACK.with(|stack| stack.borrow().last().cloned().unwrap_or_else(Self::global))
    }

    /// Run a function with a specific runtime as the current context.
    ///
    /// This pushes the runtime onto the thread-local stack for the duration
    /// of the function execution.
    pub fn with_runtime<F, R>(runtime: Arc<Self>, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        RUNTIME_STACK.with(|stack| {
            stack.borrow_mut().push(runtime);
        });

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

        RUNTIME_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });

        match result {
            Ok(r) => r,
            Err(e) => std::panic::resume_unwind(e),
        }
    }

    /// Tear down every slot, persistence rule, listener, the init hook,
    /// the installed storage adapter and all tracked consumers.
    ///
    /// After a reset the runtime behaves like a fresh process: the next
    /// declaration creates new channels and the init hook may run again.
    ///
    /// # Examples
    ///
    /// ```
    /// use slotcan::runtime::ReactiveRuntime;
    /// use slotcan::StoreConfig;
    ///
    /// let runtime = ReactiveRuntime::new();
    /// let store = runtime.declare(StoreConfig::new().initial("count", 0)).unwrap();
    /// assert!(store.contains("count"));
    ///
    /// runtime.reset();
    /// assert!(!store.contains("count"));
    /// ```
    pub fn reset(&self) {
        self.inner.clear();
        tracing::debug!(target: "slotcan::runtime", "runtime reset");
    }

    /// Generate the next unique ID for a channel, consumer or mount.
    pub fn next_id(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    pub(crate) fn registry(&self) -> MutexGuard<'_, SlotRegistry> {
        self.inner.registry.lock()
    }

    pub(crate) fn listeners(&self) -> MutexGuard<'_, ListenerRegistry> {
        self.inner.listeners.lock()
    }

    /// Track a read of a channel by the consumer currently rendering.
    pub fn track_read(&self, channel_id: usize) {
        let mut ctx = self.inner.context.lock();
        if let Some(current) = ctx.current_consumer {
            ctx.dependencies.entry(channel_id).or_default().insert(current);
            ctx.consumer_deps.entry(current).or_default().insert(channel_id);
        }
    }

    /// Re-run every consumer that read the channel during its last pass.
    pub fn notify_consumers(&self, channel_id: usize) {
        let passes: Vec<RenderPass> = {
            let ctx = self.inner.context.lock();
            match ctx.dependencies.get(&channel_id) {
                Some(ids) => ids.iter().filter_map(|id| ctx.consumers.get(id).cloned()).collect(),
                None => Vec::new(),
            }
        };

        for pass in passes {
            pass();
        }
    }

    pub(crate) fn register_consumer(&self, consumer_id: usize, pass: RenderPass) {
        let mut ctx = self.inner.context.lock();
        ctx.forget_dependencies(consumer_id);
        ctx.consumers.insert(consumer_id, pass);
    }

    pub(crate) fn remove_consumer(&self, consumer_id: usize) {
        let mut ctx = self.inner.context.lock();
        ctx.consumers.remove(&consumer_id);
        ctx.forget_dependencies(consumer_id);
    }

    /// Run one render pass of a consumer.
    ///
    /// Dependencies recorded by the previous pass are dropped first, and the
    /// runtime is made current so scoped reads inside `f` resolve against it.
    pub(crate) fn run_pass(self: &Arc<Self>, consumer_id: usize, f: &(dyn Fn() + Send + Sync)) {
        self.inner.context.lock().forget_dependencies(consumer_id);
        let runtime = Arc::clone(self);
        Self::with_runtime(Arc::clone(self), || runtime.with_consumer(consumer_id, f));
    }

    /// Run a function with a specific consumer as the current context.
    fn with_consumer<F, R>(&self, consumer_id: usize, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let prev = self.inner.context.lock().current_consumer.replace(consumer_id);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

        self.inner.context.lock().current_consumer = prev;

        match result {
            Ok(r) => r,
            Err(e) => std::panic::resume_unwind(e),
        }
    }

    #[cfg(test)]
    pub(crate) fn consumer_count(&self) -> usize {
        self.inner.context.lock().consumers.len()
    }
}
