use crate::runtime::{ReactiveRuntime, RenderPass};
use std::sync::{Arc, Weak};

/// A consumer subtree that re-renders when a channel it read changes.
///
/// Stands in for the rendering layer: every pass tracks the channels read
/// through [`Channel::get`](crate::Channel::get) and the next announce on any
/// of them runs the pass again.
///
/// # Examples
///
/// ```
/// use slotcan::runtime::ReactiveRuntime;
/// use slotcan::{Channel, Consumer};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let runtime = ReactiveRuntime::new();
/// let channel = Channel::new(&runtime, 0.into());
/// let renders = Arc::new(AtomicUsize::new(0));
///
/// let consumer = Consumer::new(&runtime, {
///     let channel = channel.clone();
///     let renders = renders.clone();
///     move || {
///         let _ = channel.get();
///         renders.fetch_add(1, Ordering::SeqCst);
///     }
/// });
/// consumer.render();
/// assert_eq!(renders.load(Ordering::SeqCst), 1);
///
/// channel.announce(5.into());
/// assert_eq!(renders.load(Ordering::SeqCst), 2);
/// ```
pub struct Consumer {
    id: usize,
    runtime: Weak<ReactiveRuntime>,
    render: RenderPass,
}

impl Consumer {
    /// Register a consumer with the runtime. Nothing renders until
    /// [`render`](Self::render) is called.
    pub fn new<F>(runtime: &Arc<ReactiveRuntime>, render: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let id = runtime.next_id();
        let render: RenderPass = Arc::new(render);

        let weak = Arc::downgrade(runtime);
        let pass_render = Arc::clone(&render);
        runtime.register_consumer(
            id,
            Arc::new(move || {
                if let Some(runtime) = weak.upgrade() {
                    runtime.run_pass(id, &*pass_render);
                }
            }),
        );

        Self {
            id,
            runtime: Arc::downgrade(runtime),
            render,
        }
    }

    /// Run a render pass now.
    pub fn render(&self) {
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.run_pass(self.id, &*self.render);
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }
}

impl Drop for Consumer {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.remove_consumer(self.id);
        }
    }
}
