//! Runtime support for store slots.
//!
//! This module provides the process-wide state behind every store: the slot
//! registry, the listener registry and the dependency graph that re-renders
//! consumers when a channel they read changes.

mod context;
mod listeners;
mod registry;

pub use context::ReactiveRuntime;
pub use listeners::ChangeListener;
pub(crate) use context::RenderPass;
