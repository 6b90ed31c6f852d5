//! # Slotcan
//!
//! Process-wide keyed reactive slots for Rust.
//!
//! Slotcan binds two ways of reaching the same named values:
//!
//! ## Scoped access (declarative)
//!
//! A mounted [`StoreProvider`] wraps a consumer subtree in one propagation
//! scope per declared key:
//! - [`use_store_slot`] - Read a slot and get its [`Dispatcher`]; the
//!   consumer re-renders when the slot changes
//! - [`Channel`] - The per-key broadcast handle behind every scope
//! - [`Consumer`] - A render pass re-run by the channels it read
//!
//! ## Facade access (imperative)
//!
//! - [`Store`] - `get`/`set` on any declared key by name
//! - [`add_change_listener`] - Out-of-band callbacks run on every write
//! - Persistence - Slots can be written through to a [`StorageAdapter`]
//!
//! Every write runs the same chain: persist, notify listeners, propagate.

pub mod channel;
pub mod error;
pub mod runtime;
pub mod storage;
pub mod store;

// Re-export main types for convenience
pub use channel::{Channel, Consumer};
pub use error::{Result, StoreError};
pub use runtime::ChangeListener;
pub use storage::{FileStorage, MemoryStorage, StorageAdapter, StorageError};
#[allow(deprecated)]
pub use store::create_store;
pub use store::{
    add_change_listener, declare_store, remove_change_listener, use_store_slot, use_store_slot_as,
    Dispatcher, InitHook, MountedStore, PersistenceRule, Store, StoreConfig, StoreProvider, Transform,
};
