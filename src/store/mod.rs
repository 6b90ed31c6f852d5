//! Keyed store slots.
//!
//! A store is declared once with [`StoreConfig`], mounted under a
//! [`StoreProvider`], and then reached two ways: the [`Store`] facade for
//! imperative get/set, and [`use_store_slot`] for reads that re-render
//! their consumer.

mod config;
mod declare;
mod dispatcher;
mod persistence;
mod scope;
mod store;

#[allow(deprecated)]
pub use declare::create_store;
pub use config::{InitHook, PersistenceRule, StoreConfig, Transform};
pub use declare::{add_change_listener, declare_store, remove_change_listener};
pub use dispatcher::Dispatcher;
pub use scope::{use_store_slot, use_store_slot_as, MountedStore, StoreProvider};
pub use store::Store;
