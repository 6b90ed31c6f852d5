//! Durable media for persisted slots.
//!
//! The store only ever talks to a medium through [`StorageAdapter`]: a
//! synchronous, string-keyed get/set. Values arrive already serialized as
//! JSON text.

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use thiserror::Error;

/// Errors reported by a storage adapter.
#[derive(Debug, Error)]
pub enum StorageError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The key cannot be addressed by this medium.
    #[error("Invalid storage key: {0:?}")]
    InvalidKey(String),

    /// Any other failure of the underlying medium.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Synchronous string-keyed access to a durable medium.
///
/// Both calls block the caller, so a slow adapter stalls scope mounting
/// and every write to a persisted key.
pub trait StorageAdapter: Send + Sync {
    /// Read the raw text stored under `key`, `None` if nothing is stored.
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous text.
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
}
