//! Error types for store operations.

use thiserror::Error;

/// Errors surfaced at the call site of a store operation.
///
/// Every variant is local to the operation that produced it; other slots
/// are never affected.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The key was never passed to a store declaration.
    #[error("store key `{key}` was never declared")]
    UndeclaredKey { key: String },

    /// The key is declared but no mounted scope currently owns its dispatcher.
    #[error("store key `{key}` has no mounted scope, mount a StoreProvider before writing to it")]
    UnmountedKey { key: String },

    /// The slot value could not be converted to or from the requested type.
    #[error("value of store key `{key}` does not match the requested type: {source}")]
    Conversion {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub(crate) fn undeclared(key: impl Into<String>) -> Self {
        Self::UndeclaredKey { key: key.into() }
    }

    pub(crate) fn unmounted(key: impl Into<String>) -> Self {
        Self::UnmountedKey { key: key.into() }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
