//! Reconciliation between slots and the durable medium.

use super::config::PersistenceRule;
use crate::error::Result;
use crate::runtime::ReactiveRuntime;
use crate::storage::StorageAdapter;
use serde_json::Value;

/// Resolve the value a freshly entered scope is seeded with.
///
/// The first resolution of a key consults the durable medium (durable
/// wins). Later mounts reuse the registry's current value, which
/// write-through keeps equal to the durable one.
pub(crate) fn resolve_live_value(runtime: &ReactiveRuntime, key: &str) -> Result<Value> {
    let (default, rule, storage) = {
        let registry = runtime.registry();
        let slot = registry.slot(key)?;
        if slot.resolved {
            return Ok(slot.current.clone());
        }
        (slot.default.clone(), registry.rule(key), registry.storage())
    };

    let value = match (rule, storage) {
        (Some(rule), Some(storage)) => read_durable(storage.as_ref(), key, &rule, default),
        _ => default,
    };

    let mut registry = runtime.registry();
    let slot = registry.slot_mut(key)?;
    slot.resolved = true;
    slot.current = value.clone();
    Ok(value)
}

fn read_durable(storage: &dyn StorageAdapter, key: &str, rule: &PersistenceRule, default: Value) -> Value {
    let raw = match storage.get_item(key) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(target: "slotcan::persistence", key, error = %e, "failed to read persisted value, using default");
            None
        }
    };

    let parsed = raw.and_then(|raw| match serde_json::from_str::<Value>(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(target: "slotcan::persistence", key, error = %e, "persisted value is not valid JSON, using default");
            None
        }
    });

    match parsed {
        Some(stored) => rule.restore(stored),
        None => {
            store(storage, key, &default);
            default
        }
    }
}

/// Write a value through to the durable medium if the key is persisted.
pub(crate) fn write_through(runtime: &ReactiveRuntime, key: &str, value: &Value) {
    let target = {
        let registry = runtime.registry();
        registry.rule(key).and(registry.storage())
    };
    if let Some(storage) = target {
        store(storage.as_ref(), key, value);
    }
}

fn store(storage: &dyn StorageAdapter, key: &str, value: &Value) {
    let text = match serde_json::to_string(value) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(target: "slotcan::persistence", key, error = %e, "failed to serialize value");
            return;
        }
    };
    if let Err(e) = storage.set_item(key, &text) {
        tracing::warn!(target: "slotcan::persistence", key, error = %e, "failed to persist value");
    }
}

/// Whether both a rule and a medium exist for `key`.
pub(crate) fn is_persisted(runtime: &ReactiveRuntime, key: &str) -> bool {
    let registry = runtime.registry();
    registry.rule(key).is_some() && registry.storage().is_some()
}
