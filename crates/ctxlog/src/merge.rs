//! Recursive deep merge of JSON trees.
//!
//! Objects merge key by key. Every other value (arrays included) in the
//! update replaces the existing value outright. `null` in the update counts
//! as "not set" and leaves the existing value alone.

use serde_json::{Map, Value};

/// Merge `update` onto `base`, returning the result.
///
/// Neither input is modified.
#[must_use]
pub fn deep_merge(base: &Value, update: &Value) -> Value {
    match (base, update) {
        (_, Value::Null) => base.clone(),
        (Value::Object(base), Value::Object(update)) => Value::Object(merge_maps(base, update)),
        (_, Value::Object(update)) => Value::Object(merge_maps(&Map::new(), update)),
        (_, other) => other.clone(),
    }
}

fn merge_maps(base: &Map<String, Value>, update: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = base.clone();
    for (key, incoming) in update {
        if incoming.is_null() {
            continue;
        }
        let value = match merged.get(key) {
            Some(existing) => deep_merge(existing, incoming),
            None => deep_merge(&Value::Null, incoming),
        };
        merged.insert(key.clone(), value);
    }
    merged
}
