//! Record merge semantics shared by every backend.
//!
//! Upserts and updates merge an incoming record onto the stored one:
//! top-level fields are overwritten, the nested `metadata` object is merged
//! recursively so keys the caller did not mention survive.

use crate::models::Record;
use serde_json::Value;

/// Column whose value is deep-merged instead of replaced.
pub const METADATA_KEY: &str = "metadata";

/// Recursively merges `patch` into `base`.
///
/// Objects merge key by key; any other combination replaces `base` with
/// `patch`. Arrays are replaced, not concatenated.
///
/// # Examples
///
/// ```
/// use archon_dal::storage::merge::deep_merge;
/// use serde_json::json;
///
/// let mut base = json!({"a": 1, "nested": {"x": 1}});
/// deep_merge(&mut base, json!({"b": 2, "nested": {"y": 2}}));
/// assert_eq!(base, json!({"a": 1, "b": 2, "nested": {"x": 1, "y": 2}}));
/// ```
pub fn deep_merge(base: &mut Value, patch: Value) {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            for (key, value) in patch_map {
                match base_map.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key, value);
                    },
                }
            }
        },
        (base, patch) => *base = patch,
    }
}

/// Merges `incoming` onto a copy of `existing`.
///
/// Shallow override for every top-level key except [`METADATA_KEY`], which is
/// deep-merged when both sides hold an object.
#[must_use]
pub fn merge_record(existing: &Record, incoming: Record) -> Record {
    let mut merged = existing.clone();
    for (key, value) in incoming {
        if key == METADATA_KEY
            && let Some(slot) = merged.get_mut(METADATA_KEY)
            && slot.is_object()
        {
            deep_merge(slot, value);
            continue;
        }
        merged.insert(key, value);
    }
    merged
}
