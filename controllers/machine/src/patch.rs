//! JSON merge patch (RFC 7386) computation

use serde_json::{Map, Value};

/// Compute the merge patch turning `original` into `updated`
///
/// Returns `None` when both are equal. Removed object keys are emitted as
/// `null`; arrays and scalars are replaced wholesale.
pub fn merge_diff(original: &Value, updated: &Value) -> Option<Value> {
    if original == updated {
        return None;
    }

    let (Value::Object(old), Value::Object(new)) = (original, updated) else {
        return Some(updated.clone());
    };

    let mut patch = Map::new();
    for (key, value) in new {
        match old.get(key) {
            Some(previous) => {
                if let Some(diff) = merge_diff(previous, value) {
                    patch.insert(key.clone(), diff);
                }
            }
            None => {
                patch.insert(key.clone(), value.clone());
            }
        }
    }
    for key in old.keys().filter(|k| !new.contains_key(*k)) {
        patch.insert(key.clone(), Value::Null);
    }

    (!patch.is_empty()).then_some(Value::Object(patch))
}

/// Split a serialized resource into its main part and its `status`
pub fn split_status(mut resource: Value) -> (Value, Value) {
    let status = resource
        .as_object_mut()
        .and_then(|obj| obj.remove("status"))
        .unwrap_or(Value::Null);
    (resource, status)
}
