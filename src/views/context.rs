//! Render context merging.

use serde_json::{Map, Value};

/// Merge a call's context over the global context.
///
/// Objects merge recursively and call values win. A `null` call context
/// renders with the global context alone; any other non-object is passed
/// through untouched.
pub fn merge_context(global: &Map<String, Value>, call: Value) -> Value {
    match call {
        Value::Null => Value::Object(global.clone()),
        Value::Object(call) => {
            let mut merged = Value::Object(global.clone());
            merge_into(&mut merged, Value::Object(call));
            merged
        }
        other => other,
    }
}

fn merge_into(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target), Value::Object(source)) => {
            for (key, value) in source {
                match target.get_mut(&key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        merge_into(existing, value);
                    }
                    _ => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, source) => *target = source,
    }
}
