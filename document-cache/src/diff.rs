//! Structural comparison of JSON documents
//!
//! The server always pushes whole documents, never deltas. These helpers
//! reconstruct which top-level fields differ between two versions.

use serde_json::{Map, Value};

/// Field carrying the server-side modification timestamp of a document
pub const UPDATE_TIME_FIELD: &str = "update_time";

/// Recursive structural equality over JSON values
///
/// Numbers compare by numeric value, so `1` and `1.0` are equal. Arrays are
/// compared element-wise and are length-sensitive; objects are compared
/// key-by-key regardless of key order.
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| values_equal(l, r))
        }
        (Value::Object(x), Value::Object(y)) => objects_equal(x, y),
        _ => false,
    }
}

fn objects_equal(x: &Map<String, Value>, y: &Map<String, Value>) -> bool {
    x.len() == y.len()
        && x.iter()
            .all(|(key, value)| y.get(key).is_some_and(|other| values_equal(value, other)))
}

/// Names of the top-level fields that differ between two document versions
///
/// Keys of `previous` come first in their own order, followed by keys that
/// only exist in `current`. A key present on one side only counts as
/// changed, even when the present value is `null`. Non-object documents
/// have no fields.
pub fn changed_fields(previous: &Value, current: &Value) -> Vec<String> {
    let empty = Map::new();
    let previous = previous.as_object().unwrap_or(&empty);
    let current = current.as_object().unwrap_or(&empty);

    let mut fields = Vec::new();

    for (key, old) in previous {
        let differs = match current.get(key) {
            Some(new) => !values_equal(old, new),
            None => true,
        };
        if differs {
            fields.push(key.clone());
        }
    }

    for key in current.keys() {
        if !previous.contains_key(key) {
            fields.push(key.clone());
        }
    }

    fields
}

/// Numeric `update_time` of a document, or `0.0` when absent or non-numeric
pub fn update_time_of(document: &Value) -> f64 {
    document
        .get(UPDATE_TIME_FIELD)
        .and_then(Value::as_f64)
        .unwrap_or(0.0)
}
