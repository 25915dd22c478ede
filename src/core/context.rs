//! Pure helpers over JSON contexts.
//!
//! Action results are partial deltas. They are merged into the live context,
//! never substituted for it:
//! - objects merge key by key, recursively
//! - arrays and scalars in the delta replace the target
//! - `null` in the delta stands for "undefined" and never overwrites a value

use serde_json::{Map, Value};

/// Merge `delta` into a copy of `target`.
///
/// # Example
///
/// ```rust
/// use mindset_statechart::core::deep_merge;
/// use serde_json::json;
///
/// let context = json!({ "user": { "name": "ada", "tags": [1, 2] }, "count": 1 });
/// let delta = json!({ "user": { "tags": [3] }, "count": null });
///
/// assert_eq!(
///     deep_merge(&context, &delta),
///     json!({ "user": { "name": "ada", "tags": [3] }, "count": 1 })
/// );
/// ```
pub fn deep_merge(target: &Value, delta: &Value) -> Value {
    let mut out = target.clone();
    merge_into(&mut out, delta);
    out
}

/// In-place variant of [`deep_merge`].
pub fn merge_into(target: &mut Value, delta: &Value) {
    match (target, delta) {
        (_, Value::Null) => {}
        (Value::Object(target), Value::Object(delta)) => {
            for (key, value) in delta {
                if value.is_null() {
                    continue;
                }
                match target.get_mut(key) {
                    Some(existing) => merge_into(existing, value),
                    None => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, delta) if delta.is_object() => {
            *target = Value::Object(Map::new());
            merge_into(target, delta);
        }
        (target, delta) => *target = delta.clone(),
    }
}

/// Read a dot-separated path. Numeric segments index arrays, an empty path
/// returns the whole value.
///
/// ```rust
/// use mindset_statechart::core::select;
/// use serde_json::json;
///
/// let context = json!({ "items": [{ "id": 7 }] });
/// assert_eq!(select(&context, "items.0.id"), Some(&json!(7)));
/// assert_eq!(select(&context, "items.3"), None);
/// ```
pub fn select<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Wrap `value` so that merging the result writes it at `path`.
///
/// ```rust
/// use mindset_statechart::core::nest;
/// use serde_json::json;
///
/// assert_eq!(nest("a.b", json!(1)), json!({ "a": { "b": 1 } }));
/// assert_eq!(nest("", json!({ "x": 1 })), json!({ "x": 1 }));
/// ```
pub fn nest(path: &str, value: Value) -> Value {
    path.split('.')
        .filter(|s| !s.is_empty())
        .rev()
        .fold(value, |inner, segment| {
            let mut map = Map::new();
            map.insert(segment.to_string(), inner);
            Value::Object(map)
        })
}
