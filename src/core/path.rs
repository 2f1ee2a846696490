//! Field path resolution
//!
//! Navigates and mutates nested JSON objects using dot-separated paths such as
//! `owner_data.FeeFineOwner`. Every pipeline stage reads and writes record
//! fields through these two functions.
//!
//! - [`get`] never creates anything: the first missing segment (or a segment
//!   that is not an object) ends the walk with `None`. A present JSON `null`
//!   is returned as `Some(Value::Null)`, so "absent" and "null" stay distinct.
//! - [`set`] creates an empty object at every missing or non-object
//!   intermediate segment, then assigns the final key.
//!
//! Array indices are not part of the path syntax.

use serde_json::{Map, Value};

/// Split a dot path into its segments
pub fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('.')
}

/// Resolve `path` inside `root`
///
/// # Returns
///
/// * `Some(value)` if every segment resolved
/// * `None` if any segment is missing or an intermediate value is not an object
pub fn get<'a>(root: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut keys = segments(path);
    let first = keys.next()?;
    let mut current = root.get(first)?;

    for key in keys {
        current = current.as_object()?.get(key)?;
    }

    Some(current)
}

/// Write `value` at `path` inside `root`, creating intermediate objects
///
/// An intermediate segment holding a non-object value is replaced by an empty
/// object. The final key is always overwritten.
pub fn set(root: &mut Map<String, Value>, path: &str, value: Value) {
    let keys: Vec<&str> = segments(path).collect();
    let (last, parents) = match keys.split_last() {
        Some(split) => split,
        None => return,
    };

    let mut current = root;
    for key in parents {
        let slot = current
            .entry((*key).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        let Value::Object(map) = slot else {
            return;
        };
        current = map;
    }

    current.insert((*last).to_string(), value);
}
