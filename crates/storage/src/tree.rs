//! Tree splicing helpers shared by the local backends.

use serde_json::{Map, Value};

use crate::StorePath;

/// Resolves the value at `path` inside `root`; explicit nulls read as absent.
pub(crate) fn value_at<'v>(root: &'v Value, path: &StorePath) -> Option<&'v Value> {
    let mut current = root;
    for segment in path.segments() {
        current = current.get(segment)?;
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

/// Resolves a slash-separated field path inside one child value.
pub(crate) fn field_at<'v>(value: &'v Value, field_path: &str) -> Option<&'v Value> {
    let mut current = value;
    for segment in field_path.split('/').filter(|segment| !segment.is_empty()) {
        current = current.get(segment)?;
    }
    Some(current)
}

/// Splices `value` into `root` at `path`, creating intermediate objects as
/// needed; `None` removes the subtree. Non-object intermediates are replaced,
/// matching the remote store's overwrite semantics.
pub(crate) fn write_at(root: &mut Value, path: &StorePath, value: Option<Value>) {
    let segments: Vec<&str> = path.segments().collect();
    let Some((last, parents)) = segments.split_last() else {
        *root = value.unwrap_or(Value::Null);
        return;
    };

    let mut current = root;
    for segment in parents {
        current = ensure_object(current)
            .entry((*segment).to_owned())
            .or_insert(Value::Null);
    }

    let map = ensure_object(current);
    match value {
        Some(value) => {
            map.insert((*last).to_owned(), value);
        }
        None => {
            map.remove(*last);
        }
    }
}

fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just replaced with an object"),
    }
}
