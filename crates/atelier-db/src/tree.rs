//! Navigation and in-place edits of a JSON document addressed by path segments.
//!
//! Objects are addressed by key and arrays by decimal index. `null` is the
//! same as absent, and containers left without children are removed, which is
//! how the hosted tree behaves.

use serde_json::{Map, Value};

pub fn lookup<'a>(node: &'a Value, segments: &[String]) -> Option<&'a Value> {
    let mut current = node;
    for segment in segments {
        current = child(current, segment)?;
    }
    if is_empty_node(current) {
        None
    } else {
        Some(current)
    }
}

fn child<'a>(node: &'a Value, segment: &str) -> Option<&'a Value> {
    match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

/// Writes `value` at `segments`, replacing scalars on the way with objects.
pub fn insert(node: &mut Value, segments: &[String], value: Value) {
    let Some((first, rest)) = segments.split_first() else {
        *node = value;
        return;
    };

    if let Value::Array(items) = node {
        if let Some(slot) = first.parse::<usize>().ok().and_then(|i| items.get_mut(i)) {
            insert(slot, rest, value);
            return;
        }
    }

    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        let slot = map.entry(first.clone()).or_insert(Value::Null);
        insert(slot, rest, value);
    }
}

/// Removes the value at `segments` and prunes the containers it leaves empty.
/// Returns whether anything was removed.
pub fn remove(node: &mut Value, segments: &[String]) -> bool {
    let Some((first, rest)) = segments.split_first() else {
        return false;
    };

    match node {
        Value::Object(map) => {
            if rest.is_empty() {
                return map.remove(first).is_some();
            }
            let Some(next) = map.get_mut(first) else {
                return false;
            };
            let removed = remove(next, rest);
            if removed && is_empty_node(next) {
                map.remove(first);
            }
            removed
        }
        Value::Array(items) => {
            let Some(index) = first.parse::<usize>().ok().filter(|i| *i < items.len()) else {
                return false;
            };
            // Sparse like the hosted tree: later indices keep their position.
            let removed = if rest.is_empty() {
                let existed = !items[index].is_null();
                items[index] = Value::Null;
                existed
            } else {
                let removed = remove(&mut items[index], rest);
                if removed && is_empty_node(&items[index]) {
                    items[index] = Value::Null;
                }
                removed
            };
            while items.last().is_some_and(Value::is_null) {
                items.pop();
            }
            removed
        }
        _ => false,
    }
}

pub fn is_empty_node(node: &Value) -> bool {
    match node {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.iter().all(Value::is_null),
        _ => false,
    }
}
