//! Deep path accessors and merge helpers over `serde_json::Value`.
//!
//! Writes auto-vivify missing containers: a key segment creates an
//! object, an index segment creates (or pads) an array with `Null`
//! placeholders. Removal via [`unset_at`] deletes the slot entirely,
//! which is distinct from writing `Null`.

use crate::{Path, Seg};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// How a bulk write combines with the existing tree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Replace the whole tree with the incoming values.
    Overwrite,
    /// Recursive deep merge; colliding non-object leaves are replaced.
    #[default]
    Merge,
    /// Top-level merge only; colliding subtrees are replaced wholesale.
    ShallowMerge,
}

/// Get a reference to the value at a path.
pub fn get_at<'a>(doc: &'a Value, path: &Path) -> Option<&'a Value> {
    let mut current = doc;
    for seg in path.segments() {
        match seg {
            Seg::Key(key) => current = current.get(key)?,
            Seg::Index(idx) => current = current.get(idx)?,
        }
    }
    Some(current)
}

/// Get a mutable reference to the value at a path.
pub fn get_at_mut<'a>(doc: &'a mut Value, path: &Path) -> Option<&'a mut Value> {
    let mut current = doc;
    for seg in path.segments() {
        match seg {
            Seg::Key(key) => current = current.get_mut(key)?,
            Seg::Index(idx) => current = current.get_mut(idx)?,
        }
    }
    Some(current)
}

/// Check whether a path exists in the document.
#[inline]
pub fn has_at(doc: &Value, path: &Path) -> bool {
    get_at(doc, path).is_some()
}

/// Set a value at a path, creating intermediate containers as needed.
///
/// A key segment vivifies an object; an index segment vivifies an
/// array, padding it with `Null` up to the index.
pub fn set_at(doc: &mut Value, path: &Path, value: Value) {
    set_segments(doc, path.segments(), value);
}

fn set_segments(current: &mut Value, segments: &[Seg], value: Value) {
    match segments {
        [] => *current = value,
        [Seg::Key(key), rest @ ..] => {
            if !current.is_object() {
                *current = Value::Object(Map::new());
            }
            let obj = current.as_object_mut().expect("object just ensured");
            if rest.is_empty() {
                obj.insert(key.clone(), value);
            } else {
                let entry = obj.entry(key.clone()).or_insert(Value::Null);
                set_segments(entry, rest, value);
            }
        }
        [Seg::Index(idx), rest @ ..] => {
            if !current.is_array() {
                *current = Value::Array(Vec::new());
            }
            let arr = current.as_array_mut().expect("array just ensured");
            if arr.len() <= *idx {
                arr.resize(*idx + 1, Value::Null);
            }
            if rest.is_empty() {
                arr[*idx] = value;
            } else {
                set_segments(&mut arr[*idx], rest, value);
            }
        }
    }
}

/// Remove the value at a path. Returns true if something was removed.
///
/// Removing an index splices the element out of the array; removing a
/// key drops it from the object. Missing paths are a no-op.
pub fn unset_at(doc: &mut Value, path: &Path) -> bool {
    unset_segments(doc, path.segments())
}

fn unset_segments(current: &mut Value, segments: &[Seg]) -> bool {
    match segments {
        [] => false,
        [Seg::Key(key)] => current
            .as_object_mut()
            .map(|obj| obj.remove(key).is_some())
            .unwrap_or(false),
        [Seg::Index(idx)] => current
            .as_array_mut()
            .map(|arr| {
                if *idx < arr.len() {
                    arr.remove(*idx);
                    true
                } else {
                    false
                }
            })
            .unwrap_or(false),
        [Seg::Key(key), rest @ ..] => current
            .as_object_mut()
            .and_then(|obj| obj.get_mut(key))
            .map(|child| unset_segments(child, rest))
            .unwrap_or(false),
        [Seg::Index(idx), rest @ ..] => current
            .as_array_mut()
            .and_then(|arr| arr.get_mut(*idx))
            .map(|child| unset_segments(child, rest))
            .unwrap_or(false),
    }
}

/// Recursively merge `incoming` into `target`.
///
/// Objects merge key-by-key; everything else (arrays included) is
/// replaced by the incoming value.
pub fn deep_merge(target: &mut Value, incoming: Value) {
    match (target, incoming) {
        (Value::Object(t), Value::Object(inc)) => {
            for (k, v) in inc {
                match t.get_mut(&k) {
                    Some(slot) => deep_merge(slot, v),
                    None => {
                        t.insert(k, v);
                    }
                }
            }
        }
        (slot, incoming) => *slot = incoming,
    }
}

/// Merge only the top level of `incoming` into `target`; colliding
/// subtrees are replaced wholesale.
pub fn shallow_merge(target: &mut Value, incoming: Value) {
    match (target, incoming) {
        (Value::Object(t), Value::Object(inc)) => {
            for (k, v) in inc {
                t.insert(k, v);
            }
        }
        (slot, incoming) => *slot = incoming,
    }
}

/// Apply a bulk write to `target` under the given strategy.
pub fn apply_strategy(target: &mut Value, incoming: Value, strategy: MergeStrategy) {
    match strategy {
        MergeStrategy::Overwrite => *target = incoming,
        MergeStrategy::Merge => deep_merge(target, incoming),
        MergeStrategy::ShallowMerge => shallow_merge(target, incoming),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path;
    use serde_json::json;

    #[test]
    fn test_set_creates_intermediate_objects() {
        let mut doc = json!({});
        set_at(&mut doc, &path!("a", "b", "c"), json!(42));
        assert_eq!(doc, json!({"a": {"b": {"c": 42}}}));
    }

    #[test]
    fn test_set_vivifies_arrays() {
        let mut doc = json!({});
        set_at(&mut doc, &path!("list", 2, "name"), json!("x"));
        assert_eq!(doc, json!({"list": [null, null, {"name": "x"}]}));
    }

    #[test]
    fn test_set_overwrites_leaf() {
        let mut doc = json!({"a": 1});
        set_at(&mut doc, &path!("a"), json!({"b": 2}));
        assert_eq!(doc, json!({"a": {"b": 2}}));
    }

    #[test]
    fn test_get_at() {
        let doc = json!({"list": [{"name": "a"}]});
        assert_eq!(get_at(&doc, &path!("list", 0, "name")), Some(&json!("a")));
        assert_eq!(get_at(&doc, &path!("list", 1)), None);
    }

    #[test]
    fn test_unset_key() {
        let mut doc = json!({"a": 1, "b": 2});
        assert!(unset_at(&mut doc, &path!("a")));
        assert_eq!(doc, json!({"b": 2}));
        assert!(!unset_at(&mut doc, &path!("a")));
    }

    #[test]
    fn test_unset_index_splices() {
        let mut doc = json!({"list": [1, 2, 3]});
        assert!(unset_at(&mut doc, &path!("list", 1)));
        assert_eq!(doc, json!({"list": [1, 3]}));
    }

    #[test]
    fn test_unset_is_not_null_write() {
        let mut doc = json!({"a": 1});
        unset_at(&mut doc, &path!("a"));
        assert!(!has_at(&doc, &path!("a")));

        set_at(&mut doc, &path!("a"), Value::Null);
        assert!(has_at(&doc, &path!("a")));
    }

    #[test]
    fn test_deep_merge() {
        let mut target = json!({"a": {"x": 1, "y": 2}, "b": 3});
        deep_merge(&mut target, json!({"a": {"y": 20, "z": 30}}));
        assert_eq!(target, json!({"a": {"x": 1, "y": 20, "z": 30}, "b": 3}));
    }

    #[test]
    fn test_shallow_merge_replaces_subtrees() {
        let mut target = json!({"a": {"x": 1, "y": 2}, "b": 3});
        shallow_merge(&mut target, json!({"a": {"z": 30}}));
        assert_eq!(target, json!({"a": {"z": 30}, "b": 3}));
    }

    #[test]
    fn test_apply_strategy_overwrite() {
        let mut target = json!({"a": 1, "b": 2});
        apply_strategy(&mut target, json!({"a": 2}), MergeStrategy::Overwrite);
        assert_eq!(target, json!({"a": 2}));
    }

    #[test]
    fn test_merge_replaces_arrays() {
        let mut target = json!({"list": [1, 2, 3]});
        deep_merge(&mut target, json!({"list": [9]}));
        assert_eq!(target, json!({"list": [9]}));
    }
}
