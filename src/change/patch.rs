//! Patch algebra over dotted field paths.
//!
//! Every stored change is an ordered list of `add`/`replace`/`remove`
//! operations against dotted paths into a JSON payload. This module defines
//! those operations once, independently of any resource type: applying a
//! single operation, flattening a payload into a deterministic leaf map, and
//! rebuilding a payload from such a map.
//!
//! The semantics are sequential merge-patch: `add` and `replace` both set
//! the addressed leaf, creating missing intermediate containers (objects for
//! named segments, arrays for numeric segments) and coercing a mismatched
//! container or scalar into the shape the path requires. `remove` deletes
//! the leaf and is a no-op on an absent path. Only structurally unreadable
//! operations fail: an empty path, an empty path segment, or a missing value
//! on `add`/`replace`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

/// A dotted path addressing one leaf inside a resource payload.
///
/// Segments are separated by `.`; a segment consisting of decimal digits
/// indexes into an array (`steps.0.controls.layout`). Ordering is plain
/// lexicographic string order, which makes `BTreeMap<FieldPath, _>` iterate
/// deterministically.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldPath(String);

impl FieldPath {
    /// Creates a field path from a dotted string.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Creates a field path by joining segments with dots.
    #[must_use]
    pub fn from_segments<'a>(segments: impl IntoIterator<Item = &'a str>) -> Self {
        Self(segments.into_iter().collect::<Vec<_>>().join("."))
    }

    /// Returns the raw dotted path.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterates the path segments in order.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }
}

impl std::fmt::Display for FieldPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for FieldPath {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

/// Kind of a single diff operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchKind {
    /// Sets an absent leaf.
    Add,
    /// Overwrites an existing leaf.
    Replace,
    /// Deletes a leaf.
    Remove,
}

/// A single diff operation inside a stored change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOp {
    /// Path to the addressed leaf.
    pub path: FieldPath,
    /// Operation kind.
    pub op: PatchKind,
    /// Value for `add`/`replace`; absent for `remove`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// Structural errors in a diff operation.
///
/// These mark the operation as unreadable; the aggregation fold logs and
/// skips such operations instead of aborting the replay.
#[derive(Debug, Error)]
pub enum PatchError {
    /// The operation path is empty.
    #[error("Diff operation has an empty path")]
    EmptyPath,

    /// The operation path contains an empty segment.
    #[error("Diff path '{path}' contains an empty segment")]
    EmptySegment {
        /// The offending path.
        path: FieldPath,
    },

    /// An `add`/`replace` operation carries no value.
    #[error("Diff {op} on '{path}' is missing a value")]
    MissingValue {
        /// The valueless operation kind.
        op: PatchKind,
        /// The addressed path.
        path: FieldPath,
    },
}

impl PatchOp {
    /// Creates a set-style operation.
    #[must_use]
    pub fn set(op: PatchKind, path: impl Into<FieldPath>, value: Value) -> Self {
        Self {
            path: path.into(),
            op,
            value: Some(value),
        }
    }

    /// Creates a remove operation.
    #[must_use]
    pub fn remove(path: impl Into<FieldPath>) -> Self {
        Self {
            path: path.into(),
            op: PatchKind::Remove,
            value: None,
        }
    }
}

impl std::fmt::Display for PatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Add => "add",
            Self::Replace => "replace",
            Self::Remove => "remove",
        };
        write!(f, "{s}")
    }
}

/// Applies one diff operation to a payload in place.
///
/// # Errors
///
/// Returns a [`PatchError`] when the operation is structurally unreadable;
/// the payload is left untouched in that case.
pub fn apply_op(payload: &mut Value, op: &PatchOp) -> Result<(), PatchError> {
    if op.path.as_str().is_empty() {
        return Err(PatchError::EmptyPath);
    }
    if op.path.segments().any(str::is_empty) {
        return Err(PatchError::EmptySegment {
            path: op.path.clone(),
        });
    }

    let segments: Vec<&str> = op.path.segments().collect();
    match op.op {
        PatchKind::Add | PatchKind::Replace => {
            let value = op.value.clone().ok_or_else(|| PatchError::MissingValue {
                op: op.op,
                path: op.path.clone(),
            })?;
            set_at(payload, &segments, value);
            Ok(())
        }
        PatchKind::Remove => {
            remove_at(payload, &segments);
            Ok(())
        }
    }
}

/// Sets a value at a segment path, creating or coercing containers on the way.
fn set_at(current: &mut Value, segments: &[&str], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *current = value;
        return;
    };

    if let Ok(index) = head.parse::<usize>() {
        // Numeric segment: index into an array unless an object already owns
        // the position as a named key.
        if let Value::Object(map) = current {
            let slot = map.entry((*head).to_string()).or_insert(Value::Null);
            set_at(slot, rest, value);
            return;
        }
        if !current.is_array() {
            *current = Value::Array(Vec::new());
        }
        if let Value::Array(items) = current {
            if index >= items.len() {
                items.resize(index + 1, Value::Null);
            }
            set_at(&mut items[index], rest, value);
        }
    } else {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        if let Value::Object(map) = current {
            let slot = map.entry((*head).to_string()).or_insert(Value::Null);
            set_at(slot, rest, value);
        }
    }
}

/// Removes the leaf at a segment path; absent paths are a no-op.
fn remove_at(current: &mut Value, segments: &[&str]) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };

    if rest.is_empty() {
        match current {
            Value::Object(map) => {
                map.remove(*head);
            }
            Value::Array(items) => {
                if let Ok(index) = head.parse::<usize>()
                    && index < items.len()
                {
                    items.remove(index);
                }
            }
            _ => {}
        }
        return;
    }

    match current {
        Value::Object(map) => {
            if let Some(next) = map.get_mut(*head) {
                remove_at(next, rest);
            }
        }
        Value::Array(items) => {
            if let Ok(index) = head.parse::<usize>()
                && let Some(next) = items.get_mut(index)
            {
                remove_at(next, rest);
            }
        }
        _ => {}
    }
}

/// Flattens a payload into a deterministic leaf map.
///
/// Leaves are scalar values plus empty objects and empty arrays, so the
/// original shape survives a [`flatten`]/[`unflatten`] round trip. A
/// non-container root has no addressable leaves and yields an empty map.
#[must_use]
pub fn flatten(payload: &Value) -> BTreeMap<FieldPath, Value> {
    let mut leaves = BTreeMap::new();
    match payload {
        Value::Object(_) | Value::Array(_) => {
            flatten_into(payload, &mut Vec::new(), &mut leaves);
        }
        _ => {}
    }
    leaves
}

fn flatten_into<'a>(
    value: &'a Value,
    prefix: &mut Vec<&'a str>,
    leaves: &mut BTreeMap<FieldPath, Value>,
) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                prefix.push(key.as_str());
                flatten_into(child, prefix, leaves);
                prefix.pop();
            }
        }
        Value::Array(items) if !items.is_empty() => {
            // Indexes are materialized as owned segments only at the leaf.
            for (index, child) in items.iter().enumerate() {
                let segment = index.to_string();
                let mut own: Vec<String> = prefix.iter().map(|s| (*s).to_string()).collect();
                own.push(segment);
                flatten_owned(child, &mut own, leaves);
            }
            return;
        }
        _ => {
            leaves.insert(
                FieldPath::from_segments(prefix.iter().copied()),
                value.clone(),
            );
        }
    }
}

fn flatten_owned(value: &Value, prefix: &mut Vec<String>, leaves: &mut BTreeMap<FieldPath, Value>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                prefix.push(key.clone());
                flatten_owned(child, prefix, leaves);
                prefix.pop();
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (index, child) in items.iter().enumerate() {
                prefix.push(index.to_string());
                flatten_owned(child, prefix, leaves);
                prefix.pop();
            }
        }
        _ => {
            leaves.insert(
                FieldPath::from_segments(prefix.iter().map(String::as_str)),
                value.clone(),
            );
        }
    }
}

/// Rebuilds a nested payload from a leaf map.
///
/// Paths produced by [`flatten`] always rebuild cleanly; a structurally
/// invalid path (empty, or with an empty segment) is skipped.
#[must_use]
pub fn unflatten(leaves: &BTreeMap<FieldPath, Value>) -> Value {
    let mut payload = Value::Object(Map::new());
    for (path, value) in leaves {
        if path.as_str().is_empty() || path.segments().any(str::is_empty) {
            continue;
        }
        let segments: Vec<&str> = path.segments().collect();
        set_at(&mut payload, &segments, value.clone());
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_add_creates_nested_containers() {
        let mut payload = json!({});
        let op = PatchOp::set(PatchKind::Add, "steps.0.controls.layout", json!("marketing"));

        apply_op(&mut payload, &op).expect("add should apply");

        assert_eq!(
            payload,
            json!({"steps": [{"controls": {"layout": "marketing"}}]})
        );
    }

    #[test]
    fn test_replace_overwrites_existing_leaf() {
        let mut payload = json!({"body": "Hello"});
        let op = PatchOp::set(PatchKind::Replace, "body", json!("Hi"));

        apply_op(&mut payload, &op).expect("replace should apply");

        assert_eq!(payload, json!({"body": "Hi"}));
    }

    #[test]
    fn test_remove_absent_path_is_noop() {
        let mut payload = json!({"body": "Hi"});
        let op = PatchOp::remove("steps.3.name");

        apply_op(&mut payload, &op).expect("remove should apply");

        assert_eq!(payload, json!({"body": "Hi"}));
    }

    #[test]
    fn test_remove_array_element_shifts() {
        let mut payload = json!({"tags": ["a", "b", "c"]});
        let op = PatchOp::remove("tags.1");

        apply_op(&mut payload, &op).expect("remove should apply");

        assert_eq!(payload, json!({"tags": ["a", "c"]}));
    }

    #[test]
    fn test_set_coerces_scalar_into_container() {
        let mut payload = json!({"controls": 5});
        let op = PatchOp::set(PatchKind::Replace, "controls.layout", json!("base"));

        apply_op(&mut payload, &op).expect("replace should apply");

        assert_eq!(payload, json!({"controls": {"layout": "base"}}));
    }

    #[test]
    fn test_sparse_array_index_null_fills() {
        let mut payload = json!({});
        let op = PatchOp::set(PatchKind::Add, "steps.2", json!("third"));

        apply_op(&mut payload, &op).expect("add should apply");

        assert_eq!(payload, json!({"steps": [null, null, "third"]}));
    }

    #[test]
    fn test_malformed_ops_are_rejected() {
        let mut payload = json!({"body": "Hi"});

        let empty_path = PatchOp::set(PatchKind::Add, "", json!(1));
        assert!(matches!(
            apply_op(&mut payload, &empty_path),
            Err(PatchError::EmptyPath)
        ));

        let empty_segment = PatchOp::set(PatchKind::Add, "a..b", json!(1));
        assert!(matches!(
            apply_op(&mut payload, &empty_segment),
            Err(PatchError::EmptySegment { .. })
        ));

        let missing_value = PatchOp {
            path: FieldPath::new("body"),
            op: PatchKind::Replace,
            value: None,
        };
        assert!(matches!(
            apply_op(&mut payload, &missing_value),
            Err(PatchError::MissingValue { .. })
        ));

        // The payload is untouched by rejected operations.
        assert_eq!(payload, json!({"body": "Hi"}));
    }

    #[test]
    fn test_flatten_is_lexicographically_ordered() {
        let payload = json!({"b": 2, "a": {"z": 1, "k": [true]}});

        let leaves = flatten(&payload);
        let paths: Vec<&str> = leaves.keys().map(FieldPath::as_str).collect();

        assert_eq!(paths, vec!["a.k.0", "a.z", "b"]);
    }

    #[test]
    fn test_flatten_keeps_empty_containers() {
        let payload = json!({"steps": [], "meta": {}});

        let leaves = flatten(&payload);

        assert_eq!(leaves.get(&FieldPath::new("steps")), Some(&json!([])));
        assert_eq!(leaves.get(&FieldPath::new("meta")), Some(&json!({})));
    }

    #[test]
    fn test_unflatten_rebuilds_nested_shape() {
        let payload = json!({
            "trigger": {"identifier": "welcome"},
            "steps": [{"template": "t1"}, {"template": "t2"}],
            "active": true
        });

        let rebuilt = unflatten(&flatten(&payload));

        assert_eq!(rebuilt, payload);
    }
}
