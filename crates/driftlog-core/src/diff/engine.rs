//! Structural diff computation engine.
//!
//! The entry point is [`compute_delta`], which compares two canonical
//! documents and produces a [`StructuralDelta`].

use crate::canonical::canonicalizer::canonical_bytes;
use crate::canonical::{render_path, strip_all, PathPattern, PathSegment};
use crate::diff::model::{JsonType, StructuralDelta, TypeChange, ValueChange};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Compute the structural delta from `old` to `new`.
///
/// Nodes named by `exclude` are removed from both sides first. Sequences are
/// compared as multisets, so reordering alone is not a change.
///
/// # Example
///
/// ```
/// use driftlog_core::diff::compute_delta;
/// use serde_json::json;
///
/// let old = json!({"spec": {"image": "nginx:1.24", "ports": [80, 443]}});
/// let new = json!({"spec": {"image": "nginx:1.25", "ports": [443, 80]}});
/// let delta = compute_delta(&old, &new, &[]);
/// assert_eq!(delta.paths(), vec!["spec.image"]);
/// ```
pub fn compute_delta(old: &Value, new: &Value, exclude: &[PathPattern]) -> StructuralDelta {
    let (old, new) = if exclude.is_empty() {
        (Cow::Borrowed(old), Cow::Borrowed(new))
    } else {
        let mut old = old.clone();
        let mut new = new.clone();
        strip_all(&mut old, exclude);
        strip_all(&mut new, exclude);
        (Cow::Owned(old), Cow::Owned(new))
    };

    let mut delta = StructuralDelta::default();
    let mut path = Vec::new();
    diff_node(&old, &new, &mut path, &mut delta);
    delta
}

fn diff_node(old: &Value, new: &Value, path: &mut Vec<PathSegment>, delta: &mut StructuralDelta) {
    if old == new {
        return;
    }
    match (old, new) {
        (Value::Object(a), Value::Object(b)) => diff_mapping(a, b, path, delta),
        (Value::Array(a), Value::Array(b)) => diff_sequence(a, b, path, delta),
        _ => {
            let (old_type, new_type) = (JsonType::of(old), JsonType::of(new));
            if old_type == new_type {
                delta.values_changed.insert(
                    render_path(path),
                    ValueChange {
                        old_value: old.clone(),
                        new_value: new.clone(),
                    },
                );
            } else {
                delta.type_changed.insert(
                    render_path(path),
                    TypeChange {
                        old_type,
                        new_type,
                        old_value: old.clone(),
                        new_value: new.clone(),
                    },
                );
            }
        }
    }
}

fn diff_mapping(
    a: &Map<String, Value>,
    b: &Map<String, Value>,
    path: &mut Vec<PathSegment>,
    delta: &mut StructuralDelta,
) {
    let keys: BTreeSet<&String> = a.keys().chain(b.keys()).collect();
    for key in keys {
        path.push(PathSegment::Key(key.clone()));
        match (a.get(key), b.get(key)) {
            (Some(old), Some(new)) => diff_node(old, new, path, delta),
            (Some(old), None) => {
                delta.item_removed.insert(render_path(path), old.clone());
            }
            (None, Some(new)) => {
                delta.item_added.insert(render_path(path), new.clone());
            }
            (None, None) => {}
        }
        path.pop();
    }
}

/// Order-insensitive sequence comparison.
///
/// 1. Members equal on both sides are matched as a multiset and dropped.
/// 2. Leftover mapping members sharing a `name` are paired and diffed in place,
///    reported under the new-side index.
/// 3. Whatever remains is reported as removed (old index) or added (new index).
fn diff_sequence(a: &[Value], b: &[Value], path: &mut Vec<PathSegment>, delta: &mut StructuralDelta) {
    let mut pool: BTreeMap<Vec<u8>, VecDeque<usize>> = BTreeMap::new();
    for (index, item) in a.iter().enumerate() {
        pool.entry(canonical_bytes(item)).or_default().push_back(index);
    }

    let mut unmatched_new = Vec::new();
    for (index, item) in b.iter().enumerate() {
        let matched = pool
            .get_mut(&canonical_bytes(item))
            .and_then(VecDeque::pop_front)
            .is_some();
        if !matched {
            unmatched_new.push(index);
        }
    }

    let mut unmatched_old: Vec<usize> = pool.into_values().flatten().collect();
    unmatched_old.sort_unstable();

    let mut paired_old = BTreeSet::new();
    let mut still_new = Vec::new();
    for new_index in unmatched_new {
        let partner = member_name(&b[new_index]).and_then(|name| {
            unmatched_old
                .iter()
                .copied()
                .find(|i| !paired_old.contains(i) && member_name(&a[*i]) == Some(name))
        });
        match partner {
            Some(old_index) => {
                paired_old.insert(old_index);
                path.push(PathSegment::Index(new_index));
                diff_node(&a[old_index], &b[new_index], path, delta);
                path.pop();
            }
            None => still_new.push(new_index),
        }
    }

    for old_index in unmatched_old.into_iter().filter(|i| !paired_old.contains(i)) {
        path.push(PathSegment::Index(old_index));
        delta.item_removed.insert(render_path(path), a[old_index].clone());
        path.pop();
    }
    for new_index in still_new {
        path.push(PathSegment::Index(new_index));
        delta.item_added.insert(render_path(path), b[new_index].clone());
        path.pop();
    }
}

/// The `name` of a list-map member (containers, env vars, ports, volumes).
fn member_name(value: &Value) -> Option<&str> {
    value.as_object()?.get("name")?.as_str()
}
