//! Structural delta output types.
//!
//! All types implement `Debug, Clone, Serialize, Deserialize, PartialEq`.
//! Collections are `BTreeMap` keyed by rendered path so the serialized delta
//! is byte-stable for identical inputs.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Field-level differences between two canonical documents.
///
/// Every collection is present even when empty so downstream consumers can
/// process change revisions uniformly.
///
/// Sequence indices in keys refer to different documents depending on the
/// entry. Changes inside name-paired members (`containers[2].image`) and
/// `item_added` entries use the new document's index; `item_removed` entries
/// use the old document's index. One delta may therefore contain
/// `containers[0]` in both `item_added` and `item_removed` naming two
/// different members.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StructuralDelta {
    /// Same JSON type on both sides, different value
    pub values_changed: BTreeMap<String, ValueChange>,
    /// JSON type differs between the sides
    pub type_changed: BTreeMap<String, TypeChange>,
    /// Mapping keys or sequence members present only in the new document
    pub item_added: BTreeMap<String, Value>,
    /// Mapping keys or sequence members present only in the old document
    pub item_removed: BTreeMap<String, Value>,
}

impl StructuralDelta {
    /// True when the documents were equal after exclusion
    pub fn is_empty(&self) -> bool {
        self.values_changed.is_empty()
            && self.type_changed.is_empty()
            && self.item_added.is_empty()
            && self.item_removed.is_empty()
    }

    /// Total number of reported differences
    pub fn len(&self) -> usize {
        self.values_changed.len()
            + self.type_changed.len()
            + self.item_added.len()
            + self.item_removed.len()
    }

    /// Every path mentioned by the delta, sorted and deduplicated
    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<&str> = self
            .values_changed
            .keys()
            .chain(self.type_changed.keys())
            .chain(self.item_added.keys())
            .chain(self.item_removed.keys())
            .map(String::as_str)
            .collect();
        paths.sort_unstable();
        paths.dedup();
        paths
    }
}

/// Old/new values at a path whose type did not change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValueChange {
    pub old_value: Value,
    pub new_value: Value,
}

/// Old/new types (and values) at a path whose JSON type changed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TypeChange {
    pub old_type: JsonType,
    pub new_type: JsonType,
    pub old_value: Value,
    pub new_value: Value,
}

/// JSON value kinds as reported in `type_changed`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum JsonType {
    Null,
    Bool,
    Number,
    String,
    Sequence,
    Mapping,
}

impl JsonType {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => JsonType::Null,
            Value::Bool(_) => JsonType::Bool,
            Value::Number(_) => JsonType::Number,
            Value::String(_) => JsonType::String,
            Value::Array(_) => JsonType::Sequence,
            Value::Object(_) => JsonType::Mapping,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JsonType::Null => "null",
            JsonType::Bool => "bool",
            JsonType::Number => "number",
            JsonType::String => "string",
            JsonType::Sequence => "sequence",
            JsonType::Mapping => "mapping",
        }
    }
}
