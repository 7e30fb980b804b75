//! Ledger document shapes.
//!
//! A State Revision is the canonical snapshot with two reserved top-level keys
//! injected (`itemtype`, `identity`). A Change Revision wraps a serialized
//! [`StructuralDelta`].

use crate::canonical::CanonicalForm;
use crate::diff::StructuralDelta;
use crate::errors::CanonicalError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Reserved key carrying the revision kind.
pub const ITEMTYPE_FIELD: &str = "itemtype";
/// Reserved key carrying the tracked object's identity.
pub const IDENTITY_FIELD: &str = "identity";

/// Kind tag of a ledger revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemType {
    #[serde(rename = "config")]
    Config,
    #[serde(rename = "config-change")]
    ConfigChange,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Config => "config",
            ItemType::ConfigChange => "config-change",
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the State Revision document for `identity`.
///
/// Reserved keys already present in the snapshot are overwritten.
///
/// # Errors
///
/// Returns `CanonicalError::NonMappingRoot` when the snapshot is not a
/// mapping, since the reserved keys cannot be injected.
pub fn state_document(identity: &str, canonical: &CanonicalForm) -> Result<Value, CanonicalError> {
    let Value::Object(map) = canonical.value() else {
        return Err(CanonicalError::NonMappingRoot {
            found: kind_name(canonical.value()),
        });
    };
    let mut document = map.clone();
    document.insert(
        ITEMTYPE_FIELD.to_string(),
        Value::String(ItemType::Config.as_str().to_string()),
    );
    document.insert(IDENTITY_FIELD.to_string(), Value::String(identity.to_string()));
    Ok(Value::Object(document))
}

/// Change Revision payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeDocument {
    pub itemtype: ItemType,
    pub identity: String,
    pub delta: StructuralDelta,
}

impl ChangeDocument {
    pub fn new(identity: impl Into<String>, delta: StructuralDelta) -> Self {
        Self {
            itemtype: ItemType::ConfigChange,
            identity: identity.into(),
            delta,
        }
    }

    /// # Errors
    ///
    /// Returns `CanonicalError::Serialization` if the delta cannot be encoded.
    pub fn to_value(&self) -> Result<Value, CanonicalError> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Strip the reserved keys from a fetched State Revision, leaving the
/// snapshot as observed (plus any ledger bookkeeping).
pub fn strip_reserved(document: &mut Value) {
    if let Value::Object(map) = document {
        map.remove(ITEMTYPE_FIELD);
        map.remove(IDENTITY_FIELD);
    }
}

/// Read the `itemtype` tag of a fetched document, if it carries a known one.
pub fn itemtype_of(document: &Value) -> Option<ItemType> {
    match document.get(ITEMTYPE_FIELD)?.as_str()? {
        "config" => Some(ItemType::Config),
        "config-change" => Some(ItemType::ConfigChange),
        _ => None,
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}
