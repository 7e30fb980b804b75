//! Correlation identifiers
//!
//! A poll cycle is the unit of work the driver schedules; every log line and
//! error emitted while processing a cycle carries its `CycleId`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of one poll cycle
///
/// UUIDv7 values sort by creation time, so cycle ids read in log order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CycleId(String);

impl CycleId {
    /// Generate a new time-ordered CycleId
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Create from an existing string (for deserialization)
    pub fn from_string(s: String) -> Self {
        Self(s)
    }
}

impl Default for CycleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CycleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
