pub mod diff;
pub mod fingerprint;
pub mod watch;

use driftlog_core::errors::{AuditError, AuditErrorKind, Result};
use serde_json::Value;
use std::path::Path;

/// Read a JSON snapshot from disk.
pub(crate) fn read_snapshot(path: &Path) -> Result<Value> {
    let bytes = std::fs::read(path).map_err(|e| {
        AuditError::new(AuditErrorKind::Io)
            .with_op("read_snapshot")
            .with_message(format!("{}: {}", path.display(), e))
    })?;
    serde_json::from_slice(&bytes).map_err(|e| {
        AuditError::new(AuditErrorKind::Serialization)
            .with_op("read_snapshot")
            .with_message(format!("{}: {}", path.display(), e))
    })
}
