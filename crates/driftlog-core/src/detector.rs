//! Change Detector: New / Unchanged / Changed classification.
//!
//! Classification compares fingerprints only. Field-level comparison is left
//! to the diff engine and runs only for `Changed`, so the common `Unchanged`
//! path costs one canonicalization and one hash.

use crate::canonical::{Fingerprint, Fingerprinter};
use crate::errors::{AuditError, Result};
use crate::store::{FingerprintRecord, FingerprintStore};
use serde_json::Value;
use std::sync::Arc;

/// Outcome discriminant, for logging and reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Classification {
    New,
    Unchanged,
    Changed,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::New => "new",
            Classification::Unchanged => "unchanged",
            Classification::Changed => "changed",
        }
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of classifying one snapshot.
#[derive(Debug, Clone)]
pub enum Detection {
    /// First sighting in this process; `record` has been stored.
    New { record: Arc<FingerprintRecord> },
    /// Same fingerprint as stored; the store was not touched.
    Unchanged { fingerprint: Fingerprint },
    /// Fingerprint differs; `record` replaced `previous` in the store.
    Changed {
        record: Arc<FingerprintRecord>,
        previous: Arc<FingerprintRecord>,
    },
}

impl Detection {
    pub fn classification(&self) -> Classification {
        match self {
            Detection::New { .. } => Classification::New,
            Detection::Unchanged { .. } => Classification::Unchanged,
            Detection::Changed { .. } => Classification::Changed,
        }
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        match self {
            Detection::New { record } | Detection::Changed { record, .. } => &record.fingerprint,
            Detection::Unchanged { fingerprint } => fingerprint,
        }
    }
}

/// Classifies snapshots against a [`FingerprintStore`].
#[derive(Clone)]
pub struct ChangeDetector {
    fingerprinter: Fingerprinter,
    store: Arc<dyn FingerprintStore>,
}

impl ChangeDetector {
    pub fn new(fingerprinter: Fingerprinter, store: Arc<dyn FingerprintStore>) -> Self {
        Self {
            fingerprinter,
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn FingerprintStore> {
        &self.store
    }

    pub fn fingerprinter(&self) -> &Fingerprinter {
        &self.fingerprinter
    }

    /// Classify `snapshot` for `identity`, updating the store for New/Changed.
    ///
    /// # Errors
    ///
    /// Returns `AuditErrorKind::Encoding` if the snapshot cannot be
    /// canonicalized; the store is left untouched in that case.
    pub fn classify(&self, identity: &str, snapshot: &Value) -> Result<Detection> {
        let canonical = self
            .fingerprinter
            .canonicalize(snapshot)
            .map_err(|e| AuditError::from(e).with_identity(identity))?;
        let fingerprint = self.fingerprinter.fingerprint(&canonical);

        match self.store.get(identity) {
            Some(previous) if previous.fingerprint == fingerprint => {
                Ok(Detection::Unchanged { fingerprint })
            }
            Some(previous) => {
                let record = Arc::new(FingerprintRecord {
                    identity: identity.to_string(),
                    fingerprint,
                    canonical,
                });
                self.store.put(Arc::clone(&record));
                Ok(Detection::Changed { record, previous })
            }
            None => {
                let record = Arc::new(FingerprintRecord {
                    identity: identity.to_string(),
                    fingerprint,
                    canonical,
                });
                self.store.put(Arc::clone(&record));
                Ok(Detection::New { record })
            }
        }
    }
}

impl std::fmt::Debug for ChangeDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeDetector")
            .field("fingerprinter", &self.fingerprinter)
            .field("tracked", &self.store.len())
            .finish()
    }
}
