//! driftlog core - change detection kernel
//!
//! This crate holds everything in the audit pipeline that does not touch the
//! network:
//! - Canonicalization and fingerprinting of workload snapshots
//! - The in-process fingerprint store and its concurrency contract
//! - New / Unchanged / Changed classification
//! - Order-insensitive structural diffing with path exclusion
//! - The document shapes written to the ledger
//! - The error and logging facilities shared by every other crate

pub mod canonical;
pub mod detector;
pub mod diff;
pub mod errors;
pub mod logging_facility;
pub mod revision;
pub mod store;

#[doc(hidden)]
pub use driftlog_core_types as core_types;

// Re-export commonly used types
pub use canonical::{CanonicalForm, Fingerprint, Fingerprinter, PathPattern};
pub use detector::{ChangeDetector, Classification, Detection};
pub use diff::{compute_delta, render_summary, StructuralDelta};
pub use errors::{AuditError, AuditErrorKind, CanonicalError, Result};
pub use revision::{ChangeDocument, ItemType};
pub use store::{FingerprintRecord, FingerprintStore, MemoryFingerprintStore};
