//! Structural diff engine.
//!
//! Compares two canonical documents (typically the last two state revisions
//! of one identity fetched back from the ledger) and produces a structured,
//! deterministic delta.
//!
//! ## Entry point
//!
//! ```ignore
//! use driftlog_core::diff::{compute_delta, render_summary};
//!
//! let delta = compute_delta(&previous, &latest, &exclude);
//! println!("{}", render_summary(&delta));
//! ```
//!
//! ## Guarantees
//!
//! - **Determinism**: identical inputs produce byte-identical serialized deltas.
//! - **Order-insensitivity**: reordering a sequence is never reported.
//! - **Exclusion**: excluded paths are removed from both sides before comparison,
//!   so ledger-assigned bookkeeping never shows up as drift.
//! - **Empty means no-op**: equal documents give `StructuralDelta::is_empty()`.

pub mod engine;
pub mod human_summary;
pub mod model;

pub use engine::compute_delta;
pub use human_summary::render_summary;
pub use model::{JsonType, StructuralDelta, TypeChange, ValueChange};
