//! Fingerprinter: canonicalization and hashing of snapshots.
//!
//! ## Responsibilities
//!
//! - Normalize a snapshot (key order, timestamp spelling, ignored paths)
//! - Serialize it to deterministic bytes
//! - Hash those bytes into a [`Fingerprint`]
//!
//! ## Non-Responsibilities
//!
//! - Deciding whether a snapshot changed (see `detector`)
//! - Explaining how it changed (see `diff`)

pub mod canonicalizer;
pub mod digest;
pub mod path;

pub use canonicalizer::{normalize_timestamp, CanonicalForm, Fingerprinter, DEFAULT_MAX_DEPTH};
pub use digest::{fingerprint, Fingerprint};
pub use path::{parse_patterns, render_path, strip_all, PathPattern, PathSegment};
