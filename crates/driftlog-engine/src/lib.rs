//! driftlog engine - the audit pipeline wired together
//!
//! - `committer`: per-identity state machine writing State and Change Revisions
//! - `driver`: poll cycles, concurrency, cancellation
//! - `source`: snapshot sources (`kubectl`)
//! - `export`: optional on-disk copies of old/new configurations

pub mod committer;
pub mod driver;
pub mod export;
pub mod source;

pub use committer::{
    AuditCommitter, CommitReceipt, CommitterConfig, History, PipelineOutcome, Stage,
};
pub use driver::{CycleReport, DriverConfig, IdentityFailure, PollDriver};
pub use export::{ConfigExporter, ExportedPair};
pub use source::{KubectlConfig, KubectlSource, ObservedObject, SnapshotSource};
