//! Audit Committer: per-identity commit state machine.
//!
//! ## Pipeline (by classification):
//! - New: COMMIT_STATE
//! - Changed: COMMIT_STATE -> FETCH_HISTORY -> COMPUTE_DIFF -> COMMIT_CHANGE
//! - Unchanged: nothing (no ledger call)
//!
//! A Change Revision is only attempted after the State Revision commit for the
//! same identity returned success. Writes are at-least-once: a write that
//! succeeds after a failed attempt may have landed twice, which is flagged on
//! the receipt and logged, never treated as an error.

use crate::export::ConfigExporter;
use driftlog_core::canonical::{CanonicalForm, PathPattern};
use driftlog_core::diff::{compute_delta, render_summary, StructuralDelta};
use driftlog_core::errors::{AuditError, Result};
use driftlog_core::revision::{state_document, ChangeDocument, ItemType, IDENTITY_FIELD, ITEMTYPE_FIELD};
use driftlog_core::{log_op_end, log_op_error, log_op_start, Detection};
use driftlog_ledger::{Ledger, RetryPolicy, SearchQuery};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

/// Ledger bookkeeping fields excluded from every diff by default.
pub const DEFAULT_DIFF_EXCLUDE: [&str; 2] = ["_id", "_vault_md"];

/// Pipeline stage; used as the `op` of errors and log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Classify,
    CommitState,
    FetchHistory,
    ComputeDiff,
    CommitChange,
    Export,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Classify => "classify",
            Stage::CommitState => "commit_state",
            Stage::FetchHistory => "fetch_history",
            Stage::ComputeDiff => "compute_diff",
            Stage::CommitChange => "commit_change",
            Stage::Export => "export",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one successful ledger write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReceipt {
    pub document_id: Option<String>,
    pub attempts: u32,
    /// An earlier attempt failed after the request may have been sent.
    pub possible_duplicate: bool,
}

/// The last two State Revisions of an identity, as fetched back.
#[derive(Debug, Clone, PartialEq)]
pub enum History {
    Pair { previous: Value, latest: Value },
    NotEnoughHistory { found: usize },
}

/// How one identity's pipeline ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// New identity; State Revision committed
    Recorded { state: CommitReceipt },
    /// Fingerprint matched; nothing written
    Unchanged,
    /// State and Change Revisions committed
    ChangeRecorded {
        state: CommitReceipt,
        change: CommitReceipt,
        delta: StructuralDelta,
    },
    /// State committed, but the ledger holds fewer than two states
    ChangeWithoutHistory { state: CommitReceipt, found: usize },
    /// State committed; the last two states are equal after exclusion
    ChangeEmptyDelta { state: CommitReceipt },
}

impl PipelineOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            PipelineOutcome::Recorded { .. } => "recorded",
            PipelineOutcome::Unchanged => "unchanged",
            PipelineOutcome::ChangeRecorded { .. } => "change_recorded",
            PipelineOutcome::ChangeWithoutHistory { .. } => "change_without_history",
            PipelineOutcome::ChangeEmptyDelta { .. } => "change_empty_delta",
        }
    }

    /// Receipts of every write this pipeline made.
    pub fn receipts(&self) -> Vec<&CommitReceipt> {
        match self {
            PipelineOutcome::Unchanged => Vec::new(),
            PipelineOutcome::Recorded { state }
            | PipelineOutcome::ChangeWithoutHistory { state, .. }
            | PipelineOutcome::ChangeEmptyDelta { state } => vec![state],
            PipelineOutcome::ChangeRecorded { state, change, .. } => vec![state, change],
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommitterConfig {
    pub retry: RetryPolicy,
    pub diff_exclude: Vec<PathPattern>,
}

impl Default for CommitterConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            diff_exclude: default_diff_exclude(),
        }
    }
}

pub fn default_diff_exclude() -> Vec<PathPattern> {
    DEFAULT_DIFF_EXCLUDE
        .iter()
        .filter_map(|raw| PathPattern::parse(raw).ok())
        .collect()
}

pub struct AuditCommitter {
    ledger: Arc<dyn Ledger>,
    config: CommitterConfig,
    exporter: Option<ConfigExporter>,
}

impl AuditCommitter {
    pub fn new(ledger: Arc<dyn Ledger>, config: CommitterConfig) -> Self {
        Self {
            ledger,
            config,
            exporter: None,
        }
    }

    /// Also write old/new configurations to disk for every Changed identity.
    pub fn with_exporter(mut self, exporter: ConfigExporter) -> Self {
        self.exporter = Some(exporter);
        self
    }

    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    /// Commit the State Revision for `identity`.
    ///
    /// # Errors
    ///
    /// - `Encoding` if the snapshot is not a mapping
    /// - `CommitFailure` once retries are exhausted or the ledger rejects the write
    pub async fn commit_state(&self, identity: &str, canonical: &CanonicalForm) -> Result<CommitReceipt> {
        let document = state_document(identity, canonical).map_err(|e| {
            AuditError::from(e)
                .with_op(Stage::CommitState.as_str())
                .with_identity(identity)
                .with_itemtype(ItemType::Config.as_str())
        })?;
        self.put(Stage::CommitState, identity, ItemType::Config, &document)
            .await
    }

    /// Commit the Change Revision carrying `delta`.
    ///
    /// # Errors
    ///
    /// - `Serialization` if the delta cannot be encoded
    /// - `CommitFailure` once retries are exhausted or the ledger rejects the write
    pub async fn commit_change(&self, identity: &str, delta: &StructuralDelta) -> Result<CommitReceipt> {
        let document = ChangeDocument::new(identity, delta.clone())
            .to_value()
            .map_err(|e| {
                AuditError::from(e)
                    .with_op(Stage::CommitChange.as_str())
                    .with_identity(identity)
            })?;
        self.put(Stage::CommitChange, identity, ItemType::ConfigChange, &document)
            .await
    }

    async fn put(
        &self,
        stage: Stage,
        identity: &str,
        itemtype: ItemType,
        document: &Value,
    ) -> Result<CommitReceipt> {
        let start = Instant::now();
        log_op_start!(stage.as_str(), identity, itemtype = itemtype.as_str());

        let result = self
            .config
            .retry
            .execute(stage.as_str(), |_| self.ledger.put_document(document))
            .await;

        match result {
            Ok(attempted) => {
                let receipt = CommitReceipt {
                    document_id: attempted.value.document_id,
                    attempts: attempted.attempts,
                    possible_duplicate: attempted.transient_failures > 0,
                };
                if receipt.possible_duplicate {
                    tracing::warn!(
                        identity,
                        itemtype = itemtype.as_str(),
                        attempts = receipt.attempts,
                        "write succeeded after a failed attempt; the ledger may hold a duplicate revision"
                    );
                }
                log_op_end!(
                    stage.as_str(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    identity,
                    attempts = receipt.attempts
                );
                Ok(receipt)
            }
            Err(exhausted) => {
                let err = AuditError::from(exhausted)
                    .with_op(stage.as_str())
                    .with_identity(identity)
                    .with_itemtype(itemtype.as_str());
                log_op_error!(
                    stage.as_str(),
                    err.clone(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    identity
                );
                Err(err)
            }
        }
    }

    /// Fetch the two most recent State Revisions of `identity`.
    ///
    /// # Errors
    ///
    /// Returns `CommitFailure` once retries are exhausted or the ledger
    /// answers with an unexpected response.
    pub async fn fetch_last_two_states(&self, identity: &str) -> Result<History> {
        let start = Instant::now();
        let stage = Stage::FetchHistory;
        log_op_start!(stage.as_str(), identity);

        let query = SearchQuery::new(2)
            .field_eq(ITEMTYPE_FIELD, ItemType::Config.as_str())
            .field_eq(IDENTITY_FIELD, identity);
        let result = self
            .config
            .retry
            .execute(stage.as_str(), |_| self.ledger.search_latest(&query))
            .await;

        let mut documents = match result {
            Ok(attempted) => attempted.value,
            Err(exhausted) => {
                let err = AuditError::from(exhausted)
                    .with_op(stage.as_str())
                    .with_identity(identity)
                    .with_itemtype(ItemType::Config.as_str());
                log_op_error!(
                    stage.as_str(),
                    err.clone(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    identity
                );
                return Err(err);
            }
        };

        log_op_end!(
            stage.as_str(),
            duration_ms = start.elapsed().as_millis() as u64,
            identity,
            found = documents.len()
        );

        // Newest first.
        if documents.len() < 2 {
            return Ok(History::NotEnoughHistory {
                found: documents.len(),
            });
        }
        documents.truncate(2);
        let previous = documents.pop().unwrap_or_default();
        let latest = documents.pop().unwrap_or_default();
        Ok(History::Pair { previous, latest })
    }

    /// Run the commit pipeline for one classified snapshot.
    ///
    /// # Errors
    ///
    /// Returns the first failing stage's error; earlier successful writes
    /// stay in the ledger.
    pub async fn process(&self, identity: &str, detection: &Detection) -> Result<PipelineOutcome> {
        match detection {
            Detection::Unchanged { .. } => Ok(PipelineOutcome::Unchanged),
            Detection::New { record } => {
                let state = self.commit_state(identity, &record.canonical).await?;
                Ok(PipelineOutcome::Recorded { state })
            }
            Detection::Changed { record, previous } => {
                let state = self.commit_state(identity, &record.canonical).await?;

                if let Some(exporter) = &self.exporter {
                    match exporter.export(identity, &previous.canonical, &record.canonical) {
                        Ok(paths) => tracing::info!(
                            identity,
                            old = %paths.old_path.display(),
                            new = %paths.new_path.display(),
                            "configurations exported"
                        ),
                        Err(err) => tracing::warn!(
                            identity,
                            op = Stage::Export.as_str(),
                            error = %err,
                            "export failed"
                        ),
                    }
                }

                let (previous_doc, latest_doc) = match self.fetch_last_two_states(identity).await? {
                    History::Pair { previous, latest } => (previous, latest),
                    History::NotEnoughHistory { found } => {
                        tracing::info!(identity, found, "not enough history to diff");
                        return Ok(PipelineOutcome::ChangeWithoutHistory { state, found });
                    }
                };

                self.check_read_your_write(identity, &record.canonical, &latest_doc);

                let start = Instant::now();
                let delta = compute_delta(&previous_doc, &latest_doc, &self.config.diff_exclude);
                tracing::debug!(
                    identity,
                    op = Stage::ComputeDiff.as_str(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    changes = delta.len(),
                    "delta computed"
                );
                if delta.is_empty() {
                    tracing::info!(identity, "states equal after exclusion; no change revision");
                    return Ok(PipelineOutcome::ChangeEmptyDelta { state });
                }
                tracing::info!(identity, "drift detected:\n{}", render_summary(&delta));

                let change = self.commit_change(identity, &delta).await?;
                Ok(PipelineOutcome::ChangeRecorded {
                    state,
                    change,
                    delta,
                })
            }
        }
    }

    /// Warn when the newest fetched state is not the one just committed.
    fn check_read_your_write(&self, identity: &str, committed: &CanonicalForm, latest: &Value) {
        let Ok(expected) = state_document(identity, committed) else {
            return;
        };
        if !compute_delta(&expected, latest, &self.config.diff_exclude).is_empty() {
            tracing::warn!(
                identity,
                "newest fetched state differs from the state just committed; diffing fetched pair"
            );
        }
    }
}

impl std::fmt::Debug for AuditCommitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditCommitter")
            .field("ledger", &self.ledger.describe())
            .field("retry", &self.config.retry)
            .field(
                "diff_exclude",
                &self
                    .config
                    .diff_exclude
                    .iter()
                    .map(PathPattern::as_str)
                    .collect::<Vec<_>>(),
            )
            .field("exporter", &self.exporter)
            .finish()
    }
}
