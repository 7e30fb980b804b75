//! Poll Cycle Driver.
//!
//! One cycle: poll the source, deduplicate identities, classify and commit
//! every identity concurrently (bounded), and report. Failures are isolated
//! per identity; a source failure skips only that cycle.
//!
//! `run` repeats cycles on a fixed cadence until cancelled. A cycle in flight
//! when cancellation arrives gets `shutdown_grace` to drain.

use crate::committer::{AuditCommitter, PipelineOutcome, Stage};
use crate::source::{ObservedObject, SnapshotSource};
use driftlog_core::errors::{AuditError, AuditErrorKind, Result};
use driftlog_core::{log_op_end, log_op_error, log_op_start, ChangeDetector, Classification};
use driftlog_core_types::CycleId;
use futures::stream::{self, StreamExt};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    pub poll_interval: Duration,
    /// Identity pipelines in flight at once
    pub max_concurrency: usize,
    pub shutdown_grace: Duration,
    /// Stop after this many cycles (`--once` is `Some(1)`)
    pub max_cycles: Option<u64>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(10),
            max_concurrency: 8,
            shutdown_grace: Duration::from_secs(15),
            max_cycles: None,
        }
    }
}

/// An identity whose pipeline failed this cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityFailure {
    pub identity: String,
    pub kind: AuditErrorKind,
    pub op: Option<String>,
    pub attempts: Option<u32>,
    pub message: String,
}

impl IdentityFailure {
    fn from_error(identity: &str, err: &AuditError) -> Self {
        Self {
            identity: identity.to_string(),
            kind: err.kind(),
            op: err.op().map(str::to_string),
            attempts: err.attempts(),
            message: err.to_string(),
        }
    }
}

/// What one cycle did.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub cycle_id: CycleId,
    /// Objects returned by the source, duplicates included
    pub observed: usize,
    /// Repeated identities dropped in favor of their last occurrence
    pub duplicates: usize,
    pub new: usize,
    pub unchanged: usize,
    pub changed: usize,
    pub states_committed: usize,
    pub changes_committed: usize,
    pub possible_duplicates: usize,
    /// Sorted by identity
    pub failures: Vec<IdentityFailure>,
    pub outcomes: BTreeMap<String, PipelineOutcome>,
    /// Set when the source poll failed and the cycle was skipped
    pub source_failed: Option<String>,
    pub duration_ms: u64,
}

impl CycleReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.source_failed.is_none()
    }
}

struct IdentityResult {
    identity: String,
    classification: Option<Classification>,
    outcome: Result<PipelineOutcome>,
}

pub struct PollDriver {
    source: Arc<dyn SnapshotSource>,
    detector: ChangeDetector,
    committer: Arc<AuditCommitter>,
    config: DriverConfig,
}

impl PollDriver {
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        detector: ChangeDetector,
        committer: Arc<AuditCommitter>,
        config: DriverConfig,
    ) -> Self {
        Self {
            source,
            detector,
            committer,
            config,
        }
    }

    pub fn detector(&self) -> &ChangeDetector {
        &self.detector
    }

    /// Run one poll cycle to completion.
    pub async fn run_cycle(&self) -> CycleReport {
        let cycle_id = CycleId::new();
        let span = tracing::info_span!("cycle", cycle_id = %cycle_id);
        self.cycle(cycle_id).instrument(span).await
    }

    async fn cycle(&self, cycle_id: CycleId) -> CycleReport {
        let start = Instant::now();
        let mut report = CycleReport {
            cycle_id,
            ..CycleReport::default()
        };
        log_op_start!("poll_cycle");

        let objects = match self.source.poll().await {
            Ok(objects) => objects,
            Err(err) => {
                report.source_failed = Some(err.to_string());
                report.duration_ms = start.elapsed().as_millis() as u64;
                log_op_error!("poll_cycle", err, duration_ms = report.duration_ms);
                return report;
            }
        };
        report.observed = objects.len();

        let (batch, duplicates) = dedup_last_wins(objects);
        report.duplicates = duplicates;

        let results: Vec<IdentityResult> = stream::iter(batch)
            .map(|object| self.process_object(object))
            .buffer_unordered(self.config.max_concurrency.max(1))
            .collect()
            .await;

        for result in results {
            match result.classification {
                Some(Classification::New) => report.new += 1,
                Some(Classification::Unchanged) => report.unchanged += 1,
                Some(Classification::Changed) => report.changed += 1,
                None => {}
            }
            match result.outcome {
                Ok(outcome) => {
                    report.possible_duplicates += outcome
                        .receipts()
                        .iter()
                        .filter(|r| r.possible_duplicate)
                        .count();
                    match &outcome {
                        PipelineOutcome::Unchanged => {}
                        PipelineOutcome::Recorded { .. }
                        | PipelineOutcome::ChangeWithoutHistory { .. }
                        | PipelineOutcome::ChangeEmptyDelta { .. } => report.states_committed += 1,
                        PipelineOutcome::ChangeRecorded { .. } => {
                            report.states_committed += 1;
                            report.changes_committed += 1;
                        }
                    }
                    report.outcomes.insert(result.identity, outcome);
                }
                Err(err) => report
                    .failures
                    .push(IdentityFailure::from_error(&result.identity, &err)),
            }
        }
        report
            .failures
            .sort_by(|a, b| a.identity.cmp(&b.identity));
        report.duration_ms = start.elapsed().as_millis() as u64;

        log_op_end!(
            "poll_cycle",
            duration_ms = report.duration_ms,
            observed = report.observed,
            new = report.new,
            unchanged = report.unchanged,
            changed = report.changed,
            states_committed = report.states_committed,
            changes_committed = report.changes_committed,
            failures = report.failures.len()
        );
        report
    }

    async fn process_object(&self, object: ObservedObject) -> IdentityResult {
        let ObservedObject { identity, payload } = object;
        let span = tracing::info_span!("identity", identity = %identity);

        async move {
            let detection = match self.detector.classify(&identity, &payload) {
                Ok(detection) => detection,
                Err(err) => {
                    log_op_error!(Stage::Classify.as_str(), err.clone(), duration_ms = 0u64);
                    return IdentityResult {
                        identity,
                        classification: None,
                        outcome: Err(err),
                    };
                }
            };
            let classification = detection.classification();
            tracing::debug!(
                classification = classification.as_str(),
                fingerprint = detection.fingerprint().short(),
                "classified"
            );

            let outcome = self.committer.process(&identity, &detection).await;

            IdentityResult {
                identity,
                classification: Some(classification),
                outcome,
            }
        }
        .instrument(span)
        .await
    }

    /// Repeat cycles until `cancel` fires or `max_cycles` is reached.
    ///
    /// # Errors
    ///
    /// Returns `AuditErrorKind::Config` for an unusable driver configuration.
    /// Cycle failures never end the loop.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        if self.config.max_concurrency == 0 {
            return Err(AuditError::new(AuditErrorKind::Config)
                .with_op("poll_loop")
                .with_message("max_concurrency must be at least 1"));
        }
        if self.config.poll_interval.is_zero() {
            return Err(AuditError::new(AuditErrorKind::Config)
                .with_op("poll_loop")
                .with_message("poll interval must be greater than zero"));
        }

        tracing::info!(
            source = %self.source.describe(),
            ledger = %self.committer.ledger().describe(),
            interval_secs = self.config.poll_interval.as_secs(),
            "poll loop started"
        );

        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cycles: u64 = 0;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            let cycle = self.run_cycle();
            tokio::pin!(cycle);
            tokio::select! {
                biased;
                _ = &mut cycle => {}
                _ = cancel.cancelled() => {
                    tracing::info!(
                        grace_secs = self.config.shutdown_grace.as_secs(),
                        "cancellation requested; draining cycle in flight"
                    );
                    if tokio::time::timeout(self.config.shutdown_grace, &mut cycle)
                        .await
                        .is_err()
                    {
                        tracing::warn!("grace period elapsed; abandoning cycle in flight");
                    }
                }
            }
            cycles += 1;

            if cancel.is_cancelled() {
                break;
            }
            if self.config.max_cycles.is_some_and(|max| cycles >= max) {
                break;
            }
        }

        tracing::info!(cycles, "poll loop stopped");
        Ok(())
    }
}

/// Keep one object per identity: the last occurrence, at the position of
/// the first.
fn dedup_last_wins(objects: Vec<ObservedObject>) -> (Vec<ObservedObject>, usize) {
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(objects.len());
    let mut batch: Vec<ObservedObject> = Vec::with_capacity(objects.len());
    let mut duplicates = 0;

    for object in objects {
        match positions.get(&object.identity) {
            Some(&index) => {
                duplicates += 1;
                tracing::warn!(
                    identity = %object.identity,
                    "identity observed more than once in one poll; keeping the last occurrence"
                );
                batch[index] = object;
            }
            None => {
                positions.insert(object.identity.clone(), batch.len());
                batch.push(object);
            }
        }
    }
    (batch, duplicates)
}
