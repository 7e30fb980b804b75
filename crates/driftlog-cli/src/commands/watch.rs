//! Watch command
//!
//! Builds the pipeline from settings and runs the poll loop until Ctrl-C,
//! `--max-cycles`, or a single `--once` cycle.

use crate::settings::{LedgerKind, Settings};
use clap::Args;
use driftlog_core::errors::{AuditError, AuditErrorKind, Result};
use driftlog_core::logging_facility;
use driftlog_core::{ChangeDetector, MemoryFingerprintStore};
use driftlog_engine::{AuditCommitter, ConfigExporter, CycleReport, KubectlSource, PollDriver};
use driftlog_ledger::{HttpLedger, Ledger, MemoryLedger};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// TOML settings file
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long)]
    pub kubeconfig: Option<PathBuf>,

    /// Observe one namespace instead of all of them
    #[arg(long)]
    pub namespace: Option<String>,

    /// Seconds between poll cycles
    #[arg(long)]
    pub interval: Option<u64>,

    #[arg(long, value_enum)]
    pub ledger: Option<LedgerKind>,

    /// Write old/new configurations of changed objects here
    #[arg(long)]
    pub export_dir: Option<PathBuf>,

    /// Run one cycle, print its report and exit
    #[arg(long, conflicts_with = "max_cycles")]
    pub once: bool,

    #[arg(long)]
    pub max_cycles: Option<u64>,
}

impl WatchArgs {
    fn apply(&self, settings: &mut Settings) {
        if let Some(kubeconfig) = &self.kubeconfig {
            settings.kubeconfig = Some(kubeconfig.clone());
        }
        if let Some(namespace) = &self.namespace {
            settings.namespace = Some(namespace.clone());
        }
        if let Some(interval) = self.interval {
            settings.poll_interval_secs = interval;
        }
        if let Some(ledger) = self.ledger {
            settings.ledger = ledger;
        }
        if let Some(dir) = &self.export_dir {
            settings.export_dir = Some(dir.clone());
        }
    }
}

fn build_driver(settings: &Settings, max_cycles: Option<u64>) -> Result<PollDriver> {
    let ledger: Arc<dyn Ledger> = match settings.ledger {
        LedgerKind::Http => Arc::new(HttpLedger::new(settings.http_ledger_config())?),
        LedgerKind::Memory => {
            tracing::warn!("using the in-memory ledger; revisions are lost on exit");
            Arc::new(MemoryLedger::new())
        }
    };

    let mut committer = AuditCommitter::new(ledger, settings.committer_config()?);
    if let Some(dir) = &settings.export_dir {
        committer = committer.with_exporter(ConfigExporter::new(dir));
    }

    let detector = ChangeDetector::new(
        settings.fingerprinter()?,
        Arc::new(MemoryFingerprintStore::new()),
    );
    let source = Arc::new(KubectlSource::new(settings.kubectl_config()));

    Ok(PollDriver::new(
        source,
        detector,
        Arc::new(committer),
        settings.driver_config(max_cycles),
    ))
}

fn print_report(report: &CycleReport) {
    println!(
        "cycle {}: observed={} new={} unchanged={} changed={} states_committed={} changes_committed={} failures={}",
        report.cycle_id,
        report.observed,
        report.new,
        report.unchanged,
        report.changed,
        report.states_committed,
        report.changes_committed,
        report.failures.len()
    );
    for failure in &report.failures {
        println!("  failed {}: {}", failure.identity, failure.message);
    }
}

/// An unclean single cycle becomes the process error.
fn report_error(report: &CycleReport) -> Option<AuditError> {
    if let Some(message) = &report.source_failed {
        return Some(
            AuditError::new(AuditErrorKind::Source)
                .with_op("poll_cycle")
                .with_message(message.clone()),
        );
    }
    let first = report.failures.first()?;
    Some(
        AuditError::new(first.kind)
            .with_op("poll_cycle")
            .with_message(format!(
                "{} of {} identities failed",
                report.failures.len(),
                report.observed - report.duplicates
            )),
    )
}

pub async fn execute(args: WatchArgs) -> Result<()> {
    let mut settings = Settings::load(args.config.as_deref())?;
    args.apply(&mut settings);
    settings.validate()?;
    logging_facility::init(settings.log_profile()?);

    let driver = build_driver(&settings, args.max_cycles)?;

    if args.once {
        let report = driver.run_cycle().await;
        print_report(&report);
        return match report_error(&report) {
            Some(err) => Err(err),
            None => Ok(()),
        };
    }

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received; shutting down");
            signal_cancel.cancel();
        }
    });

    driver.run(cancel).await
}
