//! Diff command
//!
//! Both files are canonicalized before diffing, so timestamp spellings and
//! key order never show up as changes.

use super::read_snapshot;
use clap::Args;
use driftlog_core::canonical::parse_patterns;
use driftlog_core::diff::{compute_delta, render_summary};
use driftlog_core::errors::Result;
use driftlog_core::Fingerprinter;
use driftlog_engine::committer::default_diff_exclude;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct DiffArgs {
    pub old: PathBuf,
    pub new: PathBuf,

    /// Path excluded from the comparison, in addition to `_id` and `_vault_md`
    #[arg(long = "exclude")]
    pub exclude: Vec<String>,

    /// Print one line per change instead of JSON
    #[arg(long)]
    pub summary: bool,
}

pub fn execute(args: DiffArgs) -> Result<()> {
    let mut exclude = default_diff_exclude();
    exclude.extend(parse_patterns(&args.exclude)?);

    let fingerprinter = Fingerprinter::new();
    let old = fingerprinter.canonicalize(&read_snapshot(&args.old)?)?;
    let new = fingerprinter.canonicalize(&read_snapshot(&args.new)?)?;

    let delta = compute_delta(old.value(), new.value(), &exclude);
    if args.summary {
        println!("{}", render_summary(&delta));
    } else {
        println!("{}", serde_json::to_string_pretty(&delta)?);
    }
    Ok(())
}
