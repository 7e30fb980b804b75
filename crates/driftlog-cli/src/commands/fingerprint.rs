//! Fingerprint command

use super::read_snapshot;
use clap::Args;
use driftlog_core::canonical::parse_patterns;
use driftlog_core::errors::Result;
use driftlog_core::Fingerprinter;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct FingerprintArgs {
    /// JSON snapshot of one object
    pub file: PathBuf,

    /// Path stripped before hashing, e.g. `status` or `metadata.managedFields`
    #[arg(long = "ignore")]
    pub ignore: Vec<String>,
}

pub fn execute(args: FingerprintArgs) -> Result<()> {
    let snapshot = read_snapshot(&args.file)?;
    let fingerprinter = Fingerprinter::new().with_ignored_paths(parse_patterns(&args.ignore)?)?;

    let canonical = fingerprinter.canonicalize(&snapshot)?;
    let fingerprint = fingerprinter.fingerprint(&canonical);

    println!("{}", canonical.to_pretty_json()?);
    println!("fingerprint: {}", fingerprint);
    Ok(())
}
