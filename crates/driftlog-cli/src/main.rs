//! driftlog CLI
//!
//! Watches Kubernetes workload configurations and records drift in an
//! append-only ledger.

use clap::{Parser, Subcommand};

mod commands;
mod settings;

#[derive(Debug, Parser)]
#[command(name = "driftlog")]
#[command(about = "driftlog - configuration drift audit trail", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Poll the cluster and commit state and change revisions
    Watch(commands::watch::WatchArgs),
    /// Print the canonical form and fingerprint of a snapshot file
    Fingerprint(commands::fingerprint::FingerprintArgs),
    /// Print the structural delta between two snapshot files
    Diff(commands::diff::DiffArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Watch(args) => commands::watch::execute(args).await,
        Commands::Fingerprint(args) => commands::fingerprint::execute(args),
        Commands::Diff(args) => commands::diff::execute(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
