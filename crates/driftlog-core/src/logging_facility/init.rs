//! Logging initialization.

use std::sync::Once;
use tracing_subscriber::{util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is not set, one directive per workspace crate.
const CRATE_TARGETS: [&str; 4] = [
    "driftlog_core",
    "driftlog_ledger",
    "driftlog_engine",
    "driftlog_cli",
];

/// Logging profile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Human-readable output at debug level
    Development,
    /// JSON structured output at info level
    Production,
    /// Bare registry; tests install the capture layer instead
    Test,
}

impl Profile {
    /// Map the `log_format` setting onto a profile.
    pub fn from_log_format(format: &str) -> Option<Self> {
        match format.trim().to_ascii_lowercase().as_str() {
            "pretty" => Some(Profile::Development),
            "json" => Some(Profile::Production),
            _ => None,
        }
    }
}

static INIT_ONCE: Once = Once::new();

fn default_filter(level: &str) -> EnvFilter {
    let directives = CRATE_TARGETS
        .iter()
        .map(|target| format!("{}={}", target, level))
        .collect::<Vec<_>>()
        .join(",");
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives))
}

/// Initialize the logging facility. Later calls are no-ops.
///
/// ```
/// use driftlog_core::logging_facility::{init, Profile};
///
/// init(Profile::Development);
/// ```
pub fn init(profile: Profile) {
    INIT_ONCE.call_once(|| match profile {
        Profile::Development => {
            tracing_subscriber::fmt()
                .with_env_filter(default_filter("debug"))
                .with_writer(std::io::stderr)
                .finish()
                .init();
        }
        Profile::Production => {
            tracing_subscriber::fmt()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_env_filter(default_filter("info"))
                .with_writer(std::io::stderr)
                .finish()
                .init();
        }
        Profile::Test => {
            tracing_subscriber::registry().init();
        }
    });
}
