//! Runtime settings.
//!
//! Layered lowest to highest: built-in defaults, optional TOML file, `.env`,
//! `DRIFTLOG_<KEY>` environment variables (lists comma separated), then CLI
//! flags applied by the command. A bare `NAMESPACE` variable is honoured
//! when no namespace was configured otherwise.

use config::{Config, Environment, File, FileFormat};
use driftlog_core::canonical::{parse_patterns, PathPattern, DEFAULT_MAX_DEPTH};
use driftlog_core::errors::{AuditError, AuditErrorKind, Result};
use driftlog_core::logging_facility::Profile;
use driftlog_core::Fingerprinter;
use driftlog_core_types::Sensitive;
use driftlog_engine::committer::default_diff_exclude;
use driftlog_engine::{CommitterConfig, DriverConfig, KubectlConfig};
use driftlog_ledger::{HttpLedgerConfig, RetryPolicy};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PREFIX: &str = "DRIFTLOG";
const NAMESPACE_FALLBACK_VAR: &str = "NAMESPACE";
const LIST_KEYS: [&str; 2] = ["diff_exclude_paths", "ignore_paths"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LedgerKind {
    /// immudb Vault REST API
    Http,
    /// In-process ledger, lost on exit
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub kubeconfig: Option<PathBuf>,
    pub namespace: Option<String>,
    pub resource: String,
    pub kubectl_bin: String,
    pub poll_interval_secs: u64,
    pub ledger: LedgerKind,
    pub ledger_url: String,
    pub ledger_name: String,
    pub collection: String,
    pub api_key: Option<Sensitive<String>>,
    pub request_timeout_secs: u64,
    pub retry_max_attempts: u32,
    pub retry_initial_backoff_ms: u64,
    pub retry_max_backoff_ms: u64,
    pub max_concurrency: usize,
    pub shutdown_grace_secs: u64,
    pub diff_exclude_paths: Vec<String>,
    pub ignore_paths: Vec<String>,
    pub max_depth: usize,
    pub export_dir: Option<PathBuf>,
    pub log_format: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            kubeconfig: None,
            namespace: None,
            resource: "pods".to_string(),
            kubectl_bin: "kubectl".to_string(),
            poll_interval_secs: 10,
            ledger: LedgerKind::Http,
            ledger_url: "https://vault.immudb.io/ics/api/v1".to_string(),
            ledger_name: "default".to_string(),
            collection: "default".to_string(),
            api_key: None,
            request_timeout_secs: 10,
            retry_max_attempts: 3,
            retry_initial_backoff_ms: 200,
            retry_max_backoff_ms: 5000,
            max_concurrency: 8,
            shutdown_grace_secs: 15,
            diff_exclude_paths: vec!["_id".to_string(), "_vault_md".to_string()],
            ignore_paths: Vec::new(),
            max_depth: DEFAULT_MAX_DEPTH,
            export_dir: None,
            log_format: "pretty".to_string(),
        }
    }
}

fn config_error(message: impl Into<String>) -> AuditError {
    AuditError::new(AuditErrorKind::Config)
        .with_op("load_settings")
        .with_message(message)
}

impl Settings {
    /// Load settings from `file` (if given), `.env` and the process environment.
    ///
    /// # Errors
    ///
    /// Returns `AuditErrorKind::Config` if the file is missing or malformed,
    /// or a value has the wrong type.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::load_from(file, None)
    }

    /// Like [`Settings::load`], reading variables from `env` instead of the
    /// process environment when given.
    ///
    /// # Errors
    ///
    /// Returns `AuditErrorKind::Config` on any source or type error.
    pub fn load_from(file: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        let mut environment = Environment::with_prefix(ENV_PREFIX)
            .try_parsing(true)
            .list_separator(",")
            .source(env.clone());
        for key in LIST_KEYS {
            environment = environment.with_list_parse_key(key);
        }

        let mut settings = builder
            .add_source(environment)
            .build()
            .and_then(|config| config.try_deserialize::<Settings>())
            .map_err(|e| config_error(e.to_string()))?;

        if settings.namespace.is_none() {
            let fallback = match &env {
                Some(vars) => vars.get(NAMESPACE_FALLBACK_VAR).cloned(),
                None => std::env::var(NAMESPACE_FALLBACK_VAR).ok(),
            };
            settings.namespace = fallback.filter(|ns| !ns.trim().is_empty());
        }
        Ok(settings)
    }

    /// Check cross-field constraints that deserialization cannot express.
    ///
    /// # Errors
    ///
    /// Returns `AuditErrorKind::Config` naming the first offending setting.
    pub fn validate(&self) -> Result<()> {
        if self.ledger == LedgerKind::Http && self.api_key.as_ref().map_or(true, Sensitive::is_blank) {
            return Err(config_error(
                "api_key is required for the http ledger (set DRIFTLOG_API_KEY)",
            ));
        }
        if self.poll_interval_secs == 0 {
            return Err(config_error("poll_interval_secs must be greater than zero"));
        }
        if self.max_concurrency == 0 {
            return Err(config_error("max_concurrency must be at least 1"));
        }
        if self.retry_max_attempts == 0 {
            return Err(config_error("retry_max_attempts must be at least 1"));
        }
        if self.request_timeout_secs == 0 {
            return Err(config_error("request_timeout_secs must be greater than zero"));
        }
        self.log_profile()?;
        self.diff_exclude()?;
        self.fingerprinter()?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `AuditErrorKind::Config` for anything but `pretty` or `json`.
    pub fn log_profile(&self) -> Result<Profile> {
        Profile::from_log_format(&self.log_format).ok_or_else(|| {
            config_error(format!(
                "log_format must be 'pretty' or 'json', got '{}'",
                self.log_format
            ))
        })
    }

    /// Ledger bookkeeping exclusions plus the configured paths.
    ///
    /// `_id` and `_vault_md` are always present; configuring
    /// `diff_exclude_paths` adds to them.
    ///
    /// # Errors
    ///
    /// Returns `AuditErrorKind::Config` for an unparseable pattern.
    pub fn diff_exclude(&self) -> Result<Vec<PathPattern>> {
        let mut patterns = default_diff_exclude();
        for pattern in parse_patterns(&self.diff_exclude_paths)? {
            if !patterns.iter().any(|p| p.as_str() == pattern.as_str()) {
                patterns.push(pattern);
            }
        }
        Ok(patterns)
    }

    /// # Errors
    ///
    /// Returns `AuditErrorKind::Config` for an unparseable ignore pattern or
    /// one that names a concrete sequence index.
    pub fn fingerprinter(&self) -> Result<Fingerprinter> {
        Ok(Fingerprinter::new()
            .with_ignored_paths(parse_patterns(&self.ignore_paths)?)?
            .with_max_depth(self.max_depth))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_max_attempts,
            initial_backoff: Duration::from_millis(self.retry_initial_backoff_ms),
            max_backoff: Duration::from_millis(self.retry_max_backoff_ms),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            ..RetryPolicy::default()
        }
    }

    /// # Errors
    ///
    /// Returns `AuditErrorKind::Config` for an unparseable exclusion pattern.
    pub fn committer_config(&self) -> Result<CommitterConfig> {
        Ok(CommitterConfig {
            retry: self.retry_policy(),
            diff_exclude: self.diff_exclude()?,
        })
    }

    pub fn driver_config(&self, max_cycles: Option<u64>) -> DriverConfig {
        DriverConfig {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            max_concurrency: self.max_concurrency,
            shutdown_grace: Duration::from_secs(self.shutdown_grace_secs),
            max_cycles,
        }
    }

    pub fn kubectl_config(&self) -> KubectlConfig {
        KubectlConfig {
            kubectl_bin: self.kubectl_bin.clone(),
            kubeconfig: self.kubeconfig.clone(),
            namespace: self.namespace.clone(),
            resource: self.resource.clone(),
        }
    }

    pub fn http_ledger_config(&self) -> HttpLedgerConfig {
        HttpLedgerConfig {
            base_url: self.ledger_url.clone(),
            ledger: self.ledger_name.clone(),
            collection: self.collection.clone(),
            api_key: self
                .api_key
                .clone()
                .unwrap_or_else(|| Sensitive::new(String::new())),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }
}
