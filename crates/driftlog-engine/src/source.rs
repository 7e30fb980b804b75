//! Snapshot sources.
//!
//! A source returns one finite batch of observed objects per poll. The
//! shipped source shells out to `kubectl get <resource> -o json`, which keeps
//! credential handling (kubeconfig, exec plugins, contexts) with kubectl.

use async_trait::async_trait;
use driftlog_core::errors::{AuditError, AuditErrorKind, Result};
use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;

/// One tracked object as observed in a poll.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedObject {
    pub identity: String,
    pub payload: Value,
}

impl ObservedObject {
    pub fn new(identity: impl Into<String>, payload: Value) -> Self {
        Self {
            identity: identity.into(),
            payload,
        }
    }
}

#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Observe the monitored scope once.
    async fn poll(&self) -> Result<Vec<ObservedObject>>;

    fn describe(&self) -> String;
}

fn source_error(op: &str, message: impl Into<String>) -> AuditError {
    AuditError::new(AuditErrorKind::Source)
        .with_op(op)
        .with_message(message)
}

/// `<namespace>/<name>`, or `<name>` for cluster-scoped objects.
pub fn identity_of(item: &Value) -> Option<String> {
    let metadata = item.get("metadata")?;
    let name = metadata.get("name")?.as_str()?;
    match metadata.get("namespace").and_then(Value::as_str) {
        Some(namespace) if !namespace.is_empty() => Some(format!("{}/{}", namespace, name)),
        _ => Some(name.to_string()),
    }
}

/// Split a Kubernetes `List` document into observed objects.
///
/// Items without `metadata.name` are skipped with a warning.
///
/// # Errors
///
/// Returns `AuditErrorKind::Source` when the document has no `items` sequence.
pub fn objects_from_list(list: Value) -> Result<Vec<ObservedObject>> {
    let Value::Object(mut root) = list else {
        return Err(source_error("parse_list", "list document is not a mapping"));
    };
    let Some(Value::Array(items)) = root.remove("items") else {
        return Err(source_error("parse_list", "list document has no 'items' sequence"));
    };

    let mut objects = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match identity_of(&item) {
            Some(identity) => objects.push(ObservedObject::new(identity, item)),
            None => tracing::warn!(index, "skipping item without metadata.name"),
        }
    }
    Ok(objects)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KubectlConfig {
    pub kubectl_bin: String,
    pub kubeconfig: Option<PathBuf>,
    /// Scope filter; `None` observes all namespaces
    pub namespace: Option<String>,
    pub resource: String,
}

impl Default for KubectlConfig {
    fn default() -> Self {
        Self {
            kubectl_bin: "kubectl".to_string(),
            kubeconfig: None,
            namespace: None,
            resource: "pods".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct KubectlSource {
    config: KubectlConfig,
}

impl KubectlSource {
    pub fn new(config: KubectlConfig) -> Self {
        Self { config }
    }

    /// Arguments passed to kubectl (the binary excluded).
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "get".to_string(),
            self.config.resource.clone(),
            "-o".to_string(),
            "json".to_string(),
        ];
        match &self.config.namespace {
            Some(namespace) => {
                args.push("-n".to_string());
                args.push(namespace.clone());
            }
            None => args.push("--all-namespaces".to_string()),
        }
        if let Some(kubeconfig) = &self.config.kubeconfig {
            args.push("--kubeconfig".to_string());
            args.push(kubeconfig.display().to_string());
        }
        args
    }
}

#[async_trait]
impl SnapshotSource for KubectlSource {
    async fn poll(&self) -> Result<Vec<ObservedObject>> {
        let output = tokio::process::Command::new(&self.config.kubectl_bin)
            .args(self.args())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                source_error(
                    "kubectl_spawn",
                    format!("failed to run {}: {}", self.config.kubectl_bin, e),
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(source_error(
                "kubectl_get",
                format!("kubectl exited with {}: {}", output.status, stderr.trim()),
            ));
        }

        let list: Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| source_error("parse_list", format!("invalid kubectl output: {}", e)))?;
        objects_from_list(list)
    }

    fn describe(&self) -> String {
        format!("{} {}", self.config.kubectl_bin, self.args().join(" "))
    }
}
