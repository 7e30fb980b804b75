//! On-disk export of changed configurations.
//!
//! For every Changed identity, `<stem>_old_config.json` and
//! `<stem>_new_config.json` are written to the export directory, where
//! `<stem>` is the identity with path-hostile characters replaced by `_`.

use driftlog_core::canonical::CanonicalForm;
use driftlog_core::errors::{AuditError, AuditErrorKind, Result};
use std::fs;
use std::path::{Path, PathBuf};

fn io_error(op: &str, path: &Path, err: std::io::Error) -> AuditError {
    AuditError::new(AuditErrorKind::Io)
        .with_op(op)
        .with_message(format!("{}: {}", path.display(), err))
}

/// Atomically write bytes to a file via temp file + rename.
///
/// # Errors
///
/// Returns `AuditErrorKind::Io` if the directory, temp file, or rename fails.
pub fn atomic_write(target_path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = target_path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_error("create_export_dir", parent, e))?;
    }

    let temp_path = target_path.with_extension("json.tmp");
    fs::write(&temp_path, content).map_err(|e| io_error("write_export_temp", &temp_path, e))?;
    fs::rename(&temp_path, target_path)
        .map_err(|e| io_error("rename_export_temp", target_path, e))?;

    Ok(())
}

/// Paths written by one export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedPair {
    pub old_path: PathBuf,
    pub new_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ConfigExporter {
    dir: PathBuf,
}

impl ConfigExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File stem for `identity`: `default/web-0` becomes `default_web-0`.
    pub fn file_stem(identity: &str) -> String {
        identity
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }

    /// Write the previous and current canonical forms, pretty-printed.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if rendering fails or `Io` if writing fails.
    pub fn export(
        &self,
        identity: &str,
        old: &CanonicalForm,
        new: &CanonicalForm,
    ) -> Result<ExportedPair> {
        let stem = Self::file_stem(identity);
        let old_path = self.dir.join(format!("{}_old_config.json", stem));
        let new_path = self.dir.join(format!("{}_new_config.json", stem));

        let old_json = old
            .to_pretty_json()
            .map_err(|e| AuditError::from(e).with_identity(identity))?;
        let new_json = new
            .to_pretty_json()
            .map_err(|e| AuditError::from(e).with_identity(identity))?;

        atomic_write(&old_path, old_json.as_bytes()).map_err(|e| e.with_identity(identity))?;
        atomic_write(&new_path, new_json.as_bytes()).map_err(|e| e.with_identity(identity))?;

        Ok(ExportedPair { old_path, new_path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use driftlog_core::Fingerprinter;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write_creates_parent() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("subdir").join("a.json");

        atomic_write(&target, b"{}").unwrap();

        assert_eq!(fs::read(&target).unwrap(), b"{}");
    }

    #[test]
    fn test_no_tmp_files_after_write() {
        let temp_dir = TempDir::new().unwrap();
        atomic_write(&temp_dir.path().join("a.json"), b"clean").unwrap();

        let tmp_count = fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.file_name()
                    .to_str()
                    .map(|s| s.ends_with(".tmp"))
                    .unwrap_or(false)
            })
            .count();
        assert_eq!(tmp_count, 0);
    }

    #[test]
    fn test_file_stem_replaces_separators() {
        assert_eq!(ConfigExporter::file_stem("default/web-0"), "default_web-0");
        assert_eq!(ConfigExporter::file_stem("node:a b"), "node_a_b");
    }

    #[test]
    fn test_export_writes_both_configs() {
        let temp_dir = TempDir::new().unwrap();
        let exporter = ConfigExporter::new(temp_dir.path());
        let fp = Fingerprinter::new();
        let old = fp.canonicalize(&json!({"spec": {"image": "a"}})).unwrap();
        let new = fp.canonicalize(&json!({"spec": {"image": "b"}})).unwrap();

        let paths = exporter.export("default/web", &old, &new).unwrap();

        assert_eq!(paths.old_path, temp_dir.path().join("default_web_old_config.json"));
        let written: serde_json::Value =
            serde_json::from_slice(&fs::read(&paths.new_path).unwrap()).unwrap();
        assert_eq!(written, json!({"spec": {"image": "b"}}));
    }
}
