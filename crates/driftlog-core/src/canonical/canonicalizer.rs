//! Snapshot canonicalization.
//!
//! Turns an observed snapshot into the byte stream that is fingerprinted and
//! committed. Two snapshots that differ only in key order, in how a timestamp
//! instant is spelled, or in configured volatile fields produce identical
//! bytes.

use crate::canonical::path::{render_path, strip_all, PathPattern, PathSegment};
use crate::canonical::digest::{fingerprint, Fingerprint};
use crate::errors::CanonicalError;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

/// Nesting limit applied when none is configured.
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// A snapshot in canonical form: the normalized tree and its exact bytes.
///
/// Equality is byte equality.
#[derive(Debug, Clone)]
pub struct CanonicalForm {
    value: Value,
    bytes: Vec<u8>,
}

impl CanonicalForm {
    /// The normalized document tree
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// The canonical byte serialization
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the form and return the normalized tree
    pub fn into_value(self) -> Value {
        self.value
    }

    /// Indented rendering for human consumption (exports, CLI output)
    ///
    /// # Errors
    ///
    /// Returns `CanonicalError::Serialization` if JSON serialization fails.
    pub fn to_pretty_json(&self) -> Result<String, CanonicalError> {
        Ok(serde_json::to_string_pretty(&self.value)?)
    }
}

impl PartialEq for CanonicalForm {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for CanonicalForm {}

/// Canonicalizes and fingerprints snapshots.
///
/// ```
/// use driftlog_core::Fingerprinter;
/// use serde_json::json;
///
/// let fp = Fingerprinter::new();
/// let a = fp.canonicalize(&json!({"b": 1, "a": "2024-01-01T02:00:00+02:00"})).unwrap();
/// let b = fp.canonicalize(&json!({"a": "2024-01-01T00:00:00Z", "b": 1})).unwrap();
/// assert_eq!(a, b);
/// assert_eq!(a.as_bytes(), br#"{"a":"2024-01-01T00:00:00Z","b":1}"#);
/// ```
#[derive(Debug, Clone)]
pub struct Fingerprinter {
    ignored: Vec<PathPattern>,
    max_depth: usize,
}

impl Default for Fingerprinter {
    fn default() -> Self {
        Self::new()
    }
}

impl Fingerprinter {
    pub fn new() -> Self {
        Self {
            ignored: Vec::new(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Strip these paths before serialization (volatile metadata).
    ///
    /// # Errors
    ///
    /// Returns `CanonicalError::InvalidPathPattern` for a pattern with a
    /// concrete index such as `items[1]`. Removing one sequence member shifts
    /// its siblings, so a second pass would strip another member and the
    /// canonical form would no longer be stable. Use `items[]` instead.
    pub fn with_ignored_paths(mut self, patterns: Vec<PathPattern>) -> Result<Self, CanonicalError> {
        if let Some(pattern) = patterns.iter().find(|p| p.has_concrete_index()) {
            return Err(CanonicalError::InvalidPathPattern {
                pattern: pattern.as_str().to_string(),
                reason: "ignore patterns may only use [] for indices".to_string(),
            });
        }
        self.ignored = patterns;
        Ok(self)
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn ignored_paths(&self) -> &[PathPattern] {
        &self.ignored
    }

    /// Produce the canonical form of `snapshot`.
    ///
    /// Idempotent: canonicalizing `canonicalize(s).value()` yields the same
    /// bytes again.
    ///
    /// # Errors
    ///
    /// - `DepthExceeded` when nesting is deeper than the configured limit
    /// - `Serialization` if the normalized tree cannot be encoded
    pub fn canonicalize(&self, snapshot: &Value) -> Result<CanonicalForm, CanonicalError> {
        let mut value = normalize(snapshot, 0, self.max_depth).map_err(|overflow| {
            let mut path = overflow.reversed_path;
            path.reverse();
            CanonicalError::DepthExceeded {
                max_depth: self.max_depth,
                path: render_path(&path),
            }
        })?;
        strip_all(&mut value, &self.ignored);

        let mut bytes = Vec::with_capacity(256);
        write_canonical(&value, &mut bytes)?;
        Ok(CanonicalForm { value, bytes })
    }

    /// Fingerprint an already-canonical form.
    pub fn fingerprint(&self, canonical: &CanonicalForm) -> Fingerprint {
        fingerprint(canonical)
    }
}

/// Depth overflow, with the offending path collected while unwinding.
struct Overflow {
    reversed_path: Vec<PathSegment>,
}

fn normalize(value: &Value, depth: usize, max_depth: usize) -> Result<Value, Overflow> {
    match value {
        Value::Object(map) => {
            if depth >= max_depth {
                return Err(Overflow {
                    reversed_path: Vec::new(),
                });
            }
            let mut out = Map::new();
            for (key, child) in map {
                let normalized = normalize(child, depth + 1, max_depth).map_err(|mut o| {
                    o.reversed_path.push(PathSegment::Key(key.clone()));
                    o
                })?;
                out.insert(key.clone(), normalized);
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => {
            if depth >= max_depth {
                return Err(Overflow {
                    reversed_path: Vec::new(),
                });
            }
            items
                .iter()
                .enumerate()
                .map(|(index, child)| {
                    normalize(child, depth + 1, max_depth).map_err(|mut o| {
                        o.reversed_path.push(PathSegment::Index(index));
                        o
                    })
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        Value::String(s) => Ok(Value::String(
            normalize_timestamp(s).unwrap_or_else(|| s.clone()),
        )),
        scalar => Ok(scalar.clone()),
    }
}

/// Rewrite an RFC 3339 timestamp to UTC with a fixed layout.
///
/// Returns `None` for strings that are not timestamps.
pub fn normalize_timestamp(s: &str) -> Option<String> {
    // Cheap shape check before invoking the parser on every string.
    let bytes = s.as_bytes();
    if bytes.len() < 20 || bytes[4] != b'-' || !(bytes[10] == b'T' || bytes[10] == b't') {
        return None;
    }
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc).to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

/// Compact JSON with mapping keys in byte order, independent of the map
/// implementation serde_json was built with.
fn write_canonical(value: &Value, out: &mut Vec<u8>) -> Result<(), CanonicalError> {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push(b'{');
            for (i, (key, child)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                serde_json::to_writer(&mut *out, key)?;
                out.push(b':');
                write_canonical(child, out)?;
            }
            out.push(b'}');
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, child) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(child, out)?;
            }
            out.push(b']');
        }
        scalar => serde_json::to_writer(&mut *out, scalar)?,
    }
    Ok(())
}

/// Canonical bytes of an arbitrary value, without timestamp normalization.
///
/// Used by the diff engine to match sequence members as a multiset.
pub(crate) fn canonical_bytes(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    // Writing into a Vec cannot fail and every Value is serializable.
    if write_canonical(value, &mut out).is_err() {
        out.clear();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_keys_sorted_at_every_level() {
        let form = Fingerprinter::new()
            .canonicalize(&json!({"z": {"y": 1, "x": [{"b": 1, "a": 2}]}, "a": null}))
            .unwrap();
        assert_eq!(
            form.as_bytes(),
            br#"{"a":null,"z":{"x":[{"a":2,"b":1}],"y":1}}"#
        );
    }

    #[test]
    fn test_timestamp_offsets_normalize_to_utc() {
        assert_eq!(
            normalize_timestamp("2024-03-01T12:30:00+01:00").as_deref(),
            Some("2024-03-01T11:30:00Z")
        );
        assert_eq!(
            normalize_timestamp("2024-03-01T11:30:00.500Z").as_deref(),
            Some("2024-03-01T11:30:00.500Z")
        );
    }

    #[test]
    fn test_non_timestamps_untouched() {
        assert_eq!(normalize_timestamp("nginx:1.25"), None);
        assert_eq!(normalize_timestamp("2024-03-01"), None);
        assert_eq!(normalize_timestamp("not a timestamp at all, really"), None);
    }

    #[test]
    fn test_depth_limit_reports_path() {
        let fp = Fingerprinter::new().with_max_depth(2);
        let err = fp
            .canonicalize(&json!({"a": {"b": {"c": 1}}}))
            .unwrap_err();
        assert_eq!(
            err,
            CanonicalError::DepthExceeded {
                max_depth: 2,
                path: "a.b".to_string()
            }
        );
    }

    #[test]
    fn test_ignored_paths_do_not_affect_fingerprint() {
        let fp = Fingerprinter::new()
            .with_ignored_paths(vec![PathPattern::parse("metadata.resourceVersion").unwrap()])
            .unwrap();
        let a = fp
            .canonicalize(&json!({"metadata": {"name": "p", "resourceVersion": "1"}}))
            .unwrap();
        let b = fp
            .canonicalize(&json!({"metadata": {"name": "p", "resourceVersion": "2"}}))
            .unwrap();
        assert_eq!(fp.fingerprint(&a), fp.fingerprint(&b));
    }

    #[test]
    fn test_concrete_index_rejected_as_ignore_path() {
        let err = Fingerprinter::new()
            .with_ignored_paths(vec![PathPattern::parse("items[1]").unwrap()])
            .unwrap_err();
        assert!(matches!(
            err,
            CanonicalError::InvalidPathPattern { ref pattern, .. } if pattern == "items[1]"
        ));

        let fp = Fingerprinter::new()
            .with_ignored_paths(vec![PathPattern::parse("items[].status").unwrap()])
            .unwrap();
        let once = fp.canonicalize(&json!({"items": [{"a": 1, "status": "x"}, {"a": 2}]})).unwrap();
        let twice = fp.canonicalize(once.value()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_scalar_snapshot_is_legal() {
        let form = Fingerprinter::new().canonicalize(&json!("plain")).unwrap();
        assert_eq!(form.as_bytes(), br#""plain""#);
    }
}
