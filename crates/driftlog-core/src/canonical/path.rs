//! Structural paths inside snapshot documents.
//!
//! A concrete path such as `spec.containers[0].image` names one node of a
//! document. A [`PathPattern`] uses the same syntax plus `[]` for "any index"
//! and is how operators name volatile or ledger-assigned fields that must be
//! ignored (`metadata.managedFields`, `_vault_md`, `spec.containers[].env`).
//!
//! Keys that would be ambiguous in dotted form (annotation and label keys
//! such as `deployment.kubernetes.io/revision`) are written in bracketed,
//! quoted form: `metadata.annotations["deployment.kubernetes.io/revision"]`.
//! Inside the quotes `\"` and `\\` escape a quote and a backslash.

use crate::errors::CanonicalError;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// One step of a concrete path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Render a concrete path. The document root renders as `$`.
pub fn render_path(segments: &[PathSegment]) -> String {
    if segments.is_empty() {
        return "$".to_string();
    }
    let mut out = String::new();
    for segment in segments {
        match segment {
            PathSegment::Key(key) if needs_quoting(key) => push_quoted(&mut out, key),
            PathSegment::Key(key) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(key);
            }
            PathSegment::Index(index) => {
                out.push('[');
                out.push_str(&index.to_string());
                out.push(']');
            }
        }
    }
    out
}

fn needs_quoting(key: &str) -> bool {
    key.is_empty()
        || key.trim() != key
        || key.contains(|c: char| matches!(c, '.' | '[' | ']' | '"' | '\\'))
}

fn push_quoted(out: &mut String, key: &str) {
    out.push_str("[\"");
    for c in key.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push_str("\"]");
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum PatternSegment {
    Key(String),
    Index(usize),
    AnyIndex,
}

/// A parsed exclusion/ignore path.
///
/// ```
/// use driftlog_core::canonical::PathPattern;
/// use serde_json::json;
///
/// let pattern: PathPattern = "spec.containers[].imagePullPolicy".parse().unwrap();
/// let mut doc = json!({"spec": {"containers": [
///     {"name": "app", "imagePullPolicy": "Always"},
///     {"name": "sidecar", "imagePullPolicy": "IfNotPresent"}
/// ]}});
/// pattern.strip(&mut doc);
/// assert_eq!(doc, json!({"spec": {"containers": [{"name": "app"}, {"name": "sidecar"}]}}));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathPattern {
    raw: String,
    segments: Vec<PatternSegment>,
}

impl PathPattern {
    /// Parse a pattern such as `metadata.managedFields` or `items[].status`.
    ///
    /// # Errors
    ///
    /// Returns `CanonicalError::InvalidPathPattern` for empty patterns, empty
    /// keys, unterminated brackets or quotes, and non-numeric indices.
    pub fn parse(raw: &str) -> Result<Self, CanonicalError> {
        let invalid = |reason: &str| CanonicalError::InvalidPathPattern {
            pattern: raw.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(invalid("pattern is empty"));
        }

        let mut segments = Vec::new();
        let mut key = String::new();
        let mut chars = trimmed.chars().peekable();
        // True right after a closing bracket, where only '.', '[' or the end may follow.
        let mut after_bracket = false;

        while let Some(c) = chars.next() {
            match c {
                '.' => {
                    if key.is_empty() && !after_bracket {
                        return Err(invalid("empty key"));
                    }
                    if !key.is_empty() {
                        segments.push(PatternSegment::Key(std::mem::take(&mut key)));
                    }
                    after_bracket = false;
                    if chars.peek().is_none() {
                        return Err(invalid("trailing '.'"));
                    }
                }
                '[' => {
                    if !key.is_empty() {
                        segments.push(PatternSegment::Key(std::mem::take(&mut key)));
                    }
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        let quoted =
                            read_quoted(&mut chars).ok_or_else(|| invalid("unterminated '\"'"))?;
                        if chars.next() != Some(']') {
                            return Err(invalid("expected ']' after quoted key"));
                        }
                        segments.push(PatternSegment::Key(quoted));
                        after_bracket = true;
                        continue;
                    }
                    if segments.is_empty() {
                        return Err(invalid("pattern cannot start with an index"));
                    }
                    let mut index = String::new();
                    let mut closed = false;
                    for inner in chars.by_ref() {
                        if inner == ']' {
                            closed = true;
                            break;
                        }
                        index.push(inner);
                    }
                    if !closed {
                        return Err(invalid("unterminated '['"));
                    }
                    if index.is_empty() {
                        segments.push(PatternSegment::AnyIndex);
                    } else {
                        let parsed = index
                            .parse::<usize>()
                            .map_err(|_| invalid("index must be a non-negative integer"))?;
                        segments.push(PatternSegment::Index(parsed));
                    }
                    after_bracket = true;
                }
                ']' => return Err(invalid("unexpected ']'")),
                other => {
                    if after_bracket {
                        return Err(invalid("expected '.' or '[' after ']'"));
                    }
                    key.push(other);
                }
            }
        }
        if !key.is_empty() {
            segments.push(PatternSegment::Key(key));
        }

        Ok(Self {
            raw: trimmed.to_string(),
            segments,
        })
    }

    /// The pattern as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// True when the pattern names a concrete position such as `items[1]`.
    pub fn has_concrete_index(&self) -> bool {
        self.segments
            .iter()
            .any(|segment| matches!(segment, PatternSegment::Index(_)))
    }

    /// True when `path` is exactly the node this pattern names.
    pub fn matches(&self, path: &[PathSegment]) -> bool {
        self.segments.len() == path.len()
            && self
                .segments
                .iter()
                .zip(path)
                .all(|(pattern, segment)| match (pattern, segment) {
                    (PatternSegment::Key(a), PathSegment::Key(b)) => a == b,
                    (PatternSegment::Index(a), PathSegment::Index(b)) => a == b,
                    (PatternSegment::AnyIndex, PathSegment::Index(_)) => true,
                    _ => false,
                })
    }

    /// True when `path` is the named node or lies beneath it.
    pub fn covers(&self, path: &[PathSegment]) -> bool {
        path.len() >= self.segments.len() && self.matches(&path[..self.segments.len()])
    }

    /// Remove every node this pattern names, together with its subtree.
    pub fn strip(&self, value: &mut Value) {
        strip_at(value, &self.segments);
    }
}

/// Read a quoted key up to its closing quote, which is consumed.
fn read_quoted(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<String> {
    let mut key = String::new();
    while let Some(c) = chars.next() {
        match c {
            '"' => return Some(key),
            '\\' => key.push(chars.next()?),
            other => key.push(other),
        }
    }
    None
}

fn strip_at(value: &mut Value, segments: &[PatternSegment]) {
    let Some((head, rest)) = segments.split_first() else {
        return;
    };
    match (head, value) {
        (PatternSegment::Key(key), Value::Object(map)) => {
            if rest.is_empty() {
                map.remove(key);
            } else if let Some(child) = map.get_mut(key) {
                strip_at(child, rest);
            }
        }
        (PatternSegment::Index(index), Value::Array(items)) => {
            if rest.is_empty() {
                if *index < items.len() {
                    items.remove(*index);
                }
            } else if let Some(child) = items.get_mut(*index) {
                strip_at(child, rest);
            }
        }
        (PatternSegment::AnyIndex, Value::Array(items)) => {
            if rest.is_empty() {
                items.clear();
            } else {
                for item in items.iter_mut() {
                    strip_at(item, rest);
                }
            }
        }
        _ => {}
    }
}

/// Apply every pattern in turn.
pub fn strip_all(value: &mut Value, patterns: &[PathPattern]) {
    for pattern in patterns {
        pattern.strip(value);
    }
}

/// Parse a list of raw patterns, failing on the first invalid one.
///
/// # Errors
///
/// Returns the first `CanonicalError::InvalidPathPattern` encountered.
pub fn parse_patterns<S: AsRef<str>>(raw: &[S]) -> Result<Vec<PathPattern>, CanonicalError> {
    raw.iter().map(|p| PathPattern::parse(p.as_ref())).collect()
}

impl FromStr for PathPattern {
    type Err = CanonicalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PathPattern::parse(s)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
