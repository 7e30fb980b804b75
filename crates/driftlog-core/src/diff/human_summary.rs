//! Human-readable rendering of a [`StructuralDelta`].
//!
//! One line per difference, grouped by kind, each group in path order:
//!
//! ```text
//! ~ spec.image: "nginx:1.24" -> "nginx:1.25"
//! ! spec.replicas: string "3" -> number 3
//! + metadata.labels.team: "core"
//! - metadata.labels.tier: "frontend"
//! ```

use crate::diff::model::StructuralDelta;
use serde_json::Value;

/// Values longer than this are cut with an ellipsis.
const MAX_VALUE_CHARS: usize = 120;

/// Render `delta` as a stable multi-line summary.
///
/// An empty delta renders as `no changes`.
pub fn render_summary(delta: &StructuralDelta) -> String {
    if delta.is_empty() {
        return "no changes".to_string();
    }

    let mut lines = Vec::with_capacity(delta.len());
    for (path, change) in &delta.values_changed {
        lines.push(format!(
            "~ {}: {} -> {}",
            path,
            render_value(&change.old_value),
            render_value(&change.new_value)
        ));
    }
    for (path, change) in &delta.type_changed {
        lines.push(format!(
            "! {}: {} {} -> {} {}",
            path,
            change.old_type.as_str(),
            render_value(&change.old_value),
            change.new_type.as_str(),
            render_value(&change.new_value)
        ));
    }
    for (path, value) in &delta.item_added {
        lines.push(format!("+ {}: {}", path, render_value(value)));
    }
    for (path, value) in &delta.item_removed {
        lines.push(format!("- {}: {}", path, render_value(value)));
    }
    lines.join("\n")
}

fn render_value(value: &Value) -> String {
    let rendered = value.to_string();
    if rendered.chars().count() <= MAX_VALUE_CHARS {
        return rendered;
    }
    let mut cut: String = rendered.chars().take(MAX_VALUE_CHARS).collect();
    cut.push('…');
    cut
}
