//! Render entities and a subgraph into a bounded prompt section.

use std::collections::HashMap;

use super::extract::Entity;
use super::types::{Edge, Node, Properties};

/// Appended as the last line whenever output had to be cut.
pub const TRUNCATION_MARKER: &str = "[... knowledge context truncated ...]";

/// Attribution used for graph facts without a `source` property.
const DEFAULT_SOURCE: &str = "knowledge_graph";

struct Line {
    text: String,
    header: bool,
}

impl Line {
    fn header(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            header: true,
        }
    }

    fn fact(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            header: false,
        }
    }
}

/// Format entities, nodes, and edges as text of at most `max_length` characters.
///
/// Sections appear in a fixed order (entities by type, nodes grouped by label,
/// relationships) and are sorted, so identical inputs give identical output.
/// Every node and edge line names its source. Over-long output is cut at the
/// last whole line that fits and ends with [`TRUNCATION_MARKER`]. Returns an
/// empty string when there is nothing to report.
pub fn format_context(
    entities: &[Entity],
    nodes: &[Node],
    edges: &[Edge],
    max_length: usize,
) -> String {
    let lines = build_lines(entities, nodes, edges);
    if lines.is_empty() {
        return String::new();
    }

    let full = join(&lines);
    if full.chars().count() <= max_length {
        return full;
    }
    truncate(lines, max_length)
}

fn build_lines(entities: &[Entity], nodes: &[Node], edges: &[Edge]) -> Vec<Line> {
    let mut lines = Vec::new();

    if !entities.is_empty() {
        let mut sorted: Vec<&Entity> = entities.iter().collect();
        sorted.sort_by(|a, b| {
            a.entity_type
                .cmp(&b.entity_type)
                .then_with(|| a.value.cmp(&b.value))
        });
        lines.push(Line::header("Entities mentioned in the query:"));
        for entity in sorted {
            lines.push(Line::fact(format!(
                "- {}: {} (source: query, confidence {:.2})",
                entity.entity_type, entity.value, entity.confidence
            )));
        }
    }

    if !nodes.is_empty() {
        let mut sorted: Vec<&Node> = nodes.iter().collect();
        sorted.sort_by(|a, b| {
            a.primary_label()
                .cmp(b.primary_label())
                .then_with(|| a.id.cmp(&b.id))
        });
        if !lines.is_empty() {
            lines.push(Line::header(""));
        }
        lines.push(Line::header("Knowledge graph nodes:"));
        let mut current_label: Option<&str> = None;
        for node in sorted {
            let label = node.primary_label();
            if current_label != Some(label) {
                lines.push(Line::header(format!("[{label}]")));
                current_label = Some(label);
            }
            lines.push(Line::fact(node_line(node)));
        }
    }

    if !edges.is_empty() {
        let names: HashMap<&str, &str> = nodes
            .iter()
            .map(|n| (n.id.as_str(), n.name.as_str()))
            .collect();
        let display = |id: &str| -> String {
            names.get(id).copied().unwrap_or(id).to_string()
        };

        let mut sorted: Vec<&Edge> = edges.iter().collect();
        sorted.sort_by(|a, b| {
            a.relationship
                .cmp(&b.relationship)
                .then_with(|| a.from_id.cmp(&b.from_id))
                .then_with(|| a.to_id.cmp(&b.to_id))
        });
        if !lines.is_empty() {
            lines.push(Line::header(""));
        }
        lines.push(Line::header("Relationships:"));
        for edge in sorted {
            let mut text = format!(
                "- {} --{}--> {} (source: {})",
                display(&edge.from_id),
                edge.relationship,
                display(&edge.to_id),
                edge.source().unwrap_or(DEFAULT_SOURCE)
            );
            append_properties(&mut text, &edge.properties);
            lines.push(Line::fact(text));
        }
    }

    lines
}

fn node_line(node: &Node) -> String {
    let mut text = format!(
        "- {} {} (source: {})",
        capitalize(node.primary_label()),
        node.name,
        node.source().unwrap_or(DEFAULT_SOURCE)
    );
    append_properties(&mut text, &node.properties);
    text
}

fn append_properties(text: &mut String, properties: &Properties) {
    let rendered: Vec<String> = properties
        .iter()
        .filter(|(key, _)| key.as_str() != "source")
        .map(|(key, value)| format!("{key}={value}"))
        .collect();
    if !rendered.is_empty() {
        text.push_str(": ");
        text.push_str(&rendered.join("; "));
    }
}

fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn join(lines: &[Line]) -> String {
    lines
        .iter()
        .map(|l| l.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

fn truncate(lines: Vec<Line>, max_length: usize) -> String {
    let marker_len = TRUNCATION_MARKER.chars().count();
    if max_length < marker_len {
        return String::new();
    }

    // Every kept line costs its length plus the newline that follows it.
    let budget = max_length - marker_len;
    let mut used = 0;
    let mut kept: Vec<Line> = Vec::new();
    for line in lines {
        let cost = line.text.chars().count() + 1;
        if used + cost > budget {
            break;
        }
        used += cost;
        kept.push(line);
    }
    while kept.last().is_some_and(|l| l.header) {
        kept.pop();
    }

    let mut out = join(&kept);
    if !out.is_empty() {
        out.push('\n');
    }
    out.push_str(TRUNCATION_MARKER);
    out
}
