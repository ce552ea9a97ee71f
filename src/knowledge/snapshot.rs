//! JSON snapshot of the graph for fast warm starts.
//!
//! A snapshot holds every node and edge in insertion order. Restoring one
//! rebuilds the same node and edge sets, including the secondary indices.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::graph::GraphStore;
use super::types::{Edge, Node};

/// Bumped whenever the on-disk layout changes.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: u32,
    pub exported_at: DateTime<Utc>,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Snapshot {
    pub fn capture(graph: &GraphStore) -> Self {
        let (nodes, edges) = graph.export();
        Self {
            version: SNAPSHOT_VERSION,
            exported_at: Utc::now(),
            nodes,
            edges,
        }
    }

    pub fn into_graph(self) -> GraphStore {
        GraphStore::restore(self.nodes, self.edges)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Snapshot = serde_json::from_str(json).context("failed to parse snapshot JSON")?;
        if snapshot.version != SNAPSHOT_VERSION {
            bail!(
                "unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
                snapshot.version
            );
        }
        Ok(snapshot)
    }
}

/// Write the graph to `path`. Uses an atomic write (tmp + rename).
pub fn save(graph: &GraphStore, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    let snapshot = Snapshot::capture(graph);
    let json = serde_json::to_string_pretty(&snapshot)?;

    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, json)
        .with_context(|| format!("failed to write {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, path).context("failed to rename temp snapshot")?;

    tracing::info!(
        path = %path.display(),
        nodes = snapshot.nodes.len(),
        edges = snapshot.edges.len(),
        "snapshot saved"
    );
    Ok(())
}

/// Read a graph from `path`.
pub fn load(path: impl AsRef<Path>) -> Result<GraphStore> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read snapshot: {}", path.display()))?;
    let snapshot = Snapshot::from_json(&json)?;
    tracing::info!(
        path = %path.display(),
        nodes = snapshot.nodes.len(),
        edges = snapshot.edges.len(),
        "snapshot loaded"
    );
    Ok(snapshot.into_graph())
}

/// Read a graph from `path`, or start empty if there is no snapshot yet.
pub fn load_or_empty(path: impl AsRef<Path>) -> Result<GraphStore> {
    let path = path.as_ref();
    if path.exists() {
        load(path)
    } else {
        tracing::info!("no snapshot at {}, starting with an empty graph", path.display());
        Ok(GraphStore::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::types::{Properties, PropertyValue};

    #[test]
    fn rejects_unknown_version() {
        let json = r#"{"version": 99, "exported_at": "2024-01-01T00:00:00Z", "nodes": [], "edges": []}"#;
        let err = Snapshot::from_json(json).unwrap_err();
        assert!(err.to_string().contains("unsupported snapshot version"));
    }

    #[test]
    fn missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let graph = load_or_empty(dir.path().join("absent.json")).unwrap();
        assert_eq!(graph.node_count(), 0);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("graph.json");

        let graph = GraphStore::new();
        let props = Properties::from([
            ("source".to_string(), PropertyValue::from("mitre_attack")),
            ("score".to_string(), PropertyValue::Float(7.5)),
            ("active".to_string(), PropertyValue::Bool(true)),
        ]);
        graph.upsert_node("T1003", ["technique"], props.clone()).unwrap();
        graph.upsert_edge("mimikatz", "T1003", "implements", props).unwrap();

        save(&graph, &path).unwrap();
        assert!(!path.with_extension("tmp").exists());

        let restored = load(&path).unwrap();
        assert_eq!(restored.nodes(), graph.nodes());
        assert_eq!(restored.edges(), graph.edges());
    }
}
