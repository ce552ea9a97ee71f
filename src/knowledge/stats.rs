//! Graph and cache counters for the `stats` command and the `graph_stats` tool.

use serde::Serialize;
use std::collections::BTreeMap;

use super::cache::CacheStats;
use super::engine::ContextEngine;

/// Response from graph_stats.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub nodes: usize,
    pub edges: usize,
    pub by_label: BTreeMap<String, u64>,
    pub by_relationship: BTreeMap<String, u64>,
    /// Nodes grouped by their `source` property. Unattributed nodes count as
    /// `knowledge_graph`.
    pub by_source: BTreeMap<String, u64>,
    pub cache: CacheStats,
}

/// Compute graph and cache statistics.
pub fn graph_stats(engine: &ContextEngine) -> StatsResponse {
    let graph = engine.graph();
    let (nodes, edges) = graph.export();

    let mut by_source = BTreeMap::new();
    for node in &nodes {
        let source = node.source().unwrap_or("knowledge_graph");
        *by_source.entry(source.to_string()).or_insert(0) += 1;
    }

    StatsResponse {
        nodes: nodes.len(),
        edges: edges.len(),
        by_label: graph.label_counts().into_iter().collect(),
        by_relationship: graph.relationship_counts().into_iter().collect(),
        by_source,
        cache: engine.cache().stats(),
    }
}
