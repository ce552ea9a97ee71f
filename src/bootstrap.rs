//! Engine setup shared by the CLI and the MCP server: warm-start from the
//! snapshot, then load the configured knowledge sources.

use anyhow::Result;
use std::sync::Arc;

use crate::config::CakeConfig;
use crate::knowledge::cache::CacheConfig;
use crate::knowledge::engine::{BulkLoadReport, ContextEngine};
use crate::knowledge::snapshot;
use crate::knowledge::sources::{KnowledgeSource, SourceError};

/// Build an engine from the snapshot at `storage.snapshot_path` plus every
/// configured source. A source that fails to load is logged and skipped.
pub fn build_engine(config: &CakeConfig) -> Result<ContextEngine> {
    let snapshot_path = config.resolved_snapshot_path();
    let graph = snapshot::load_or_empty(&snapshot_path)?;

    let engine = ContextEngine::new(
        Arc::new(graph),
        CacheConfig::from(&config.cache),
        config.retrieval.default_options(),
    )
    .with_max_seeds_per_term(config.retrieval.max_seeds_per_term);

    for source in config.sources.knowledge_sources() {
        if let Err(e) = load_source(&engine, &source) {
            tracing::warn!(source = %source.name(), error = %e, "failed to load knowledge source");
        }
    }

    tracing::info!(
        nodes = engine.graph().node_count(),
        edges = engine.graph().edge_count(),
        "knowledge engine ready"
    );
    Ok(engine)
}

/// Read one source and bulk-load its triplets.
pub fn load_source(
    engine: &ContextEngine,
    source: &KnowledgeSource,
) -> Result<BulkLoadReport, SourceError> {
    let triplets = source.triplets()?;
    tracing::info!(source = %source.name(), triplets = triplets.len(), "loading knowledge source");
    Ok(engine.bulk_load(triplets))
}

/// Write the engine's graph to the configured snapshot path.
pub fn save_snapshot(engine: &ContextEngine, config: &CakeConfig) -> Result<()> {
    snapshot::save(engine.graph(), config.resolved_snapshot_path())
}
