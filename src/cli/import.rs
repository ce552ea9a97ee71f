use anyhow::{Context, Result};
use std::path::Path;

use cake::bootstrap;
use cake::config::CakeConfig;
use cake::knowledge::snapshot::Snapshot;

/// Import a file produced by `export` and merge it into the current graph.
///
/// Existing nodes keep their edges and gain the imported labels and
/// properties. The merged graph is saved back to the snapshot path.
pub fn import(config: &CakeConfig, file: &Path) -> Result<()> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read import file: {}", file.display()))?;
    let data = Snapshot::from_json(&json).context("failed to parse import JSON")?;

    let engine = bootstrap::build_engine(config)?;

    println!(
        "Importing {} nodes and {} edges...",
        data.nodes.len(),
        data.edges.len()
    );
    let report = engine.merge(&data.nodes, &data.edges);
    bootstrap::save_snapshot(&engine, config)?;

    println!("Import complete:");
    println!("  Records applied:   {}", report.applied);
    if report.skipped > 0 {
        println!("  Records skipped:   {} (empty identifiers)", report.skipped);
    }
    println!("  Graph nodes:       {}", engine.graph().node_count());
    println!("  Graph edges:       {}", engine.graph().edge_count());

    Ok(())
}
