use anyhow::Result;

use cake::bootstrap;
use cake::config::CakeConfig;
use cake::knowledge::snapshot::Snapshot;

/// Export the whole graph as a snapshot document to stdout.
pub fn export(config: &CakeConfig) -> Result<()> {
    let engine = bootstrap::build_engine(config)?;
    let snapshot = Snapshot::capture(engine.graph());

    let json = serde_json::to_string_pretty(&snapshot)?;
    println!("{json}");

    eprintln!(
        "Exported {} nodes and {} edges.",
        snapshot.nodes.len(),
        snapshot.edges.len()
    );

    Ok(())
}
