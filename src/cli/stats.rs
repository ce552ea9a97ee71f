use anyhow::Result;

use cake::bootstrap;
use cake::config::CakeConfig;
use cake::knowledge::stats::graph_stats;

/// Display graph statistics in the terminal.
pub fn stats(config: &CakeConfig) -> Result<()> {
    let engine = bootstrap::build_engine(config)?;
    let response = graph_stats(&engine);

    println!("Graph Statistics");
    println!("{}", "=".repeat(40));
    println!("  Nodes:               {}", response.nodes);
    println!("  Edges:               {}", response.edges);
    println!();

    println!("By Label:");
    for (label, count) in &response.by_label {
        println!("  {:<16} {}", label, count);
    }
    println!();

    println!("By Relationship:");
    for (rel, count) in &response.by_relationship {
        println!("  {:<16} {}", rel, count);
    }
    println!();

    println!("By Source:");
    for (source, count) in &response.by_source {
        println!("  {:<16} {}", source, count);
    }
    println!();

    println!("Snapshot:              {}", config.resolved_snapshot_path().display());

    Ok(())
}
