//! CLI `inspect` command: display a node with its edges.

use anyhow::{bail, Result};

use cake::bootstrap;
use cake::config::CakeConfig;

pub fn inspect(config: &CakeConfig, id: &str) -> Result<()> {
    let engine = bootstrap::build_engine(config)?;
    let Some(node) = engine.graph().get(id) else {
        bail!("node not found: {id}");
    };
    let (outgoing, incoming) = engine.graph().neighbours(&node.id);

    println!("Node: {}", node.id);
    println!("{}", "=".repeat(50));
    println!("  Name:           {}", node.name);
    let labels: Vec<&str> = node.labels.iter().map(String::as_str).collect();
    println!(
        "  Labels:         {}",
        if labels.is_empty() { "(none)".to_string() } else { labels.join(", ") }
    );
    for (key, value) in &node.properties {
        println!("  {:<15} {value}", format!("{key}:"));
    }

    if !outgoing.is_empty() {
        println!();
        println!("Outgoing:");
        for edge in &outgoing {
            println!("  --[{}]--> {}", edge.relationship, edge.to_id);
        }
    }
    if !incoming.is_empty() {
        println!();
        println!("Incoming:");
        for edge in &incoming {
            println!("  {} --[{}]-->", edge.from_id, edge.relationship);
        }
    }

    Ok(())
}
