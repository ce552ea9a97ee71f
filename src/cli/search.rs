use anyhow::Result;

use cake::bootstrap;
use cake::config::CakeConfig;

/// Search graph nodes by id, label, name, or property value.
pub fn search(config: &CakeConfig, query: &str, limit: usize) -> Result<()> {
    let engine = bootstrap::build_engine(config)?;
    let results = engine.graph().search(query);

    if results.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    println!("Found {} node(s)\n", results.len());
    for (i, node) in results.iter().take(limit).enumerate() {
        let source = node.source().unwrap_or("knowledge_graph");
        println!("  {}. [{}] {} (source: {source})", i + 1, node.primary_label(), node.name);
        let props: Vec<String> = node
            .properties
            .iter()
            .filter(|(k, _)| k.as_str() != "source")
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        if !props.is_empty() {
            println!("     {}", props.join("; "));
        }
    }
    if results.len() > limit {
        println!("\n  ... {} more", results.len() - limit);
    }

    Ok(())
}
