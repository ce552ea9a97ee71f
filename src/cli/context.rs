//! CLI `context` command: print the knowledge context for a query.

use anyhow::Result;

use cake::bootstrap;
use cake::config::CakeConfig;
use cake::knowledge::engine::ContextOptions;

/// Per-call overrides from the command line. `None` keeps the configured value.
#[derive(Debug, Default)]
pub struct ContextArgs {
    pub max_depth: Option<usize>,
    pub max_nodes: Option<usize>,
    pub max_length: Option<usize>,
    pub entity_types: Option<String>,
    pub node_labels: Option<String>,
    pub relationships: Option<String>,
}

impl ContextArgs {
    fn apply(&self, mut options: ContextOptions) -> Result<ContextOptions> {
        if let Some(depth) = self.max_depth {
            options.max_depth = depth;
        }
        if let Some(nodes) = self.max_nodes {
            options.max_nodes = nodes;
        }
        if let Some(length) = self.max_length {
            options.max_length = length;
        }
        if let Some(ref types) = self.entity_types {
            options.entity_types = Some(super::parse_entity_types(types)?);
        }
        if let Some(ref labels) = self.node_labels {
            options.node_labels = Some(super::parse_list(labels));
        }
        if let Some(ref rels) = self.relationships {
            options.relationships = Some(super::parse_list(rels));
        }
        Ok(options)
    }
}

pub fn context(config: &CakeConfig, query: &str, args: &ContextArgs) -> Result<()> {
    let engine = bootstrap::build_engine(config)?;
    let options = args.apply(engine.default_options().clone())?;

    let text = engine.get_context(query, &options);
    if text.is_empty() {
        eprintln!("No relevant knowledge found.");
    } else {
        println!("{text}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_only_given_fields() {
        let args = ContextArgs {
            max_depth: Some(1),
            relationships: Some("uses".into()),
            ..ContextArgs::default()
        };
        let options = args.apply(ContextOptions::default()).unwrap();
        assert_eq!(options.max_depth, 1);
        assert_eq!(options.max_nodes, 20);
        assert!(options.relationships.unwrap().contains("uses"));
        assert!(options.entity_types.is_none());
    }
}
