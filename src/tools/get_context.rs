//! MCP `get_context` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `get_context` MCP tool. Unset options fall back to the
/// configured retrieval defaults.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GetContextParams {
    #[schemars(description = "The user query or prompt to enrich with knowledge")]
    pub query: String,

    #[schemars(description = "Maximum hops from the matched nodes (default 2)")]
    pub max_depth: Option<usize>,

    #[schemars(description = "Maximum number of graph nodes to include (default 20)")]
    pub max_nodes: Option<usize>,

    #[schemars(description = "Maximum length of the returned context in characters (default 4000)")]
    pub max_length: Option<usize>,

    #[schemars(
        description = "Entity types to recognize: ip_address, url, domain, email, hash, filename, port, cve, technique. Defaults to all."
    )]
    pub entity_types: Option<Vec<String>>,

    #[schemars(description = "Only report nodes with one of these labels (matched nodes are always kept)")]
    pub node_labels: Option<Vec<String>>,

    #[schemars(description = "Only report relationships of these types")]
    pub relationships: Option<Vec<String>>,
}
