//! MCP `search_graph` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SearchGraphParams {
    /// Matched against node ids, names, labels, and property values.
    #[schemars(description = "Text to match against node ids, names, labels, and property values")]
    pub query: String,

    #[schemars(description = "Only return nodes carrying this label")]
    pub label: Option<String>,

    /// Maximum number of nodes to return (1–50). Defaults to 10.
    #[schemars(description = "Maximum number of nodes to return (1-50). Defaults to 10.")]
    pub limit: Option<usize>,
}
