//! MCP `graph_stats` tool parameter definition.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for the `graph_stats` MCP tool.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GraphStatsParams {
    /// Include cache counters in the response.
    #[schemars(description = "Include cache hit/miss/eviction counters (default: true)")]
    pub include_cache: Option<bool>,
}
