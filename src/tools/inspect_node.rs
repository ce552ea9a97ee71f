use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct InspectNodeParams {
    #[schemars(description = "Id or name of the node to inspect")]
    pub id: String,

    #[schemars(description = "If true (default), include outgoing and incoming edges")]
    pub include_edges: Option<bool>,
}
