use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct DeleteNodeParams {
    #[schemars(description = "Id or name of the node to delete, together with all its edges")]
    pub id: String,

    #[schemars(description = "Must be true to perform the deletion")]
    pub confirm: bool,
}
