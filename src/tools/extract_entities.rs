use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ExtractEntitiesParams {
    #[schemars(description = "Free text to scan for entities")]
    pub text: String,

    #[schemars(
        description = "Entity types to recognize: ip_address, url, domain, email, hash, filename, port, cve, technique. Defaults to all."
    )]
    pub entity_types: Option<Vec<String>>,

    #[schemars(description = "If true, also return the query keywords used for graph lookup")]
    pub include_keywords: Option<bool>,
}
