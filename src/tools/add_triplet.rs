use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct AddTripletParams {
    #[schemars(description = "Subject entity, e.g. 'nmap'")]
    pub subject: String,

    #[schemars(description = "Relationship type, e.g. 'documented_in'. Defaults to 'related_to' when blank.")]
    pub relationship: String,

    #[schemars(description = "Object entity, e.g. 'man_page_nmap'")]
    pub object: String,

    #[schemars(
        description = "Flat properties for the relationship (strings, numbers, booleans). A 'source' property is also recorded on both nodes."
    )]
    pub properties: Option<HashMap<String, serde_json::Value>>,

    #[schemars(description = "Labels for the subject node, e.g. ['tool']")]
    pub subject_labels: Option<Vec<String>>,

    #[schemars(description = "Labels for the object node, e.g. ['document']")]
    pub object_labels: Option<Vec<String>>,
}
