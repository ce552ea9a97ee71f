pub mod add_triplet;
pub mod delete_node;
pub mod extract_entities;
pub mod get_context;
pub mod graph_stats;
pub mod inspect_node;
pub mod search_graph;

use add_triplet::AddTripletParams;
use delete_node::DeleteNodeParams;
use extract_entities::ExtractEntitiesParams;
use get_context::GetContextParams;
use graph_stats::GraphStatsParams;
use inspect_node::InspectNodeParams;
use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{tool, tool_handler, tool_router, ServerHandler};
use search_graph::SearchGraphParams;
use std::collections::HashMap;
use std::sync::Arc;

use cake::knowledge::engine::ContextEngine;
use cake::knowledge::extract;
use cake::knowledge::stats::graph_stats;
use cake::knowledge::types::{normalize_id, Properties, PropertyValue, Triplet};

/// The CAKE MCP tool handler. Holds the shared engine and exposes all MCP tools
/// via the `#[tool_router]` macro.
#[derive(Clone)]
pub struct CakeTools {
    tool_router: ToolRouter<Self>,
    engine: Arc<ContextEngine>,
}

#[tool_router]
impl CakeTools {
    pub fn new(engine: Arc<ContextEngine>) -> Self {
        Self {
            tool_router: Self::tool_router(),
            engine,
        }
    }

    /// Build the knowledge context for a prompt.
    #[tool(description = "Get knowledge-graph context for a query. Extracts entities (IPs, domains, hashes, CVEs, ATT&CK techniques, ...), finds related nodes, and returns a formatted context block to prepend to the prompt.")]
    async fn get_context(
        &self,
        Parameters(params): Parameters<GetContextParams>,
    ) -> Result<String, String> {
        let mut options = self.engine.default_options().clone();
        if let Some(depth) = params.max_depth {
            options.max_depth = depth;
        }
        if let Some(nodes) = params.max_nodes {
            options.max_nodes = nodes;
        }
        if let Some(length) = params.max_length {
            options.max_length = length;
        }
        if let Some(types) = params.entity_types {
            options.entity_types = Some(extract::known_types(&types));
        }
        if let Some(labels) = params.node_labels {
            options.node_labels = Some(labels.into_iter().collect());
        }
        if let Some(rels) = params.relationships {
            options.relationships = Some(rels.into_iter().collect());
        }

        tracing::info!(query_len = params.query.len(), "get_context called");

        // Extraction and traversal are CPU-bound → spawn_blocking
        let engine = Arc::clone(&self.engine);
        let query = params.query;
        let context = tokio::task::spawn_blocking(move || engine.get_context(&query, &options))
            .await
            .map_err(|e| format!("context task failed: {e}"))?;

        Ok(serde_json::json!({
            "context": context,
            "length": context.chars().count(),
        })
        .to_string())
    }

    /// Add a fact to the knowledge graph.
    #[tool(description = "Add a fact as a subject-relationship-object triplet (e.g. nmap documented_in man_page_nmap). Nodes are created or merged; the context cache is invalidated.")]
    async fn add_triplet(
        &self,
        Parameters(params): Parameters<AddTripletParams>,
    ) -> Result<String, String> {
        if params.subject.trim().is_empty() || params.object.trim().is_empty() {
            return Err("subject and object must not be empty".into());
        }

        let mut triplet = Triplet::new(params.subject, params.relationship, params.object);
        triplet.properties = json_properties(params.properties.unwrap_or_default())?;
        triplet.subject_labels = params.subject_labels.unwrap_or_default().into_iter().collect();
        triplet.object_labels = params.object_labels.unwrap_or_default().into_iter().collect();

        tracing::info!(
            subject = %triplet.subject,
            relationship = %triplet.relationship,
            object = %triplet.object,
            "add_triplet called"
        );

        let engine = Arc::clone(&self.engine);
        let (stored, subject, object) = tokio::task::spawn_blocking(move || {
            let stored = engine.add(&triplet);
            (
                stored,
                engine.graph().get(&triplet.subject),
                engine.graph().get(&triplet.object),
            )
        })
        .await
        .map_err(|e| format!("graph task failed: {e}"))?;

        if !stored {
            return Err("triplet rejected".into());
        }
        Ok(serde_json::json!({
            "status": "stored",
            "subject": subject,
            "object": object,
        })
        .to_string())
    }

    /// Search nodes by text.
    #[tool(description = "Search knowledge-graph nodes by id, name, label, or property value. Exact matches rank first.")]
    async fn search_graph(
        &self,
        Parameters(params): Parameters<SearchGraphParams>,
    ) -> Result<String, String> {
        let limit = params.limit.unwrap_or(10).clamp(1, 50);
        let label = params.label.map(|l| l.trim().to_lowercase());
        tracing::info!(query = %params.query, "search_graph called");

        let matches: Vec<_> = self
            .engine
            .graph()
            .search(&params.query)
            .into_iter()
            .filter(|n| label.as_ref().is_none_or(|l| n.labels.contains(l)))
            .collect();
        let total = matches.len();
        let nodes: Vec<_> = matches.into_iter().take(limit).collect();

        Ok(serde_json::json!({
            "nodes": nodes,
            "total": total,
        })
        .to_string())
    }

    /// Inspect a specific node by id.
    #[tool(description = "Inspect a node by id or name. Returns its labels and properties, and optionally its outgoing and incoming edges.")]
    async fn inspect_node(
        &self,
        Parameters(params): Parameters<InspectNodeParams>,
    ) -> Result<String, String> {
        tracing::info!(id = %params.id, "inspect_node called");
        let graph = self.engine.graph();
        let node = graph
            .get(&params.id)
            .ok_or_else(|| format!("node not found: {}", params.id))?;

        let mut response = serde_json::json!({ "node": node });
        if params.include_edges.unwrap_or(true) {
            let (outgoing, incoming) = graph.neighbours(&node.id);
            response["outgoing"] = serde_json::json!(outgoing);
            response["incoming"] = serde_json::json!(incoming);
        }
        Ok(response.to_string())
    }

    /// Delete a node and its edges.
    #[tool(description = "Delete a node and every edge touching it. Requires confirm=true as a safety gate.")]
    async fn delete_node(
        &self,
        Parameters(params): Parameters<DeleteNodeParams>,
    ) -> Result<String, String> {
        if !params.confirm {
            return Err("confirm must be true to delete a node".into());
        }
        tracing::info!(id = %params.id, "delete_node called");

        let engine = Arc::clone(&self.engine);
        let id = params.id.clone();
        let deleted = tokio::task::spawn_blocking(move || engine.delete_node(&id))
            .await
            .map_err(|e| format!("graph task failed: {e}"))?;

        Ok(serde_json::json!({
            "id": normalize_id(&params.id),
            "deleted": deleted,
        })
        .to_string())
    }

    /// Get statistics about the graph and cache.
    #[tool(description = "Get knowledge-graph statistics: node and edge counts by label, relationship, and source, plus context cache counters.")]
    async fn graph_stats(
        &self,
        Parameters(params): Parameters<GraphStatsParams>,
    ) -> Result<String, String> {
        tracing::info!("graph_stats called");
        let stats = graph_stats(&self.engine);
        let mut value =
            serde_json::to_value(&stats).map_err(|e| format!("serialization failed: {e}"))?;
        if !params.include_cache.unwrap_or(true) {
            if let Some(map) = value.as_object_mut() {
                map.remove("cache");
            }
        }
        Ok(value.to_string())
    }

    /// Run entity extraction only.
    #[tool(description = "Extract typed entities (ip_address, url, domain, email, hash, filename, port, cve, technique) from text without querying the graph.")]
    async fn extract_entities(
        &self,
        Parameters(params): Parameters<ExtractEntitiesParams>,
    ) -> Result<String, String> {
        let types = params.entity_types.as_deref().map(extract::known_types);
        let entities = extract::extract(&params.text, types.as_ref());

        let mut response = serde_json::json!({
            "entities": entities,
            "total": entities.len(),
        });
        if params.include_keywords.unwrap_or(false) {
            response["keywords"] = serde_json::json!(extract::keywords(&params.text));
        }
        Ok(response.to_string())
    }
}

#[tool_handler]
impl ServerHandler for CakeTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "CAKE is a knowledge-graph context engine. Call get_context with the user's \
                 prompt and prepend the returned context. Use add_triplet to teach it facts, \
                 and search_graph or inspect_node to browse what it knows."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}

/// Accept only flat JSON values as properties.
fn json_properties(raw: HashMap<String, serde_json::Value>) -> Result<Properties, String> {
    raw.into_iter()
        .map(|(key, value)| {
            serde_json::from_value::<PropertyValue>(value)
                .map(|v| (key.clone(), v))
                .map_err(|_| format!("property '{key}' must be a string, number, or boolean"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cake::knowledge::cache::CacheConfig;
    use cake::knowledge::engine::ContextOptions;
    use cake::knowledge::graph::GraphStore;

    fn tools() -> CakeTools {
        CakeTools::new(Arc::new(ContextEngine::new(
            Arc::new(GraphStore::new()),
            CacheConfig::default(),
            ContextOptions::default(),
        )))
    }

    fn add_params(subject: &str, object: &str) -> AddTripletParams {
        AddTripletParams {
            subject: subject.into(),
            relationship: "documented_in".into(),
            object: object.into(),
            properties: Some(HashMap::from([(
                "source".to_string(),
                serde_json::json!("man_pages"),
            )])),
            subject_labels: Some(vec!["tool".into()]),
            object_labels: None,
        }
    }

    #[tokio::test]
    async fn get_context_ignores_unknown_entity_types() {
        let tools = tools();
        tools
            .add_triplet(Parameters(AddTripletParams {
                subject: "10.0.0.5".into(),
                relationship: "hosts".into(),
                object: "build server".into(),
                properties: None,
                subject_labels: None,
                object_labels: None,
            }))
            .await
            .unwrap();

        let response = tools
            .get_context(Parameters(GetContextParams {
                query: "what is 10.0.0.5 running?".into(),
                max_depth: None,
                max_nodes: None,
                max_length: None,
                entity_types: Some(vec!["planet".into(), "ip_address".into()]),
                node_labels: None,
                relationships: None,
            }))
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&response).unwrap();
        let context = value["context"].as_str().unwrap();
        assert!(context.contains("ip_address: 10.0.0.5"));
        assert!(context.contains("--hosts-->"));
    }

    #[tokio::test]
    async fn add_then_get_context() {
        let tools = tools();
        tools
            .add_triplet(Parameters(add_params("nmap", "man_page_nmap")))
            .await
            .unwrap();

        let response = tools
            .get_context(Parameters(GetContextParams {
                query: "How do I use nmap?".into(),
                max_depth: None,
                max_nodes: None,
                max_length: None,
                entity_types: None,
                node_labels: None,
                relationships: None,
            }))
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&response).unwrap();
        let context = value["context"].as_str().unwrap();
        assert!(context.contains("--documented_in-->"));
        assert!(context.contains("(source: man_pages)"));
    }

    #[tokio::test]
    async fn add_triplet_validates_input() {
        let tools = tools();
        assert!(tools
            .add_triplet(Parameters(add_params("  ", "x")))
            .await
            .is_err());

        let mut params = add_params("nmap", "x");
        params.properties = Some(HashMap::from([(
            "nested".to_string(),
            serde_json::json!({"a": 1}),
        )]));
        let err = tools.add_triplet(Parameters(params)).await.unwrap_err();
        assert!(err.contains("nested"));
        assert_eq!(tools.engine.graph().node_count(), 0);
    }

    #[tokio::test]
    async fn delete_requires_confirmation() {
        let tools = tools();
        tools
            .add_triplet(Parameters(add_params("nmap", "man_page_nmap")))
            .await
            .unwrap();

        let refused = tools
            .delete_node(Parameters(DeleteNodeParams {
                id: "nmap".into(),
                confirm: false,
            }))
            .await;
        assert!(refused.is_err());
        assert!(tools.engine.graph().contains("nmap"));

        let response = tools
            .delete_node(Parameters(DeleteNodeParams {
                id: "NMAP".into(),
                confirm: true,
            }))
            .await
            .unwrap();
        assert!(response.contains(r#""deleted":true"#));
        assert_eq!(tools.engine.graph().edge_count(), 0);
    }

    #[tokio::test]
    async fn search_filters_by_label() {
        let tools = tools();
        tools
            .add_triplet(Parameters(add_params("nmap", "nmap_guide")))
            .await
            .unwrap();

        let response = tools
            .search_graph(Parameters(SearchGraphParams {
                query: "nmap".into(),
                label: Some("Tool".into()),
                limit: None,
            }))
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&response).unwrap();
        assert_eq!(value["total"], 1);
        assert_eq!(value["nodes"][0]["id"], "nmap");
    }

    #[tokio::test]
    async fn extract_ignores_unknown_types() {
        let tools = tools();
        let response = tools
            .extract_entities(Parameters(ExtractEntitiesParams {
                text: "10.0.0.1 and evil.example.com".into(),
                entity_types: Some(vec!["planet".into(), "ip_address".into()]),
                include_keywords: None,
            }))
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&response).unwrap();
        assert_eq!(value["total"], 1);
        assert_eq!(value["entities"][0]["value"], "10.0.0.1");

        let ok = tools
            .extract_entities(Parameters(ExtractEntitiesParams {
                text: "ping 10.0.0.1".into(),
                entity_types: None,
                include_keywords: Some(true),
            }))
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&ok).unwrap();
        assert_eq!(value["entities"][0]["type"], "ip_address");
        assert_eq!(value["keywords"][0], "ping");
    }
}
