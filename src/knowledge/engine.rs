//! The coordinator: one `get_context` call over extraction, lookup, traversal,
//! formatting, and caching, plus the mutation entry points that keep the cache
//! honest.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::cache::{CacheConfig, CacheKey, ContextCache};
use super::extract::{self, Entity, EntityType};
use super::format::format_context;
use super::graph::{GraphBatch, GraphError, GraphStore};
use super::traverse::Subgraph;
use super::types::{normalize_id, Edge, Node, Properties, PropertyValue, Triplet};

/// Per-call retrieval options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextOptions {
    /// Maximum hops from any seed node.
    pub max_depth: usize,
    /// Maximum number of graph nodes in the result.
    pub max_nodes: usize,
    /// Maximum length of the formatted text, in characters.
    pub max_length: usize,
    /// Recognizers to run on the query. `None` runs all of them.
    pub entity_types: Option<BTreeSet<EntityType>>,
    /// Only report nodes carrying one of these labels (seeds are always kept).
    pub node_labels: Option<BTreeSet<String>>,
    /// Only report edges of these relationship types.
    pub relationships: Option<BTreeSet<String>>,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            max_depth: 2,
            max_nodes: 20,
            max_length: 4000,
            entity_types: None,
            node_labels: None,
            relationships: None,
        }
    }
}

/// Outcome of [`ContextEngine::bulk_load`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BulkLoadReport {
    /// Triplets applied to the graph.
    pub applied: usize,
    /// Malformed triplets that were skipped.
    pub skipped: usize,
}

/// Seed nodes, traversal result, and extracted entities behind one context.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Retrieval {
    pub entities: Vec<Entity>,
    pub seeds: Vec<String>,
    pub subgraph: Subgraph,
}

pub struct ContextEngine {
    graph: Arc<GraphStore>,
    cache: ContextCache,
    defaults: ContextOptions,
    max_seeds_per_term: usize,
    seen_revision: AtomicU64,
}

impl ContextEngine {
    pub fn new(graph: Arc<GraphStore>, cache: CacheConfig, defaults: ContextOptions) -> Self {
        let seen_revision = AtomicU64::new(graph.revision());
        Self {
            graph,
            cache: ContextCache::new(cache),
            defaults,
            max_seeds_per_term: 3,
            seen_revision,
        }
    }

    /// Limit how many search hits a single entity or keyword may contribute as seeds.
    pub fn with_max_seeds_per_term(mut self, max: usize) -> Self {
        self.max_seeds_per_term = max;
        self
    }

    pub fn graph(&self) -> &Arc<GraphStore> {
        &self.graph
    }

    pub fn cache(&self) -> &ContextCache {
        &self.cache
    }

    pub fn default_options(&self) -> &ContextOptions {
        &self.defaults
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    /// Build the knowledge context for `query` with the engine's default options.
    pub fn context(&self, query: &str) -> String {
        self.get_context(query, &self.defaults)
    }

    /// Build the knowledge context for `query`.
    ///
    /// Returns an empty string for a blank query or when nothing relevant is
    /// known. Results are cached per `(query, options)` until the next mutation.
    pub fn get_context(&self, query: &str, options: &ContextOptions) -> String {
        if query.trim().is_empty() {
            return String::new();
        }
        self.sync_with_graph();

        let key = CacheKey::new(query, options);
        if let Some(hit) = self.cache.get(&key) {
            tracing::debug!(query = %query, "context cache hit");
            return hit;
        }

        let generation = self.cache.generation();
        let retrieval = self.retrieve(query, options);
        let text = format_context(
            &retrieval.entities,
            &retrieval.subgraph.nodes,
            &retrieval.subgraph.edges,
            options.max_length,
        );

        tracing::debug!(
            query = %query,
            entities = retrieval.entities.len(),
            seeds = retrieval.seeds.len(),
            nodes = retrieval.subgraph.nodes.len(),
            edges = retrieval.subgraph.edges.len(),
            chars = text.chars().count(),
            "context cache miss"
        );
        self.cache.put_if_current(key, text.clone(), generation);
        text
    }

    /// The uncached, unformatted retrieval behind [`ContextEngine::get_context`].
    pub fn retrieve(&self, query: &str, options: &ContextOptions) -> Retrieval {
        let entities = extract::extract(query, options.entity_types.as_ref());
        let seeds = self.resolve_seeds(query, &entities);
        let mut subgraph = self
            .graph
            .expand(&seeds, options.max_depth, options.max_nodes);
        apply_filters(&mut subgraph, &seeds, options);
        Retrieval {
            entities,
            seeds,
            subgraph,
        }
    }

    /// Map the query, its entities, and its keywords to seed node ids.
    ///
    /// The whole query is tried as an id first, then each entity (by id, by a
    /// `value` property, then by search), then each keyword by search. Order is
    /// preserved and duplicates dropped.
    pub fn resolve_seeds(&self, query: &str, entities: &[Entity]) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut seeds = Vec::new();
        let mut push = |id: String| {
            if seen.insert(id.clone()) {
                seeds.push(id);
            }
        };

        if self.graph.contains(query) {
            push(normalize_id(query));
        }

        for entity in entities {
            let value = PropertyValue::from(entity.value.as_str());
            for node in self.graph.find_by_property("value", &value) {
                push(node.id);
            }
            for node in self.graph.search(&entity.value).into_iter().take(self.max_seeds_per_term) {
                push(node.id);
            }
        }

        for keyword in extract::keywords(query) {
            for node in self.graph.search(&keyword).into_iter().take(self.max_seeds_per_term) {
                push(node.id);
            }
        }

        seeds
    }

    // ── Mutations ─────────────────────────────────────────────────────────────

    /// Upsert `subject --relationship--> object`. Returns `false` for a malformed
    /// triplet.
    pub fn add_triplet(
        &self,
        subject: &str,
        relationship: &str,
        object: &str,
        properties: Properties,
    ) -> bool {
        let mut triplet = Triplet::new(subject, relationship, object);
        triplet.properties = properties;
        self.add(&triplet)
    }

    /// Apply one triplet, invalidating the cache on success. Both nodes and the
    /// edge are written under one graph lock.
    pub fn add(&self, triplet: &Triplet) -> bool {
        let applied = self.graph.batch(|batch| apply(batch, triplet));
        if applied {
            self.invalidate();
        }
        applied
    }

    /// Apply triplets in order, skipping malformed ones, then invalidate the
    /// cache once. The whole batch is written under one graph lock, so readers
    /// see either none of it or all of it.
    pub fn bulk_load<I>(&self, triplets: I) -> BulkLoadReport
    where
        I: IntoIterator<Item = Triplet>,
    {
        let report = self.graph.batch(|batch| {
            let mut report = BulkLoadReport::default();
            for triplet in triplets {
                if apply(batch, &triplet) {
                    report.applied += 1;
                } else {
                    report.skipped += 1;
                }
            }
            report
        });

        if report.applied > 0 {
            self.invalidate();
        }
        if report.skipped > 0 {
            tracing::warn!(skipped = report.skipped, "skipped malformed triplets");
        }
        tracing::info!(
            applied = report.applied,
            skipped = report.skipped,
            nodes = self.graph.node_count(),
            edges = self.graph.edge_count(),
            "bulk load complete"
        );
        report
    }

    /// Merge exported nodes and edges into the graph, then invalidate the cache
    /// once. Existing nodes gain labels and properties; nothing is removed.
    pub fn merge(&self, nodes: &[Node], edges: &[Edge]) -> BulkLoadReport {
        let report = self.graph.batch(|batch| {
            let mut report = BulkLoadReport::default();
            let mut tally = |result: Result<(), GraphError>| match result {
                Ok(()) => report.applied += 1,
                Err(_) => report.skipped += 1,
            };
            for node in nodes {
                tally(
                    batch
                        .upsert_node(&node.name, &node.labels, node.properties.clone())
                        .map(|_| ()),
                );
            }
            for edge in edges {
                tally(
                    batch
                        .upsert_edge(
                            &edge.from_id,
                            &edge.to_id,
                            &edge.relationship,
                            edge.properties.clone(),
                        )
                        .map(|_| ()),
                );
            }
            report
        });

        if report.applied > 0 {
            self.invalidate();
        }
        tracing::info!(
            applied = report.applied,
            skipped = report.skipped,
            "merge complete"
        );
        report
    }

    pub fn upsert_node(&self, id_seed: &str, labels: &[&str], properties: Properties) -> Option<Node> {
        let node = self.graph.upsert_node(id_seed, labels, properties).ok()?;
        self.invalidate();
        Some(node)
    }

    pub fn upsert_edge(
        &self,
        from: &str,
        to: &str,
        relationship: &str,
        properties: Properties,
    ) -> Option<Edge> {
        let edge = self.graph.upsert_edge(from, to, relationship, properties).ok()?;
        self.invalidate();
        Some(edge)
    }

    /// Remove a node and its edges. Returns `false` if it did not exist.
    pub fn delete_node(&self, id: &str) -> bool {
        let removed = self.graph.delete_node(id);
        if removed {
            tracing::info!(id = %id, "node deleted");
            self.invalidate();
        }
        removed
    }

    fn invalidate(&self) {
        self.seen_revision
            .store(self.graph.revision(), Ordering::Release);
        self.cache.invalidate_all();
    }

    /// Drop cached context if the store was mutated behind the engine's back.
    fn sync_with_graph(&self) {
        let current = self.graph.revision();
        if self.seen_revision.swap(current, Ordering::AcqRel) != current {
            tracing::debug!("graph changed outside the engine, invalidating cache");
            self.cache.invalidate_all();
        }
    }
}

/// Write one triplet into `batch`. Returns `false` for a malformed triplet.
fn apply(batch: &mut GraphBatch<'_>, triplet: &Triplet) -> bool {
    if !triplet.is_well_formed() {
        tracing::debug!(
            subject = %triplet.subject,
            object = %triplet.object,
            "malformed triplet"
        );
        return false;
    }

    let with_source = |properties: &Properties| -> Properties {
        let mut properties = properties.clone();
        if let Some(source) = triplet.properties.get("source") {
            properties
                .entry("source".to_string())
                .or_insert_with(|| source.clone());
        }
        properties
    };

    let applied = batch
        .upsert_node(
            &triplet.subject,
            &triplet.subject_labels,
            with_source(&triplet.subject_properties),
        )
        .and_then(|_| {
            batch.upsert_node(
                &triplet.object,
                &triplet.object_labels,
                with_source(&triplet.object_properties),
            )
        })
        .and_then(|_| {
            batch.upsert_edge(
                &triplet.subject,
                &triplet.object,
                &triplet.relationship,
                triplet.properties.clone(),
            )
        });

    match applied {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(error = %e, "triplet rejected");
            false
        }
    }
}

fn apply_filters(subgraph: &mut Subgraph, seeds: &[String], options: &ContextOptions) {
    if let Some(labels) = &options.node_labels {
        let labels: BTreeSet<String> = labels.iter().map(|l| l.trim().to_lowercase()).collect();
        subgraph
            .nodes
            .retain(|n| seeds.contains(&n.id) || n.labels.iter().any(|l| labels.contains(l)));
    }
    if let Some(relationships) = &options.relationships {
        subgraph
            .edges
            .retain(|e| relationships.contains(&e.relationship));
    }
    if options.node_labels.is_some() {
        let kept: HashSet<&str> = subgraph.nodes.iter().map(|n| n.id.as_str()).collect();
        subgraph
            .edges
            .retain(|e| kept.contains(e.from_id.as_str()) && kept.contains(e.to_id.as_str()));
    }
}
