//! In-memory typed node/edge store.
//!
//! [`GraphStore`] keeps nodes and directed edges behind a single
//! `parking_lot::RwLock`: lookups and traversals share the read lock, upserts and
//! deletes take the write lock. Label and property secondary indices keep
//! [`GraphStore::find_by_label`] and [`GraphStore::find_by_property`] sub-linear.
//! Several writes can share one write lock through [`GraphStore::batch`], so
//! readers never observe a half-applied group of upserts.
//!
//! Every node and edge carries an insertion sequence number. Adjacency lists are
//! kept in insertion order, which is what makes traversal output reproducible.

use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

use super::types::{normalize_id, Edge, EdgeKey, Node, Properties, PropertyValue};

/// Relationship used when a triplet arrives without one.
pub const DEFAULT_RELATIONSHIP: &str = "related_to";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("{0} identifier is empty after normalization")]
    EmptyIdentifier(&'static str),
}

pub(super) struct NodeSlot {
    pub(super) node: Node,
    pub(super) seq: u64,
}

pub(super) struct EdgeSlot {
    pub(super) edge: Edge,
    pub(super) seq: u64,
}

#[derive(Default)]
pub(super) struct GraphInner {
    pub(super) nodes: HashMap<String, NodeSlot>,
    pub(super) edges: HashMap<EdgeKey, EdgeSlot>,
    pub(super) outgoing: HashMap<String, Vec<EdgeKey>>,
    pub(super) incoming: HashMap<String, Vec<EdgeKey>>,
    labels: HashMap<String, BTreeSet<String>>,
    properties: HashMap<String, HashMap<IndexValue, BTreeSet<String>>>,
    next_seq: u64,
}

/// Property value as a property-index key. Values of different kinds never
/// compare equal, so `Integer(443)` does not match `Text("443")`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum IndexValue {
    Bool(bool),
    Integer(i64),
    Float(u64),
    Text(String),
}

impl From<&PropertyValue> for IndexValue {
    fn from(value: &PropertyValue) -> Self {
        match value {
            PropertyValue::Bool(b) => Self::Bool(*b),
            PropertyValue::Integer(i) => Self::Integer(*i),
            PropertyValue::Float(f) => Self::Float(f.to_bits()),
            PropertyValue::Text(s) => Self::Text(s.clone()),
        }
    }
}

/// Write access to the graph for the duration of one [`GraphStore::batch`].
pub struct GraphBatch<'a> {
    inner: &'a mut GraphInner,
    changed: bool,
}

/// Thread-safe knowledge graph. Construct one per engine and share it by `Arc`.
#[derive(Default)]
pub struct GraphStore {
    pub(super) inner: RwLock<GraphInner>,
    revision: AtomicU64,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from previously exported nodes and edges, in order.
    ///
    /// Edges whose endpoints are missing create those endpoints implicitly, as
    /// [`GraphStore::upsert_edge`] does.
    pub fn restore(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        let mut inner = GraphInner::default();
        for node in nodes {
            inner.merge_node(node);
        }
        for edge in edges {
            inner.ensure_node(&edge.from_id, &edge.from_id);
            inner.ensure_node(&edge.to_id, &edge.to_id);
            inner.merge_edge(edge);
        }
        Self {
            inner: RwLock::new(inner),
            revision: AtomicU64::new(0),
        }
    }

    /// Counter bumped by every mutation. Lets caches detect writes made directly
    /// on the store.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    fn bump_revision(&self) {
        self.revision.fetch_add(1, Ordering::AcqRel);
    }

    /// Run `f` with exclusive write access. Every upsert inside `f` becomes
    /// visible to readers at once, and the revision is bumped once if anything
    /// was written.
    pub fn batch<R>(&self, f: impl FnOnce(&mut GraphBatch<'_>) -> R) -> R {
        let mut inner = self.inner.write();
        let mut batch = GraphBatch {
            inner: &mut *inner,
            changed: false,
        };
        let result = f(&mut batch);
        if batch.changed {
            self.bump_revision();
        }
        result
    }

    /// Insert a node or merge into the existing one with the same normalized id.
    ///
    /// Labels are unioned; properties are overwritten key by key. The display
    /// name is kept from the first insertion.
    pub fn upsert_node<I, S>(
        &self,
        id_seed: &str,
        labels: I,
        properties: Properties,
    ) -> Result<Node, GraphError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.batch(|batch| batch.upsert_node(id_seed, labels, properties))
    }

    /// Insert a directed edge, creating missing endpoints with empty labels.
    ///
    /// Re-adding the same `(from, to, relationship)` merges properties only.
    pub fn upsert_edge(
        &self,
        from_seed: &str,
        to_seed: &str,
        relationship: &str,
        properties: Properties,
    ) -> Result<Edge, GraphError> {
        self.batch(|batch| batch.upsert_edge(from_seed, to_seed, relationship, properties))
    }

    /// Remove a node and every edge touching it. Returns `false` if the node did
    /// not exist.
    pub fn delete_node(&self, id: &str) -> bool {
        let id = normalize_id(id);
        let mut inner = self.inner.write();
        let removed = inner.remove_node(&id);
        if removed {
            self.bump_revision();
        }
        removed
    }

    pub fn get(&self, id: &str) -> Option<Node> {
        let inner = self.inner.read();
        inner.nodes.get(&normalize_id(id)).map(|slot| slot.node.clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.read().nodes.contains_key(&normalize_id(id))
    }

    /// Nodes carrying `label`, ordered by id.
    pub fn find_by_label(&self, label: &str) -> Vec<Node> {
        let label = label.trim().to_lowercase();
        let inner = self.inner.read();
        inner
            .labels
            .get(&label)
            .map(|ids| inner.collect_nodes(ids))
            .unwrap_or_default()
    }

    /// Nodes whose property `key` equals `value`, ordered by id.
    ///
    /// Matching is typed: `Integer(443)`, `Float(443.0)` and `Text("443")` are
    /// three different values.
    pub fn find_by_property(&self, key: &str, value: &PropertyValue) -> Vec<Node> {
        let inner = self.inner.read();
        inner
            .properties
            .get(key)
            .and_then(|by_value| by_value.get(&IndexValue::from(value)))
            .map(|ids| inner.collect_nodes(ids))
            .unwrap_or_default()
    }

    /// Case-insensitive substring search over node ids, names, labels, and
    /// property values.
    ///
    /// Exact id matches rank first, then exact label/name/property matches, then
    /// partial matches; ties are broken by id.
    pub fn search(&self, query: &str) -> Vec<Node> {
        let needle = normalize_id(query);
        if needle.is_empty() {
            return Vec::new();
        }

        let inner = self.inner.read();
        let mut ranked: Vec<(u8, &Node)> = inner
            .nodes
            .values()
            .filter_map(|slot| match_rank(&slot.node, &needle).map(|rank| (rank, &slot.node)))
            .collect();
        ranked.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.id.cmp(&b.1.id)));
        ranked.into_iter().map(|(_, node)| node.clone()).collect()
    }

    /// Outgoing and incoming edges of a node, each in insertion order.
    pub fn neighbours(&self, id: &str) -> (Vec<Edge>, Vec<Edge>) {
        let id = normalize_id(id);
        let inner = self.inner.read();
        let collect = |keys: Option<&Vec<EdgeKey>>| -> Vec<Edge> {
            keys.map(|keys| {
                keys.iter()
                    .map(|key| inner.edge(key).clone())
                    .collect()
            })
            .unwrap_or_default()
        };
        (collect(inner.outgoing.get(&id)), collect(inner.incoming.get(&id)))
    }

    pub fn node_count(&self) -> usize {
        self.inner.read().nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.inner.read().edges.len()
    }

    /// All nodes in insertion order.
    pub fn nodes(&self) -> Vec<Node> {
        self.inner.read().ordered_nodes()
    }

    /// All edges in insertion order.
    pub fn edges(&self) -> Vec<Edge> {
        self.inner.read().ordered_edges()
    }

    /// Nodes and edges in insertion order, read under a single lock.
    pub fn export(&self) -> (Vec<Node>, Vec<Edge>) {
        let inner = self.inner.read();
        (inner.ordered_nodes(), inner.ordered_edges())
    }

    /// Number of nodes per label.
    pub fn label_counts(&self) -> HashMap<String, u64> {
        let inner = self.inner.read();
        inner
            .labels
            .iter()
            .map(|(label, ids)| (label.clone(), ids.len() as u64))
            .collect()
    }

    /// Number of edges per relationship type.
    pub fn relationship_counts(&self) -> HashMap<String, u64> {
        let inner = self.inner.read();
        let mut counts = HashMap::new();
        for key in inner.edges.keys() {
            *counts.entry(key.relationship.clone()).or_insert(0) += 1;
        }
        counts
    }
}

impl GraphBatch<'_> {
    /// Same as [`GraphStore::upsert_node`], inside the batch.
    pub fn upsert_node<I, S>(
        &mut self,
        id_seed: &str,
        labels: I,
        properties: Properties,
    ) -> Result<Node, GraphError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let id = normalize_id(id_seed);
        if id.is_empty() {
            return Err(GraphError::EmptyIdentifier("node"));
        }
        let node = Node {
            id,
            name: id_seed.trim().to_string(),
            labels: normalize_labels(labels),
            properties,
        };
        self.changed = true;
        Ok(self.inner.merge_node(node))
    }

    /// Same as [`GraphStore::upsert_edge`], inside the batch.
    pub fn upsert_edge(
        &mut self,
        from_seed: &str,
        to_seed: &str,
        relationship: &str,
        properties: Properties,
    ) -> Result<Edge, GraphError> {
        let from_id = normalize_id(from_seed);
        if from_id.is_empty() {
            return Err(GraphError::EmptyIdentifier("source"));
        }
        let to_id = normalize_id(to_seed);
        if to_id.is_empty() {
            return Err(GraphError::EmptyIdentifier("target"));
        }
        let relationship = normalize_relationship(relationship);

        self.changed = true;
        self.inner.ensure_node(&from_id, from_seed.trim());
        self.inner.ensure_node(&to_id, to_seed.trim());
        Ok(self.inner.merge_edge(Edge {
            from_id,
            to_id,
            relationship,
            properties,
        }))
    }
}

impl GraphInner {
    fn bump_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    pub(super) fn edge(&self, key: &EdgeKey) -> &Edge {
        &self
            .edges
            .get(key)
            .expect("adjacency list references an edge missing from the edge map")
            .edge
    }

    fn ordered_nodes(&self) -> Vec<Node> {
        let mut slots: Vec<&NodeSlot> = self.nodes.values().collect();
        slots.sort_by_key(|slot| slot.seq);
        slots.into_iter().map(|slot| slot.node.clone()).collect()
    }

    fn ordered_edges(&self) -> Vec<Edge> {
        let mut slots: Vec<&EdgeSlot> = self.edges.values().collect();
        slots.sort_by_key(|slot| slot.seq);
        slots.into_iter().map(|slot| slot.edge.clone()).collect()
    }

    fn collect_nodes(&self, ids: &BTreeSet<String>) -> Vec<Node> {
        ids.iter()
            .filter_map(|id| self.nodes.get(id))
            .map(|slot| slot.node.clone())
            .collect()
    }

    fn ensure_node(&mut self, id: &str, name: &str) {
        if self.nodes.contains_key(id) {
            return;
        }
        let seq = self.bump_seq();
        self.nodes.insert(
            id.to_string(),
            NodeSlot {
                node: Node {
                    id: id.to_string(),
                    name: name.to_string(),
                    labels: BTreeSet::new(),
                    properties: Properties::new(),
                },
                seq,
            },
        );
    }

    fn merge_node(&mut self, incoming: Node) -> Node {
        let id = incoming.id.clone();
        if !self.nodes.contains_key(&id) {
            self.ensure_node(&id, &incoming.name);
        }

        for label in &incoming.labels {
            self.labels.entry(label.clone()).or_default().insert(id.clone());
        }
        for (key, value) in &incoming.properties {
            let old = self
                .nodes
                .get(&id)
                .and_then(|slot| slot.node.properties.get(key))
                .map(IndexValue::from);
            if let Some(old) = old {
                self.unindex_property(key, &old, &id);
            }
            self.properties
                .entry(key.clone())
                .or_default()
                .entry(IndexValue::from(value))
                .or_default()
                .insert(id.clone());
        }

        let slot = self
            .nodes
            .get_mut(&id)
            .expect("node inserted above");
        if slot.node.name.is_empty() {
            slot.node.name = incoming.name;
        }
        slot.node.labels.extend(incoming.labels);
        slot.node.properties.extend(incoming.properties);
        slot.node.clone()
    }

    fn merge_edge(&mut self, incoming: Edge) -> Edge {
        let key = incoming.key();
        if let Some(slot) = self.edges.get_mut(&key) {
            slot.edge.properties.extend(incoming.properties);
            return slot.edge.clone();
        }

        let seq = self.bump_seq();
        self.outgoing
            .entry(key.from_id.clone())
            .or_default()
            .push(key.clone());
        self.incoming
            .entry(key.to_id.clone())
            .or_default()
            .push(key.clone());
        self.edges.insert(
            key,
            EdgeSlot {
                edge: incoming.clone(),
                seq,
            },
        );
        incoming
    }

    fn remove_node(&mut self, id: &str) -> bool {
        let Some(slot) = self.nodes.remove(id) else {
            return false;
        };

        for label in &slot.node.labels {
            if let Some(ids) = self.labels.get_mut(label) {
                ids.remove(id);
                if ids.is_empty() {
                    self.labels.remove(label);
                }
            }
        }
        for (key, value) in &slot.node.properties {
            self.unindex_property(key, &IndexValue::from(value), id);
        }

        let mut touching: Vec<EdgeKey> = self.outgoing.remove(id).unwrap_or_default();
        touching.extend(self.incoming.remove(id).unwrap_or_default());
        for key in touching {
            if self.edges.remove(&key).is_none() {
                // Self-loops appear in both lists.
                continue;
            }
            if key.from_id != id {
                if let Some(list) = self.outgoing.get_mut(&key.from_id) {
                    list.retain(|k| k != &key);
                }
            }
            if key.to_id != id {
                if let Some(list) = self.incoming.get_mut(&key.to_id) {
                    list.retain(|k| k != &key);
                }
            }
        }

        debug_assert!(
            self.edges
                .keys()
                .all(|k| k.from_id != id && k.to_id != id),
            "edge left dangling after deleting {id}"
        );
        true
    }

    fn unindex_property(&mut self, key: &str, value: &IndexValue, id: &str) {
        let Some(by_value) = self.properties.get_mut(key) else {
            return;
        };
        if let Some(ids) = by_value.get_mut(value) {
            ids.remove(id);
            if ids.is_empty() {
                by_value.remove(value);
            }
        }
        if by_value.is_empty() {
            self.properties.remove(key);
        }
    }
}

fn normalize_labels<I, S>(labels: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    labels
        .into_iter()
        .map(|l| l.as_ref().trim().to_lowercase())
        .filter(|l| !l.is_empty())
        .collect()
}

fn normalize_relationship(relationship: &str) -> String {
    let relationship = relationship.trim();
    if relationship.is_empty() {
        DEFAULT_RELATIONSHIP.to_string()
    } else {
        relationship.to_string()
    }
}

/// 0 = exact id, 1 = exact label/name/property, 2 = partial.
fn match_rank(node: &Node, needle: &str) -> Option<u8> {
    if node.id == needle {
        return Some(0);
    }

    let property_texts = || {
        node.properties
            .values()
            .map(|v| normalize_id(&v.to_string()))
    };

    let exact = node.labels.contains(needle)
        || normalize_id(&node.name) == needle
        || property_texts().any(|v| v == needle);
    if exact {
        return Some(1);
    }

    let partial = node.id.contains(needle)
        || normalize_id(&node.name).contains(needle)
        || property_texts().any(|v| v.contains(needle));
    partial.then_some(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn props(pairs: &[(&str, &str)]) -> Properties {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), PropertyValue::from(*v)))
            .collect()
    }

    #[test]
    fn upsert_node_merges_labels_and_properties() {
        let graph = GraphStore::new();
        graph
            .upsert_node("Mimikatz", ["tool"], props(&[("source", "mitre_attack")]))
            .unwrap();
        let merged = graph
            .upsert_node("  mimikatz ", ["Software"], props(&[("source", "man_pages"), ("platform", "windows")]))
            .unwrap();

        assert_eq!(graph.node_count(), 1);
        assert_eq!(merged.id, "mimikatz");
        assert_eq!(merged.name, "Mimikatz");
        assert_eq!(
            merged.labels,
            BTreeSet::from(["software".to_string(), "tool".to_string()])
        );
        assert_eq!(merged.source(), Some("man_pages"));
        assert_eq!(merged.properties.len(), 2);
    }

    #[test]
    fn property_index_follows_overwrites() {
        let graph = GraphStore::new();
        graph.upsert_node("a", ["host"], props(&[("os", "linux")])).unwrap();
        graph.upsert_node("a", ["host"], props(&[("os", "windows")])).unwrap();

        assert!(graph.find_by_property("os", &"linux".into()).is_empty());
        let found = graph.find_by_property("os", &"windows".into());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "a");
    }

    #[test]
    fn property_lookup_is_typed() {
        let graph = GraphStore::new();
        let port = |value: PropertyValue| Properties::from([("port".to_string(), value)]);
        graph.upsert_node("https", ["service"], port(PropertyValue::Integer(443))).unwrap();
        graph.upsert_node("alt-https", ["service"], port(PropertyValue::from("443"))).unwrap();

        let ids = |value: PropertyValue| -> Vec<String> {
            graph.find_by_property("port", &value).into_iter().map(|n| n.id).collect()
        };
        assert_eq!(ids(PropertyValue::Integer(443)), vec!["https"]);
        assert_eq!(ids(PropertyValue::from("443")), vec!["alt-https"]);
        assert!(ids(PropertyValue::Float(443.0)).is_empty());
    }

    #[test]
    fn batch_bumps_revision_once() {
        let graph = GraphStore::new();
        let before = graph.revision();
        let applied = graph.batch(|batch| {
            batch.upsert_node("mimikatz", ["tool"], Properties::new())?;
            batch.upsert_node("T1003", ["technique"], Properties::new())?;
            batch.upsert_edge("mimikatz", "T1003", "implements", Properties::new())
        });

        assert!(applied.is_ok());
        assert_eq!(graph.revision(), before + 1);
        assert_eq!(graph.edge_count(), 1);

        let rejected = graph.batch(|batch| batch.upsert_node(" ", ["tool"], Properties::new()));
        assert!(rejected.is_err());
        assert_eq!(graph.revision(), before + 1);
    }

    #[test]
    fn empty_identifier_is_rejected() {
        let graph = GraphStore::new();
        assert_eq!(
            graph.upsert_node("  ", ["tool"], Properties::new()).unwrap_err(),
            GraphError::EmptyIdentifier("node")
        );
        assert!(graph.upsert_edge("", "b", "uses", Properties::new()).is_err());
        assert_eq!(graph.node_count(), 0);
    }

    #[test]
    fn upsert_edge_creates_endpoints_and_is_idempotent() {
        let graph = GraphStore::new();
        graph.upsert_edge("APT29", "Mimikatz", "uses", Properties::new()).unwrap();
        let edge = graph
            .upsert_edge("apt29", "mimikatz", "uses", props(&[("source", "mitre_attack")]))
            .unwrap();

        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(edge.source(), Some("mitre_attack"));
        assert_eq!(graph.get("APT29").unwrap().name, "APT29");
        assert!(graph.get("apt29").unwrap().labels.is_empty());
    }

    #[test]
    fn blank_relationship_defaults() {
        let graph = GraphStore::new();
        let edge = graph.upsert_edge("a", "b", " ", Properties::new()).unwrap();
        assert_eq!(edge.relationship, DEFAULT_RELATIONSHIP);
    }

    #[test]
    fn delete_node_cascades_edges() {
        let graph = GraphStore::new();
        graph.upsert_edge("a", "b", "uses", Properties::new()).unwrap();
        graph.upsert_edge("c", "a", "mitigates", Properties::new()).unwrap();
        graph.upsert_edge("b", "c", "related_to", Properties::new()).unwrap();
        graph.upsert_edge("a", "a", "self", Properties::new()).unwrap();
        graph.upsert_node("a", ["tool"], Properties::new()).unwrap();

        assert!(graph.delete_node("A"));
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
        assert!(graph.find_by_label("tool").is_empty());
        let (out_b, in_b) = graph.neighbours("b");
        assert_eq!(out_b.len(), 1);
        assert!(in_b.is_empty());
    }

    #[test]
    fn delete_missing_node_is_noop() {
        let graph = GraphStore::new();
        graph.upsert_edge("a", "b", "uses", Properties::new()).unwrap();
        let revision = graph.revision();
        assert!(!graph.delete_node("x"));
        assert_eq!(graph.revision(), revision);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn search_ranks_exact_before_partial() {
        let graph = GraphStore::new();
        graph.upsert_node("man_page_nmap", ["document"], Properties::new()).unwrap();
        graph.upsert_node("nmap", ["tool"], Properties::new()).unwrap();
        graph
            .upsert_node("zenmap", ["tool"], props(&[("description", "GUI for nmap")]))
            .unwrap();
        graph.upsert_node("netcat", ["tool"], Properties::new()).unwrap();

        let ids: Vec<String> = graph.search("NMAP").into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec!["nmap", "man_page_nmap", "zenmap"]);

        let by_label: Vec<String> = graph.search("tool").into_iter().map(|n| n.id).collect();
        assert_eq!(by_label, vec!["netcat", "nmap", "zenmap"]);

        assert!(graph.search("  ").is_empty());
    }

    #[test]
    fn listing_preserves_insertion_order() {
        let graph = GraphStore::new();
        graph.upsert_edge("z", "y", "r1", Properties::new()).unwrap();
        graph.upsert_edge("a", "z", "r2", Properties::new()).unwrap();
        let ids: Vec<String> = graph.nodes().into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec!["z", "y", "a"]);
        let rels: Vec<String> = graph.edges().into_iter().map(|e| e.relationship).collect();
        assert_eq!(rels, vec!["r1", "r2"]);
    }

    #[test]
    fn restore_rebuilds_indices() {
        let graph = GraphStore::new();
        graph.upsert_node("T1003", ["technique"], props(&[("source", "mitre_attack")])).unwrap();
        graph.upsert_edge("mimikatz", "T1003", "implements", Properties::new()).unwrap();

        let restored = GraphStore::restore(graph.nodes(), graph.edges());
        assert_eq!(restored.nodes(), graph.nodes());
        assert_eq!(restored.edges(), graph.edges());
        assert_eq!(restored.find_by_label("technique").len(), 1);
        assert_eq!(
            restored.find_by_property("source", &"mitre_attack".into())[0].id,
            "t1003"
        );
    }
}
