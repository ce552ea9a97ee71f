//! Bounded breadth-first expansion from seed nodes.

use serde::Serialize;
use std::collections::HashSet;

use super::graph::GraphStore;
use super::types::{normalize_id, Edge, EdgeKey, Node};

/// Nodes and edges discovered by [`GraphStore::expand`], in discovery order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Subgraph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    /// `true` if the node budget stopped expansion early.
    pub truncated: bool,
    /// Number of levels actually expanded.
    pub depth_reached: usize,
}

impl Subgraph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

impl GraphStore {
    /// Breadth-first expansion from `seed_ids`.
    ///
    /// Stops after `max_depth` levels or once `max_nodes` nodes are collected.
    /// The budget is checked before each new node is admitted: when it runs out
    /// mid-level, the part of that level already collected is kept and no further
    /// levels are processed. Each frontier node contributes its outgoing edges then
    /// its incoming edges, both in insertion order, so identical inputs give
    /// identical (and identically truncated) results.
    ///
    /// Unknown seed ids are ignored. The whole expansion runs under one read lock.
    pub fn expand<S: AsRef<str>>(&self, seed_ids: &[S], max_depth: usize, max_nodes: usize) -> Subgraph {
        let inner = self.inner.read();

        let mut visited: HashSet<String> = HashSet::new();
        let mut order: Vec<String> = Vec::new();
        let mut truncated = false;

        for seed in seed_ids {
            let id = normalize_id(seed.as_ref());
            if !inner.nodes.contains_key(&id) || visited.contains(&id) {
                continue;
            }
            if visited.len() >= max_nodes {
                truncated = true;
                break;
            }
            visited.insert(id.clone());
            order.push(id);
        }

        let mut edge_seen: HashSet<EdgeKey> = HashSet::new();
        let mut edge_order: Vec<EdgeKey> = Vec::new();
        let mut frontier: Vec<String> = order.clone();
        let mut depth_reached = 0;

        while depth_reached < max_depth && !frontier.is_empty() && !truncated {
            let mut next = Vec::new();

            for id in &frontier {
                let outgoing = inner.outgoing.get(id).into_iter().flatten();
                let incoming = inner.incoming.get(id).into_iter().flatten();

                for key in outgoing.chain(incoming) {
                    let neighbour = if &key.from_id == id {
                        &key.to_id
                    } else {
                        &key.from_id
                    };

                    if !visited.contains(neighbour) {
                        if visited.len() >= max_nodes {
                            truncated = true;
                            continue;
                        }
                        visited.insert(neighbour.clone());
                        order.push(neighbour.clone());
                        next.push(neighbour.clone());
                    }

                    if edge_seen.insert(key.clone()) {
                        edge_order.push(key.clone());
                    }
                }
            }

            depth_reached += 1;
            frontier = next;
        }

        if truncated {
            tracing::debug!(
                max_nodes,
                depth_reached,
                "traversal stopped at node budget"
            );
        }

        Subgraph {
            nodes: order
                .iter()
                .map(|id| inner.nodes[id].node.clone())
                .collect(),
            edges: edge_order.iter().map(|key| inner.edge(key).clone()).collect(),
            truncated,
            depth_reached,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::types::Properties;

    fn graph(edges: &[(&str, &str, &str)]) -> GraphStore {
        let g = GraphStore::new();
        for (from, rel, to) in edges {
            g.upsert_edge(from, to, rel, Properties::new()).unwrap();
        }
        g
    }

    fn ids(sub: &Subgraph) -> Vec<&str> {
        sub.nodes.iter().map(|n| n.id.as_str()).collect()
    }

    #[test]
    fn cycle_terminates_with_each_node_once() {
        let g = graph(&[("a", "r", "b"), ("b", "r", "c"), ("c", "r", "a")]);
        let sub = g.expand(&["a"], 5, 100);
        assert_eq!(ids(&sub), vec!["a", "b", "c"]);
        assert_eq!(sub.edges.len(), 3);
        assert!(!sub.truncated);
    }

    #[test]
    fn depth_limits_hops() {
        let g = graph(&[("a", "r", "b"), ("b", "r", "c"), ("c", "r", "d")]);
        assert_eq!(ids(&g.expand(&["a"], 0, 100)), vec!["a"]);
        assert_eq!(ids(&g.expand(&["a"], 1, 100)), vec!["a", "b"]);
        assert_eq!(ids(&g.expand(&["a"], 2, 100)), vec!["a", "b", "c"]);
    }

    #[test]
    fn incoming_edges_are_followed() {
        let g = graph(&[("apt29", "uses", "mimikatz")]);
        let sub = g.expand(&["mimikatz"], 1, 10);
        assert_eq!(ids(&sub), vec!["mimikatz", "apt29"]);
        assert_eq!(sub.edges[0].relationship, "uses");
    }

    #[test]
    fn node_budget_truncates_mid_level_deterministically() {
        let g = graph(&[
            ("hub", "r", "n1"),
            ("hub", "r", "n2"),
            ("hub", "r", "n3"),
            ("n1", "r", "deep"),
        ]);
        let first = g.expand(&["hub"], 3, 3);
        assert_eq!(ids(&first), vec!["hub", "n1", "n2"]);
        assert!(first.truncated);
        assert_eq!(first.depth_reached, 1);
        assert_eq!(first.edges.len(), 2);

        for _ in 0..5 {
            assert_eq!(ids(&g.expand(&["hub"], 3, 3)), ids(&first));
        }
    }

    #[test]
    fn never_exceeds_budget() {
        let g = GraphStore::new();
        for i in 0..50 {
            g.upsert_edge(&format!("n{i}"), &format!("n{}", i + 1), "next", Properties::new())
                .unwrap();
            g.upsert_edge(&format!("n{i}"), "hub", "member_of", Properties::new())
                .unwrap();
        }
        for budget in [0, 1, 2, 7, 20] {
            for depth in 0..4 {
                let sub = g.expand(&["n0", "n10"], depth, budget);
                assert!(sub.nodes.len() <= budget);
                for edge in &sub.edges {
                    assert!(sub.nodes.iter().any(|n| n.id == edge.from_id));
                    assert!(sub.nodes.iter().any(|n| n.id == edge.to_id));
                }
            }
        }
    }

    #[test]
    fn seeds_are_normalized_and_unknown_ones_ignored() {
        let g = graph(&[("Nmap", "documented_in", "man_page_nmap")]);
        let sub = g.expand(&["NMAP", "missing"], 1, 10);
        assert_eq!(ids(&sub), vec!["nmap", "man_page_nmap"]);
    }

    #[test]
    fn empty_seeds_yield_empty_subgraph() {
        let g = graph(&[("a", "r", "b")]);
        let none: [&str; 0] = [];
        assert!(g.expand(&none, 3, 10).is_empty());
    }

    #[test]
    fn self_loop_reported_once() {
        let g = graph(&[("a", "r", "a")]);
        let sub = g.expand(&["a"], 2, 10);
        assert_eq!(ids(&sub), vec!["a"]);
        assert_eq!(sub.edges.len(), 1);
    }
}
