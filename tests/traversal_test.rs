use cake::knowledge::graph::GraphStore;
use cake::knowledge::types::Properties;

fn graph(edges: &[(&str, &str)]) -> GraphStore {
    let graph = GraphStore::new();
    for (from, to) in edges {
        graph.upsert_edge(from, to, "links_to", Properties::new()).unwrap();
    }
    graph
}

fn ids(graph: &GraphStore, seed: &str, depth: usize, nodes: usize) -> Vec<String> {
    let mut ids: Vec<String> = graph
        .expand(&[seed], depth, nodes)
        .nodes
        .into_iter()
        .map(|n| n.id)
        .collect();
    ids.sort();
    ids
}

#[test]
fn cycle_terminates_with_every_member() {
    let graph = graph(&[("a", "b"), ("b", "c"), ("c", "a")]);
    assert_eq!(ids(&graph, "a", 3, 100), vec!["a", "b", "c"]);
    assert_eq!(graph.expand(&["a"], 3, 100).edges.len(), 3);
}

#[test]
fn bounds_hold_on_a_chain() {
    let chain: Vec<(String, String)> = (0..30).map(|i| (format!("n{i}"), format!("n{}", i + 1))).collect();
    let pairs: Vec<(&str, &str)> = chain.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
    let graph = graph(&pairs);

    for depth in 0..6 {
        for max_nodes in 1..8 {
            let sub = graph.expand(&["n10"], depth, max_nodes);
            assert!(sub.nodes.len() <= max_nodes);
            for node in &sub.nodes {
                let n: i64 = node.id[1..].parse().unwrap();
                assert!((n - 10).unsigned_abs() as usize <= depth);
            }
        }
    }
}

#[test]
fn unknown_seed_gives_empty_subgraph() {
    let graph = graph(&[("a", "b")]);
    assert!(graph.expand(&["zzz"], 2, 10).is_empty());
}
