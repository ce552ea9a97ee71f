#![allow(dead_code)]

use cake::knowledge::cache::CacheConfig;
use cake::knowledge::engine::{ContextEngine, ContextOptions};
use cake::knowledge::graph::GraphStore;
use cake::knowledge::types::Triplet;
use std::sync::Arc;

/// A fresh engine over an empty graph with default options.
pub fn test_engine() -> ContextEngine {
    engine_with_cache(CacheConfig::default())
}

pub fn engine_with_cache(cache: CacheConfig) -> ContextEngine {
    ContextEngine::new(Arc::new(GraphStore::new()), cache, ContextOptions::default())
}

/// Options with the given traversal bounds and default everything else.
pub fn options(max_depth: usize, max_nodes: usize) -> ContextOptions {
    ContextOptions {
        max_depth,
        max_nodes,
        ..ContextOptions::default()
    }
}

/// A small security knowledge base: tools, techniques, a host, and a group.
pub fn security_triplets() -> Vec<Triplet> {
    vec![
        Triplet::new("nmap", "documented_in", "man_page_nmap")
            .with_subject_label("tool")
            .with_object_label("document")
            .with_property("source", "man_pages"),
        Triplet::new("nmap", "implements", "T1046")
            .with_subject_label("tool")
            .with_object_label("technique")
            .with_property("source", "mitre_attack"),
        Triplet::new("mimikatz", "implements", "T1003.001")
            .with_subject_label("tool")
            .with_object_label("technique")
            .with_property("source", "mitre_attack"),
        Triplet::new("APT29", "uses", "mimikatz")
            .with_subject_label("group")
            .with_property("source", "mitre_attack"),
        Triplet::new("192.168.1.100", "hosts", "web server")
            .with_object_label("asset")
            .with_object_property("os", "linux"),
    ]
}

/// An engine preloaded with [`security_triplets`].
pub fn security_engine() -> ContextEngine {
    let engine = test_engine();
    engine.bulk_load(security_triplets());
    engine
}
