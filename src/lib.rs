//! Context-augmentation knowledge engine: an in-memory knowledge graph that
//! enriches LLM prompts with facts relevant to the query.
//!
//! A query flows through a fixed pipeline:
//!
//! 1. **Extract**: regex recognizers pull typed entities (IP addresses, URLs,
//!    domains, emails, hashes, filenames, ports, CVEs, ATT&CK techniques) out of
//!    the query text, plus plain keywords.
//! 2. **Seed**: entities and keywords are resolved to graph nodes by id, by a
//!    `value` property, or by search.
//! 3. **Expand**: a breadth-first traversal collects the neighbourhood of the
//!    seeds, bounded by depth and node count.
//! 4. **Format**: entities, nodes, and relationships are rendered as a
//!    deterministic, length-bounded text block with source attributions.
//! 5. **Cache**: the result is kept in a bounded LRU keyed by the normalized
//!    query and options, and dropped wholesale whenever the graph changes.
//!
//! | Entity type | Example |
//! |-------------|---------|
//! | `ip_address` | `192.168.1.100` |
//! | `url` | `https://example.com/login` |
//! | `domain` | `example.com` |
//! | `email` | `admin@example.com` |
//! | `hash` | 32, 40, 64, or 128 hex digits |
//! | `filename` | `payload.exe` |
//! | `port` | `port 443`, `10.0.0.1:8080` |
//! | `cve` | `CVE-2021-44228` |
//! | `technique` | `T1059.001` |
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from TOML files and environment variables
//! - [`knowledge`]: Graph store, traversal, extraction, formatting, caching, and the
//!   [`ContextEngine`](knowledge::engine::ContextEngine) that ties them together
//! - [`bootstrap`]: Engine construction from a snapshot and configured sources

pub mod bootstrap;
pub mod config;
pub mod knowledge;
