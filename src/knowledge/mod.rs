pub mod cache;
pub mod engine;
pub mod extract;
pub mod format;
pub mod graph;
pub mod snapshot;
pub mod sources;
pub mod stats;
pub mod traverse;
pub mod types;
