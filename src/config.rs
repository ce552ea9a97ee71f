use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::knowledge::cache::CacheConfig;
use crate::knowledge::engine::ContextOptions;
use crate::knowledge::extract;
use crate::knowledge::sources::{KnowledgeSource, SourceSpec};

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct CakeConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub retrieval: RetrievalConfig,
    pub cache: CacheSettings,
    pub sources: SourcesConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub transport: String,
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub snapshot_path: String,
    /// Save the graph back to `snapshot_path` when the server shuts down.
    pub autosave: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub max_depth: usize,
    pub max_nodes: usize,
    pub max_length: usize,
    /// Entity types to recognize. Empty means all.
    pub entity_types: Vec<String>,
    pub max_seeds_per_term: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CacheSettings {
    pub max_entries: usize,
    pub max_bytes: Option<usize>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct SourcesConfig {
    /// Load the built-in framework sample at startup.
    pub builtin_framework: bool,
    pub files: Vec<SourceSpec>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: "stdio".into(),
            host: "127.0.0.1".into(),
            port: 8765,
            log_level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let snapshot_path = default_cake_dir()
            .join("graph.json")
            .to_string_lossy()
            .into_owned();
        Self {
            snapshot_path,
            autosave: true,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        let defaults = ContextOptions::default();
        Self {
            max_depth: defaults.max_depth,
            max_nodes: defaults.max_nodes,
            max_length: defaults.max_length,
            entity_types: Vec::new(),
            max_seeds_per_term: 3,
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        let defaults = CacheConfig::default();
        Self {
            max_entries: defaults.max_entries,
            max_bytes: defaults.max_bytes,
        }
    }
}

impl RetrievalConfig {
    /// Per-call defaults for the engine. Unknown entity type names are logged
    /// and ignored.
    pub fn default_options(&self) -> ContextOptions {
        let entity_types = if self.entity_types.is_empty() {
            None
        } else {
            Some(extract::known_types(&self.entity_types))
        };

        ContextOptions {
            max_depth: self.max_depth,
            max_nodes: self.max_nodes,
            max_length: self.max_length,
            entity_types,
            node_labels: None,
            relationships: None,
        }
    }
}

impl From<&CacheSettings> for CacheConfig {
    fn from(settings: &CacheSettings) -> Self {
        CacheConfig {
            max_entries: settings.max_entries,
            max_bytes: settings.max_bytes,
        }
    }
}

impl SourcesConfig {
    /// Configured sources in load order: the framework sample first, then files.
    pub fn knowledge_sources(&self) -> Vec<KnowledgeSource> {
        let mut sources = Vec::new();
        if self.builtin_framework {
            sources.push(KnowledgeSource::Framework);
        }
        sources.extend(self.files.iter().map(SourceSpec::to_source));
        sources
    }
}

/// Returns `~/.cake/`
pub fn default_cake_dir() -> PathBuf {
    dirs::home_dir()
        .expect("home directory must exist")
        .join(".cake")
}

/// Returns the default config file path: `~/.cake/config.toml`
pub fn default_config_path() -> PathBuf {
    default_cake_dir().join("config.toml")
}

impl CakeConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            CakeConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (CAKE_SNAPSHOT, CAKE_LOG_LEVEL,
    /// CAKE_MAX_DEPTH, CAKE_MAX_NODES, CAKE_CACHE_ENTRIES).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("CAKE_SNAPSHOT") {
            self.storage.snapshot_path = val;
        }
        if let Ok(val) = std::env::var("CAKE_LOG_LEVEL") {
            self.server.log_level = val;
        }
        override_number("CAKE_MAX_DEPTH", &mut self.retrieval.max_depth);
        override_number("CAKE_MAX_NODES", &mut self.retrieval.max_nodes);
        override_number("CAKE_CACHE_ENTRIES", &mut self.cache.max_entries);
    }

    /// Resolve the snapshot path, expanding `~` if needed.
    pub fn resolved_snapshot_path(&self) -> PathBuf {
        expand_tilde(&self.storage.snapshot_path)
    }
}

fn override_number(var: &str, target: &mut usize) {
    let Ok(val) = std::env::var(var) else {
        return;
    };
    match val.trim().parse() {
        Ok(n) => *target = n,
        Err(_) => tracing::warn!(var, value = %val, "ignoring non-numeric override"),
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .expect("home directory must exist")
            .join(rest)
    } else {
        PathBuf::from(path)
    }
}
