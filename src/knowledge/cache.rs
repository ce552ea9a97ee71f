//! Bounded LRU cache for formatted context.
//!
//! Entries are keyed by the query, with whitespace collapsed but case kept, plus
//! every option that affects the output. Recency is tracked with a monotonically increasing access tick and an
//! ordered `tick → key` index, so the least-recently-accessed entry is always the
//! first one in the index. All state sits behind one `parking_lot::Mutex`, which
//! is independent of the graph lock.
//!
//! Invalidation bumps a generation counter. A caller that computed a value before
//! an invalidation can store it with [`ContextCache::put_if_current`], which
//! drops the value instead of caching stale context.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use super::engine::ContextOptions;
use super::extract::EntityType;

/// Capacity limits.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached entries. Zero disables caching.
    pub max_entries: usize,
    /// Optional cap on the summed size of cached values, in bytes.
    pub max_bytes: Option<usize>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 256,
            max_bytes: None,
        }
    }
}

/// Identity of a cached context: query text plus effective options.
///
/// Case is kept because recognizers such as ATT&CK ids and filenames are case
/// sensitive, so `T1003` and `t1003` can produce different context.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    query: String,
    max_depth: usize,
    max_nodes: usize,
    max_length: usize,
    entity_types: Option<Vec<EntityType>>,
    node_labels: Option<Vec<String>>,
    relationships: Option<Vec<String>>,
}

impl CacheKey {
    pub fn new(query: &str, options: &ContextOptions) -> Self {
        Self {
            query: query.split_whitespace().collect::<Vec<_>>().join(" "),
            max_depth: options.max_depth,
            max_nodes: options.max_nodes,
            max_length: options.max_length,
            entity_types: options
                .entity_types
                .as_ref()
                .map(|types| types.iter().copied().collect()),
            node_labels: options
                .node_labels
                .as_ref()
                .map(|labels| labels.iter().cloned().collect()),
            relationships: options
                .relationships
                .as_ref()
                .map(|rels| rels.iter().cloned().collect()),
        }
    }
}

/// A cached value with its eviction bookkeeping.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub value: String,
    /// Size of `value` in bytes.
    pub size: usize,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    tick: u64,
}

/// Cache counters, as reported by `graph_stats`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub bytes: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub evictions: u64,
    pub invalidations: u64,
}

#[derive(Default)]
struct LruState {
    entries: HashMap<CacheKey, CacheEntry>,
    recency: BTreeMap<u64, CacheKey>,
    total_bytes: usize,
    next_tick: u64,
    generation: u64,
}

impl LruState {
    fn tick(&mut self) -> u64 {
        let tick = self.next_tick;
        self.next_tick += 1;
        tick
    }

    fn remove(&mut self, key: &CacheKey) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        let indexed = self.recency.remove(&entry.tick);
        assert!(
            indexed.as_ref() == Some(key),
            "cache recency index out of sync with entries"
        );
        self.total_bytes -= entry.size;
        Some(entry)
    }
}

pub struct ContextCache {
    config: CacheConfig,
    state: Mutex<LruState>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    invalidations: AtomicU64,
}

impl ContextCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            state: Mutex::new(LruState::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    /// Look up a value, marking it most recently used.
    pub fn get(&self, key: &CacheKey) -> Option<String> {
        let mut state = self.state.lock();
        let tick = state.tick();
        let LruState {
            entries, recency, ..
        } = &mut *state;

        let Some(entry) = entries.get_mut(key) else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };
        recency.remove(&entry.tick);
        recency.insert(tick, key.clone());
        entry.tick = tick;
        entry.last_accessed_at = Utc::now();

        self.hits.fetch_add(1, Ordering::Relaxed);
        Some(entry.value.clone())
    }

    /// Store a value, evicting least-recently-used entries until within budget.
    pub fn put(&self, key: CacheKey, value: String) {
        let mut state = self.state.lock();
        self.insert_locked(&mut state, key, value);
    }

    /// Store a value only if no invalidation happened since `generation` was read.
    /// Returns whether the value was stored.
    pub fn put_if_current(&self, key: CacheKey, value: String, generation: u64) -> bool {
        let mut state = self.state.lock();
        if state.generation != generation {
            tracing::debug!("discarding context computed before cache invalidation");
            return false;
        }
        self.insert_locked(&mut state, key, value)
    }

    /// Current invalidation generation.
    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    /// Drop every entry.
    pub fn invalidate_all(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.recency.clear();
        state.total_bytes = 0;
        state.generation += 1;
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `key` is cached, without touching recency.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.state.lock().entries.contains_key(key)
    }

    /// Snapshot of an entry's bookkeeping, without touching recency.
    pub fn peek(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.state.lock().entries.get(key).cloned()
    }

    pub fn stats(&self) -> CacheStats {
        let (entries, bytes) = {
            let state = self.state.lock();
            (state.entries.len(), state.total_bytes)
        };
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            entries,
            bytes,
            hits,
            misses,
            hit_rate: if total > 0 {
                hits as f64 / total as f64
            } else {
                0.0
            },
            evictions: self.evictions.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
        }
    }

    fn insert_locked(&self, state: &mut LruState, key: CacheKey, value: String) -> bool {
        let size = value.len();
        if self.config.max_entries == 0 || self.config.max_bytes.is_some_and(|max| size > max) {
            return false;
        }

        let now = Utc::now();
        let created_at = state.remove(&key).map(|old| old.created_at).unwrap_or(now);
        let tick = state.tick();
        state.recency.insert(tick, key.clone());
        state.total_bytes += size;
        state.entries.insert(
            key,
            CacheEntry {
                value,
                size,
                created_at,
                last_accessed_at: now,
                tick,
            },
        );

        while state.entries.len() > self.config.max_entries
            || self.config.max_bytes.is_some_and(|max| state.total_bytes > max)
        {
            let Some(oldest) = state.recency.values().next().cloned() else {
                break;
            };
            state.remove(&oldest);
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }

        debug_assert_eq!(state.entries.len(), state.recency.len());
        true
    }
}
