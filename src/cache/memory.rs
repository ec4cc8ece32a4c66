//! Memory Cache - Bounded In-Process Store
//!
//! A single `HashMap` guarded by one reader/writer lock, with byte accounting
//! over payload lengths.
//!
//! # Design
//!
//! - Total memory budget and per-object ceiling (0 = unlimited)
//! - Oversized writes evict the key instead of failing
//! - Full-flush eviction by default; least-recently-used eviction on request
//! - Fills always run outside the lock

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::Deserialize;
use tracing::trace;

use super::metrics::{CacheCounters, CounterSnapshot};
use super::object::Object;
use super::traits::{fill_on_miss, Cache, Filler};
use super::DEFAULT_MEMORY_LIMIT;
use crate::error::Result;

/// How the memory cache makes room when the budget would be exceeded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Discard every entry at once
    #[default]
    FullFlush,
    /// Discard least recently read or written entries until the write fits
    LeastRecentlyUsed,
}

/// Memory cache configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemoryCacheConfig {
    /// Total payload budget in bytes
    pub memory_limit: u64,
    /// Largest payload stored, in bytes (0 = unlimited)
    pub object_limit: u64,
    /// Eviction strategy
    pub eviction: EvictionPolicy,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            memory_limit: DEFAULT_MEMORY_LIMIT,
            object_limit: 0,
            eviction: EvictionPolicy::FullFlush,
        }
    }
}

struct Entry {
    object: Object,
    last_access: AtomicU64,
}

#[derive(Default)]
struct Inner {
    objects: HashMap<String, Entry>,
    usage: u64,
}

impl Inner {
    fn flush(&mut self) -> u64 {
        let evicted = self.objects.len() as u64;
        self.objects.clear();
        self.usage = 0;
        evicted
    }

    fn remove(&mut self, key: &str) -> Option<Entry> {
        let entry = self.objects.remove(key)?;
        self.usage -= entry.object.size();
        Some(entry)
    }

    /// Remove oldest entries until `incoming` more bytes fit in `limit`.
    fn evict_lru(&mut self, incoming: u64, limit: u64) -> u64 {
        let mut candidates: Vec<(u64, String)> = self
            .objects
            .iter()
            .map(|(key, entry)| (entry.last_access.load(Ordering::Relaxed), key.clone()))
            .collect();
        candidates.sort_unstable();

        let mut evicted = 0;
        for (_, key) in candidates {
            if self.usage + incoming <= limit {
                break;
            }
            if self.remove(&key).is_some() {
                evicted += 1;
            }
        }
        evicted
    }
}

/// Memory cache - bounded in-process object store
pub struct MemoryCache {
    inner: RwLock<Inner>,
    config: MemoryCacheConfig,
    /// Logical clock for recency ordering
    clock: AtomicU64,
    counters: CacheCounters,
}

impl MemoryCache {
    /// Create a memory cache with the given total budget and per-object
    /// ceiling (0 for no ceiling).
    pub fn new(memory_limit: u64, object_limit: u64) -> Self {
        Self::with_config(MemoryCacheConfig {
            memory_limit,
            object_limit,
            ..Default::default()
        })
    }

    /// Create a memory cache with custom configuration
    pub fn with_config(config: MemoryCacheConfig) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            config,
            clock: AtomicU64::new(0),
            counters: CacheCounters::new(),
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    fn exceeds_object_limit(&self, size: u64) -> bool {
        self.config.object_limit != 0 && size > self.config.object_limit
    }

    /// Make room for `incoming` bytes. Caller holds the write lock.
    fn trim(&self, inner: &mut Inner, incoming: u64) {
        let evicted = match self.config.eviction {
            EvictionPolicy::FullFlush => inner.flush(),
            EvictionPolicy::LeastRecentlyUsed => {
                inner.evict_lru(incoming, self.config.memory_limit)
            }
        };
        trace!(
            evicted,
            usage = inner.usage,
            policy = ?self.config.eviction,
            "memory cache trimmed"
        );
        self.counters.record_evictions(evicted);
    }

    /// Bytes currently accounted as stored
    pub fn usage(&self) -> u64 {
        self.inner.read().usage
    }

    /// Re-derive stored bytes from the map itself
    pub fn stored_bytes(&self) -> u64 {
        self.inner
            .read()
            .objects
            .values()
            .map(|entry| entry.object.size())
            .sum()
    }

    /// Number of stored objects
    pub fn len(&self) -> usize {
        self.inner.read().objects.len()
    }

    /// True if nothing is stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Check whether a key is stored without touching recency or counters
    pub fn contains(&self, key: &str) -> bool {
        self.inner.read().objects.contains_key(key)
    }

    /// Total memory budget
    pub fn memory_limit(&self) -> u64 {
        self.config.memory_limit
    }

    /// Per-object ceiling (0 = unlimited)
    pub fn object_limit(&self) -> u64 {
        self.config.object_limit
    }

    /// Get configuration
    pub fn config(&self) -> &MemoryCacheConfig {
        &self.config
    }

    /// Get cache statistics
    pub fn stats(&self) -> MemoryStats {
        let inner = self.inner.read();
        MemoryStats {
            entries: inner.objects.len(),
            usage: inner.usage,
            memory_limit: self.config.memory_limit,
            counters: self.counters.snapshot(),
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::with_config(MemoryCacheConfig::default())
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str, filler: Option<&dyn Filler>) -> Result<Object> {
        {
            let inner = self.inner.read();
            if let Some(entry) = inner.objects.get(key) {
                entry.last_access.store(self.tick(), Ordering::Relaxed);
                self.counters.record_hit();
                return Ok(entry.object.clone());
            }
        }

        self.counters.record_miss();
        fill_on_miss(self, key, filler)
    }

    fn set(&self, key: &str, object: Object) -> Result<()> {
        let size = object.size();
        let mut inner = self.inner.write();

        if self.exceeds_object_limit(size) {
            // Too large for this cache; drop any smaller predecessor too.
            inner.remove(key);
            trace!(key, size, limit = self.config.object_limit, "object over size limit");
            return Ok(());
        }

        let existing = inner.objects.get(key).map_or(0, |entry| entry.object.size());
        if inner.usage - existing + size > self.config.memory_limit {
            // The replaced entry never counts against the incoming write.
            inner.remove(key);
            self.trim(&mut inner, size);
        }

        let entry = Entry {
            object,
            last_access: AtomicU64::new(self.tick()),
        };
        if let Some(old) = inner.objects.insert(key.to_string(), entry) {
            inner.usage -= old.object.size();
        }
        inner.usage += size;
        self.counters.record_write();

        Ok(())
    }

    fn del(&self, key: &str) {
        self.counters.record_delete();
        let mut inner = self.inner.write();

        match key.strip_suffix('*') {
            Some("") => {
                inner.flush();
            }
            Some(prefix) => {
                let mut freed = 0;
                inner.objects.retain(|k, entry| {
                    if k.starts_with(prefix) {
                        freed += entry.object.size();
                        false
                    } else {
                        true
                    }
                });
                inner.usage -= freed;
            }
            None => {
                inner.remove(key);
            }
        }
    }
}

/// Memory cache statistics
#[derive(Debug, Clone)]
pub struct MemoryStats {
    /// Number of stored objects
    pub entries: usize,
    /// Bytes stored
    pub usage: u64,
    /// Budget in bytes
    pub memory_limit: u64,
    /// Operation counters
    pub counters: CounterSnapshot,
}

impl MemoryStats {
    /// Utilization (0.0 - 1.0)
    pub fn utilization(&self) -> f64 {
        if self.memory_limit == 0 {
            0.0
        } else {
            self.usage as f64 / self.memory_limit as f64
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
