//! Split Size - Size-Tiered Composite Cache
//!
//! Fans one logical namespace out over several child caches, sending each
//! object to the smallest tier whose size limit admits it.

use std::sync::Arc;

use tracing::trace;

use super::metrics::{CacheCounters, CounterSnapshot};
use super::object::Object;
use super::traits::{fill_on_miss, Cache, Filler};
use crate::error::Result;

/// One tier of a [`SplitSize`]: a child cache and the largest object it
/// accepts (0 = unbounded).
#[derive(Clone)]
pub struct SplitSizeChild {
    /// Largest payload routed to this tier (0 = unbounded)
    pub max_size: u64,
    /// The tier's cache
    pub cache: Arc<dyn Cache>,
}

impl SplitSizeChild {
    /// Create a tier
    pub fn new(max_size: u64, cache: Arc<dyn Cache>) -> Self {
        Self { max_size, cache }
    }

    /// True if this tier accepts a payload of `size` bytes
    #[inline]
    pub fn admits(&self, size: u64) -> bool {
        self.max_size == 0 || size <= self.max_size
    }

    /// Sort key placing the unbounded tier last
    fn order(&self) -> (bool, u64) {
        (self.max_size == 0, self.max_size)
    }
}

impl std::fmt::Debug for SplitSizeChild {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SplitSizeChild")
            .field("max_size", &self.max_size)
            .finish_non_exhaustive()
    }
}

/// Composite cache routing objects to child caches by payload size.
///
/// Adding a tier never moves objects already stored in other tiers.
#[derive(Default)]
pub struct SplitSize {
    children: Vec<SplitSizeChild>,
    counters: CacheCounters,
}

impl SplitSize {
    /// Create a composite from the given tiers, sorted by size limit
    pub fn new(children: impl IntoIterator<Item = SplitSizeChild>) -> Self {
        let mut split = Self {
            children: children.into_iter().collect(),
            counters: CacheCounters::new(),
        };
        split.sort();
        split
    }

    fn sort(&mut self) {
        self.children.sort_by_key(SplitSizeChild::order);
    }

    /// Add a tier. Objects already stored elsewhere are not rebalanced.
    pub fn add_child_cache(&mut self, max_size: u64, cache: Arc<dyn Cache>) {
        self.children.push(SplitSizeChild::new(max_size, cache));
        self.sort();
    }

    /// Builder form of [`SplitSize::add_child_cache`]
    pub fn with_child(mut self, max_size: u64, cache: Arc<dyn Cache>) -> Self {
        self.add_child_cache(max_size, cache);
        self
    }

    /// Tiers in routing order
    pub fn children(&self) -> &[SplitSizeChild] {
        &self.children
    }

    /// Number of tiers
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// True if there are no tiers
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// The tier that would receive an object of `size` bytes
    pub fn tier_for(&self, size: u64) -> Option<&SplitSizeChild> {
        self.children.iter().find(|child| child.admits(size))
    }

    /// Composite-level counters
    pub fn stats(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }
}

impl Cache for SplitSize {
    fn get(&self, key: &str, filler: Option<&dyn Filler>) -> Result<Object> {
        for child in &self.children {
            if let Ok(object) = child.cache.get(key, None) {
                self.counters.record_hit();
                return Ok(object);
            }
        }

        self.counters.record_miss();
        fill_on_miss(self, key, filler)
    }

    fn set(&self, key: &str, object: Object) -> Result<()> {
        let size = object.size();
        match self.tier_for(size) {
            Some(child) => {
                child.cache.set(key, object)?;
                self.counters.record_write();
                Ok(())
            }
            None => {
                // No tier is large enough.
                trace!(key, size, "no tier admits object, write dropped");
                Ok(())
            }
        }
    }

    fn del(&self, key: &str) {
        self.counters.record_delete();
        for child in &self.children {
            child.cache.del(key);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
