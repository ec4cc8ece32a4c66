//! Pluggable Object Cache
//!
//! Interchangeable backends behind one [`Cache`] trait, all following the same
//! fill-on-miss protocol.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────────┐
//! │                              dyn Cache                                    │
//! │                  get(key, filler) / set(key, obj) / del(key)              │
//! ├──────────────────────────────────────────────────────────────────────────┤
//! │  MemoryCache          │ DiskCache             │ SplitSize                 │
//! │  ┌────────────────┐   │ ┌────────────────┐    │ ┌──────────────────────┐  │
//! │  │ HashMap+RwLock │   │ │ Files + Index  │   │ │ (max_size, dyn Cache)│  │
//! │  │ byte budget    │   │ │ 0600 / 0700    │    │ │ sorted, 0 = unbounded│  │
//! │  └────────────────┘   │ └────────────────┘    │ └──────────────────────┘  │
//! │         │             │         │             │           │               │
//! │         └─────────────┴─────────┴─────────────┴───────────┘               │
//! │                              │ miss                                       │
//! │                    Filler::fill(Some(cache), key)                         │
//! │                 (optionally compress_and_set → key, key.gz)               │
//! └──────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Concurrency
//!
//! Each backend guards only its own metadata with one reader/writer lock.
//! Fills always run unlocked, so concurrent misses on one key fill
//! independently and the last `set` wins.

mod disk;
mod memory;
mod metrics;
mod object;
#[cfg(test)]
mod proptest;
mod split;
mod traits;
pub mod compression;

pub use compression::{
    compress_and_set, compress_and_set_with, decompress_gzip, representation_keys,
    Compressor, GzipCompressor, Representations, GZIP_SUFFIX,
};
pub use disk::{DiskCache, DiskCacheConfig, DiskStats, DIR_MODE, FILE_MODE};
pub use memory::{EvictionPolicy, MemoryCache, MemoryCacheConfig, MemoryStats};
pub use metrics::{CacheCounters, CounterSnapshot};
pub use object::Object;
pub use split::{SplitSize, SplitSizeChild};
pub use traits::{fill_on_miss, Cache, Filler};

/// Default memory cache budget (64MB)
pub const DEFAULT_MEMORY_LIMIT: u64 = 64 * 1024 * 1024;

// =============================================================================
// Tests
// =============================================================================
