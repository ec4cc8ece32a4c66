//! objcache - Pluggable Object Cache
//!
//! Byte-payload caches keyed by slash-delimited paths, with a uniform
//! fill-on-miss protocol: a lookup that misses hands the key to a
//! caller-supplied [`Filler`], which may populate the cache before returning
//! the object.
//!
//! # Architecture
//!
//! ```text
//! caller ──get/set/del──▶ dyn Cache ──miss──▶ Filler ──set──▶ dyn Cache
//!                           │
//!            ┌──────────────┼──────────────┐
//!        MemoryCache    DiskCache      SplitSize ──▶ child caches by size
//! ```
//!
//! # Features
//!
//! - Bounded memory cache with per-object ceiling and full-flush or LRU eviction
//! - Disk cache with a best-effort existence index and glob deletes
//! - Size-tiered composite that nests arbitrarily
//! - Raw + gzip dual representation through any cache
//! - YAML layout configuration
//!
//! # Modules
//!
//! - [`cache`] - Cache contract and backends
//! - [`config`] - Layout configuration
//! - [`error`] - Error types

pub mod cache;
pub mod config;
pub mod error;

// Re-export commonly used types
pub use cache::{
    compress_and_set, Cache, DiskCache, Filler, MemoryCache, Object, SplitSize, SplitSizeChild,
};
pub use config::CacheLayout;
pub use error::{Error, Result};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
