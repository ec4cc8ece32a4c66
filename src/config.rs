//! Cache Layout Configuration
//!
//! A recursive, serde-deserializable description of a cache layout that
//! builds into a shared `dyn Cache`.
//!
//! # Example
//!
//! ```
//! use objcache::config::CacheLayout;
//!
//! let layout = CacheLayout::from_yaml_str(r#"
//! type: split
//! tiers:
//!   - max_size: 1024
//!     cache: { type: memory, memory_limit: 1048576 }
//!   - max_size: 65536
//!     cache: { type: memory, memory_limit: 16777216, eviction: least_recently_used }
//! "#).unwrap();
//!
//! let _cache = layout.build().unwrap();
//! ```

use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::cache::{
    Cache, DiskCache, DiskCacheConfig, MemoryCache, MemoryCacheConfig, SplitSize, SplitSizeChild,
};
use crate::error::{Error, Result};

/// Description of one cache, possibly a composite of others
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CacheLayout {
    /// In-process memory cache
    Memory(MemoryCacheConfig),
    /// Filesystem cache
    Disk(DiskCacheConfig),
    /// Size-tiered composite
    Split {
        /// Child tiers, in any order
        tiers: Vec<TierLayout>,
    },
}

/// One tier of a split layout
#[derive(Debug, Clone, Deserialize)]
pub struct TierLayout {
    /// Largest payload routed to the tier (0 = unbounded)
    #[serde(default)]
    pub max_size: u64,
    /// The tier's cache
    pub cache: CacheLayout,
}

impl CacheLayout {
    /// Parse a layout from YAML
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let layout: Self = serde_yaml::from_str(yaml)
            .map_err(|e| Error::Config(format!("invalid cache layout: {}", e)))?;
        layout.validate()?;
        Ok(layout)
    }

    /// Load a layout from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_yaml_str(&yaml)
    }

    /// Check structural constraints
    pub fn validate(&self) -> Result<()> {
        match self {
            CacheLayout::Memory(config) => {
                if config.memory_limit == 0 {
                    return Err(Error::Config("memory_limit must be non-zero".into()));
                }
                Ok(())
            }
            CacheLayout::Disk(config) => {
                if config.base_dir.as_os_str().is_empty() {
                    return Err(Error::Config("base_dir must be set".into()));
                }
                Ok(())
            }
            CacheLayout::Split { tiers } => {
                let unbounded = tiers.iter().filter(|t| t.max_size == 0).count();
                if unbounded > 1 {
                    return Err(Error::Config(format!(
                        "split layout has {} unbounded tiers, at most one is allowed",
                        unbounded
                    )));
                }
                tiers.iter().try_for_each(|tier| tier.cache.validate())
            }
        }
    }

    /// Construct the described cache
    pub fn build(&self) -> Result<Arc<dyn Cache>> {
        let cache: Arc<dyn Cache> = match self {
            CacheLayout::Memory(config) => {
                debug!(
                    memory_limit = config.memory_limit,
                    object_limit = config.object_limit,
                    "building memory cache"
                );
                Arc::new(MemoryCache::with_config(config.clone()))
            }
            CacheLayout::Disk(config) => {
                debug!(base_dir = %config.base_dir.display(), "building disk cache");
                Arc::new(DiskCache::with_config(config.clone())?)
            }
            CacheLayout::Split { tiers } => {
                let children = tiers
                    .iter()
                    .map(|tier| -> Result<SplitSizeChild> {
                        Ok(SplitSizeChild::new(tier.max_size, tier.cache.build()?))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Arc::new(SplitSize::new(children))
            }
        };
        Ok(cache)
    }
}
