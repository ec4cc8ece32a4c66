//! Dual-Representation Compression
//!
//! Stores a payload both raw and gzip-compressed through any [`Cache`], so a
//! single fill serves lookups of either key.
//!
//! # Example
//!
//! ```
//! use objcache::cache::{compress_and_set, decompress_gzip, Cache, MemoryCache};
//!
//! let cache = MemoryCache::new(1024 * 1024, 0);
//! let data = b"Hello, this is test data that should compress well!";
//! compress_and_set(&cache, "index.html", data.to_vec(), chrono::Utc::now()).unwrap();
//!
//! let raw = cache.get("index.html", None).unwrap();
//! let gz = cache.get("index.html.gz", None).unwrap();
//! assert_eq!(raw.data().as_ref(), data);
//! assert_eq!(decompress_gzip(gz.data()).unwrap().as_ref(), data);
//! ```

use std::io::{Read, Write};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use super::object::Object;
use super::traits::Cache;
use crate::error::{Error, Result};

/// Key suffix marking the gzip representation
pub const GZIP_SUFFIX: &str = ".gz";

// =============================================================================
// Compressor Trait
// =============================================================================

/// Trait for compression implementations
pub trait Compressor: Send + Sync {
    /// Algorithm name used in errors and logs
    fn name(&self) -> &'static str;

    /// Key suffix for the compressed representation
    fn suffix(&self) -> &'static str;

    /// Compress data
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Decompress data
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;
}

// =============================================================================
// Gzip Compressor
// =============================================================================

/// Gzip compressor
#[derive(Debug, Clone, Copy)]
pub struct GzipCompressor {
    level: u32,
}

impl GzipCompressor {
    /// Maximum-ratio compression
    pub fn best() -> Self {
        Self {
            level: Compression::best().level(),
        }
    }

    /// Create with custom compression level (0-9)
    pub fn with_level(level: u32) -> Self {
        Self { level: level.min(9) }
    }

    /// Configured level
    pub fn level(&self) -> u32 {
        self.level
    }
}

impl Default for GzipCompressor {
    fn default() -> Self {
        Self::best()
    }
}

impl Compressor for GzipCompressor {
    fn name(&self) -> &'static str {
        "gzip"
    }

    fn suffix(&self) -> &'static str {
        GZIP_SUFFIX
    }

    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let failed = |e: std::io::Error| Error::CompressionFailed {
            algorithm: self.name().into(),
            reason: e.to_string(),
        };

        let mut encoder = GzEncoder::new(Vec::new(), Compression::new(self.level));
        encoder.write_all(data).map_err(failed)?;
        encoder.finish().map_err(failed)
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        GzDecoder::new(data)
            .read_to_end(&mut out)
            .map_err(|e| Error::DecompressionFailed {
                algorithm: self.name().into(),
                reason: e.to_string(),
            })?;
        Ok(out)
    }
}

/// Decompress a gzip payload
pub fn decompress_gzip(data: &[u8]) -> Result<Bytes> {
    GzipCompressor::best().decompress(data).map(Bytes::from)
}

// =============================================================================
// Dual Representation
// =============================================================================

/// Derive `(uncompressed, compressed)` keys for `key` and a suffix.
pub fn representation_keys_with(key: &str, suffix: &str) -> (String, String) {
    match key.strip_suffix(suffix) {
        Some(stripped) => (stripped.to_string(), key.to_string()),
        None => (key.to_string(), format!("{}{}", key, suffix)),
    }
}

/// Derive `(uncompressed, compressed)` keys using [`GZIP_SUFFIX`].
pub fn representation_keys(key: &str) -> (String, String) {
    representation_keys_with(key, GZIP_SUFFIX)
}

/// Both stored representations of one payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Representations {
    /// Key holding the raw payload
    pub uncompressed_key: String,
    /// Raw payload
    pub uncompressed: Object,
    /// Key holding the compressed payload
    pub compressed_key: String,
    /// Compressed payload
    pub compressed: Object,
}

impl Representations {
    /// The representation stored under `key`; the raw one for any other key.
    pub fn select(&self, key: &str) -> &Object {
        if key == self.compressed_key {
            &self.compressed
        } else {
            &self.uncompressed
        }
    }

    /// Owned form of [`Representations::select`]
    pub fn into_selected(self, key: &str) -> Object {
        if key == self.compressed_key {
            self.compressed
        } else {
            self.uncompressed
        }
    }
}

/// Store `data` raw and gzip-compressed, returning both objects.
///
/// If `key` already ends in `.gz` the raw form goes under the stripped key,
/// otherwise the compressed form goes under `key + ".gz"`. The compressed
/// object is written first; both share `mod_time`.
pub fn compress_and_set(
    cache: &dyn Cache,
    key: &str,
    data: impl Into<Bytes>,
    mod_time: DateTime<Utc>,
) -> Result<Representations> {
    compress_and_set_with(cache, &GzipCompressor::best(), key, data, mod_time)
}

/// [`compress_and_set`] with an explicit compressor
pub fn compress_and_set_with(
    cache: &dyn Cache,
    compressor: &dyn Compressor,
    key: &str,
    data: impl Into<Bytes>,
    mod_time: DateTime<Utc>,
) -> Result<Representations> {
    let data = data.into();
    let (uncompressed_key, compressed_key) = representation_keys_with(key, compressor.suffix());

    let compressed = Object::new(compressor.compress(&data)?, mod_time);
    cache.set(&compressed_key, compressed.clone())?;

    let uncompressed = Object::new(data, mod_time);
    cache.set(&uncompressed_key, uncompressed.clone())?;

    Ok(Representations {
        uncompressed_key,
        uncompressed,
        compressed_key,
        compressed,
    })
}
