//! Disk Cache - Filesystem-Backed Store
//!
//! Keys map one-to-one onto paths below a base directory. An in-memory
//! existence index short-circuits lookups for keys known to be absent.
//!
//! # Design
//!
//! - Directories are created on demand with mode 0700, files written 0600
//! - The index is a hint: negative answers skip disk I/O, positive answers
//!   still require a successful read
//! - Deletes take shell-glob patterns and remove whole subtrees
//! - Only the index is locked; file I/O relies on the filesystem

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use globset::{GlobBuilder, GlobMatcher};
use parking_lot::RwLock;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::metrics::{CacheCounters, CounterSnapshot};
use super::object::Object;
use super::traits::{fill_on_miss, Cache, Filler};
use crate::error::{Error, Result};

/// Permission bits for cache directories
pub const DIR_MODE: u32 = 0o700;

/// Permission bits for cached files
pub const FILE_MODE: u32 = 0o600;

/// Disk cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DiskCacheConfig {
    /// Root directory of the cache
    pub base_dir: PathBuf,
    /// Index files already present under `base_dir` when opening
    #[serde(default = "default_scan_existing")]
    pub scan_existing: bool,
}

fn default_scan_existing() -> bool {
    true
}

impl DiskCacheConfig {
    /// Configuration rooted at `base_dir` with scanning enabled
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            scan_existing: true,
        }
    }
}

/// Disk cache - stores objects as files under a base directory
pub struct DiskCache {
    base_dir: PathBuf,
    /// Existence index (resolved path -> last known size)
    index: RwLock<HashMap<PathBuf, u64>>,
    counters: CacheCounters,
}

impl DiskCache {
    /// Create a disk cache rooted at `base_dir`, creating the directory if
    /// needed. The index starts empty; see [`DiskCache::scan_existing`].
    pub fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        create_dir_all(&base_dir)?;

        Ok(Self {
            base_dir,
            index: RwLock::new(HashMap::new()),
            counters: CacheCounters::new(),
        })
    }

    /// Create a disk cache from configuration, scanning existing files when
    /// configured to.
    pub fn with_config(config: DiskCacheConfig) -> Result<Self> {
        let cache = Self::new(config.base_dir)?;
        if config.scan_existing {
            cache.scan_existing();
        }
        Ok(cache)
    }

    /// Walk the base directory and index every file found.
    ///
    /// Returns the number of files indexed. Entries that cannot be read are
    /// skipped.
    pub fn scan_existing(&self) -> usize {
        let mut found = Vec::new();
        walk_files(&self.base_dir, &mut found);

        let count = found.len();
        let mut index = self.index.write();
        index.extend(found);
        drop(index);

        info!(base_dir = %self.base_dir.display(), files = count, "disk cache scan complete");
        count
    }

    /// Map a key onto a path below the base directory.
    ///
    /// Resolution is lexical: empty and `.` components are ignored and `..`
    /// never climbs above the base directory.
    pub fn resolve(&self, key: &str) -> PathBuf {
        let mut parts: Vec<&str> = Vec::new();
        for part in key.split('/') {
            match part {
                "" | "." => {}
                ".." => {
                    parts.pop();
                }
                part => parts.push(part),
            }
        }

        let mut path = self.base_dir.clone();
        path.extend(parts);
        path
    }

    /// Root directory
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Number of paths in the existence index
    pub fn indexed_len(&self) -> usize {
        self.index.read().len()
    }

    /// Sum of last known sizes in the existence index
    pub fn indexed_bytes(&self) -> u64 {
        self.index.read().values().sum()
    }

    /// True if the index believes the key may be present
    pub fn is_indexed(&self, key: &str) -> bool {
        self.index.read().contains_key(&self.resolve(key))
    }

    /// Get cache statistics
    pub fn stats(&self) -> DiskStats {
        let index = self.index.read();
        DiskStats {
            indexed_files: index.len(),
            indexed_bytes: index.values().sum(),
            counters: self.counters.snapshot(),
        }
    }

    /// Expand a key pattern into existing paths.
    fn expand(&self, key: &str) -> Result<Vec<PathBuf>> {
        let target = self.resolve(key);
        let relative = match target.strip_prefix(&self.base_dir) {
            Ok(relative) => relative.to_path_buf(),
            Err(_) => return Ok(Vec::new()),
        };

        if relative.as_os_str().is_empty() {
            // Pattern collapsed onto the root itself; never remove the root.
            return Ok(Vec::new());
        }

        let pattern = relative.to_string_lossy().replace('\\', "/");
        if !has_glob_meta(&pattern) {
            return Ok(if fs::symlink_metadata(&target).is_ok() {
                vec![target]
            } else {
                Vec::new()
            });
        }

        let matcher = GlobBuilder::new(&pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| Error::Config(format!("invalid pattern {}: {}", key, e)))?
            .compile_matcher();
        let depth = relative.components().count();

        let mut matches = Vec::new();
        glob_walk(&self.base_dir, &self.base_dir, depth, &matcher, &mut matches);
        Ok(matches)
    }
}

impl Cache for DiskCache {
    fn get(&self, key: &str, filler: Option<&dyn Filler>) -> Result<Object> {
        let path = self.resolve(key);

        let indexed = self.index.read().contains_key(&path);
        if !indexed {
            self.counters.record_miss();
            return fill_on_miss(self, key, filler);
        }

        match read_object(&path) {
            Ok(object) => {
                self.counters.record_hit();
                Ok(object)
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "indexed file unreadable, treating as miss");
                if e.kind() == io::ErrorKind::NotFound {
                    self.index.write().remove(&path);
                }
                self.counters.record_miss();
                fill_on_miss(self, key, filler)
            }
        }
    }

    fn set(&self, key: &str, object: Object) -> Result<()> {
        let path = self.resolve(key);
        if path == self.base_dir {
            return Err(Error::io(
                path,
                io::Error::new(io::ErrorKind::InvalidInput, "key resolves to the cache root"),
            ));
        }

        if let Some(parent) = path.parent() {
            create_dir_all(parent)?;
        }

        write_file(&path, object.data()).map_err(|e| Error::io(&path, e))?;

        if let Err(e) = set_mod_time(&path, object.mod_time()) {
            warn!(path = %path.display(), error = %e, "failed to set modification time");
        }

        self.index.write().insert(path, object.size());
        self.counters.record_write();
        Ok(())
    }

    fn del(&self, key: &str) {
        self.counters.record_delete();

        let matches = match self.expand(key) {
            Ok(matches) => matches,
            Err(e) => {
                warn!(key, error = %e, "disk cache delete skipped");
                return;
            }
        };

        // Recursive removals can leave the index out of step with the disk.
        // That only costs an extra probe later, so it is tolerated.
        let mut index = self.index.write();
        if key == "*" {
            index.clear();
        }

        for path in matches {
            index.retain(|indexed, _| !indexed.starts_with(&path));
            let removed = match fs::symlink_metadata(&path) {
                Ok(meta) if meta.is_dir() => fs::remove_dir_all(&path),
                Ok(_) => fs::remove_file(&path),
                Err(e) => Err(e),
            };
            if let Err(e) = removed {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "failed to remove cached path");
                }
            }
        }
    }
}

/// Disk cache statistics
#[derive(Debug, Clone)]
pub struct DiskStats {
    /// Paths currently in the existence index
    pub indexed_files: usize,
    /// Sum of their last known sizes
    pub indexed_bytes: u64,
    /// Operation counters
    pub counters: CounterSnapshot,
}

// =============================================================================
// Filesystem helpers
// =============================================================================

fn has_glob_meta(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

fn create_dir_all(path: &Path) -> Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(DIR_MODE);
    }
    builder.create(path).map_err(|e| Error::io(path, e))
}

fn write_file(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(FILE_MODE);
    }
    let mut file = options.open(path)?;
    file.write_all(data)
}

fn set_mod_time(path: &Path, mod_time: DateTime<Utc>) -> io::Result<()> {
    let file = OpenOptions::new().write(true).open(path)?;
    file.set_modified(SystemTime::from(mod_time))
}

fn read_object(path: &Path) -> io::Result<Object> {
    let mut file = File::open(path)?;
    let meta = file.metadata()?;
    let mod_time = DateTime::<Utc>::from(meta.modified()?);

    let mut data = Vec::with_capacity(meta.len() as usize);
    file.read_to_end(&mut data)?;
    Ok(Object::new(data, mod_time))
}

/// Collect every regular file below `dir` with its size.
fn walk_files(dir: &Path, out: &mut Vec<(PathBuf, u64)>) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "cannot scan directory");
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        match entry.file_type() {
            Ok(ft) if ft.is_dir() => walk_files(&path, out),
            Ok(ft) if ft.is_file() => match entry.metadata() {
                Ok(meta) => out.push((path, meta.len())),
                Err(e) => debug!(path = %path.display(), error = %e, "skipping unreadable file"),
            },
            Ok(_) => {}
            Err(e) => debug!(path = %path.display(), error = %e, "skipping unreadable entry"),
        }
    }
}

/// Collect paths exactly `depth` components below `root` that match.
fn glob_walk(root: &Path, dir: &Path, depth: usize, matcher: &GlobMatcher, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(relative) = path.strip_prefix(root) else {
            continue;
        };
        let level = relative.components().filter(|c| matches!(c, Component::Normal(_))).count();

        if level == depth {
            if matcher.is_match(relative) {
                out.push(path);
            }
        } else if level < depth && entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false) {
            glob_walk(root, &path, depth, matcher, out);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    fn fixed_time() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn setup() -> (TempDir, DiskCache) {
        let dir = TempDir::new().unwrap();
        let cache = DiskCache::new(dir.path().join("cache")).unwrap();
        (dir, cache)
    }

    struct CountingFiller {
        calls: AtomicUsize,
    }

    impl Filler for CountingFiller {
        fn fill(&self, cache: Option<&dyn Cache>, key: &str) -> Result<Object> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let obj = Object::new(format!("filled {}", key), fixed_time());
            if let Some(cache) = cache {
                cache.set(key, obj.clone())?;
            }
            Ok(obj)
        }
    }

    #[test]
    fn test_disk_cache_set_get() {
        let (_dir, cache) = setup();
        let obj = Object::new("Hello, disk", fixed_time());

        cache.set("a/b/c.txt", obj.clone()).unwrap();
        let got = cache.get("a/b/c.txt", None).unwrap();

        assert_eq!(got, obj);
        assert!(cache.base_dir().join("a/b/c.txt").is_file());
        assert_eq!(cache.indexed_len(), 1);
        assert_eq!(cache.indexed_bytes(), 11);
    }

    #[test]
    fn test_disk_cache_miss_without_index_skips_disk() {
        let (_dir, cache) = setup();

        // File exists on disk but was never indexed
        fs::write(cache.base_dir().join("stray"), b"stray").unwrap();

        let err = cache.get("stray", None).unwrap_err();
        assert_matches!(err, Error::NotFound { key } if key == "stray");
    }

    #[test]
    fn test_scan_existing_indexes_files() {
        let (_dir, cache) = setup();
        fs::create_dir_all(cache.base_dir().join("x/y")).unwrap();
        fs::write(cache.base_dir().join("x/y/z"), b"12345").unwrap();
        fs::write(cache.base_dir().join("top"), b"1").unwrap();

        assert_eq!(cache.scan_existing(), 2);
        assert_eq!(cache.indexed_bytes(), 6);
        assert_eq!(cache.get("x/y/z", None).unwrap().data().as_ref(), b"12345");
    }

    #[test]
    fn test_with_config_scans() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("seed"), b"seed").unwrap();

        let cache = DiskCache::with_config(DiskCacheConfig::new(dir.path())).unwrap();
        assert!(cache.is_indexed("seed"));

        let unscanned = DiskCache::with_config(DiskCacheConfig {
            base_dir: dir.path().to_path_buf(),
            scan_existing: false,
        })
        .unwrap();
        assert!(!unscanned.is_indexed("seed"));
    }

    #[test]
    fn test_stale_index_falls_through_to_filler() {
        let (_dir, cache) = setup();
        cache.set("page", Object::new("old", fixed_time())).unwrap();
        fs::remove_file(cache.base_dir().join("page")).unwrap();

        let filler = CountingFiller {
            calls: AtomicUsize::new(0),
        };
        let obj = cache.get("page", Some(&filler)).unwrap();
        assert_eq!(obj.data().as_ref(), b"filled page");
        assert_eq!(filler.calls.load(Ordering::SeqCst), 1);

        // Filler stored it again, so the next lookup hits disk
        cache.get("page", Some(&filler)).unwrap();
        assert_eq!(filler.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_stale_index_without_filler_is_not_found() {
        let (_dir, cache) = setup();
        cache.set("page", Object::now("x")).unwrap();
        fs::remove_file(cache.base_dir().join("page")).unwrap();

        assert_matches!(cache.get("page", None), Err(Error::NotFound { .. }));
        assert!(!cache.is_indexed("page"));
    }

    #[test]
    fn test_mod_time_preserved() {
        let (_dir, cache) = setup();
        cache.set("dated", Object::new("x", fixed_time())).unwrap();

        let meta = fs::metadata(cache.base_dir().join("dated")).unwrap();
        let on_disk = DateTime::<Utc>::from(meta.modified().unwrap());
        assert_eq!(on_disk, fixed_time());
        assert_eq!(cache.get("dated", None).unwrap().mod_time(), fixed_time());
    }

    #[cfg(unix)]
    #[test]
    fn test_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, cache) = setup();
        cache.set("d/f", Object::now("secret")).unwrap();

        let file_mode = fs::metadata(cache.base_dir().join("d/f")).unwrap().permissions().mode();
        let dir_mode = fs::metadata(cache.base_dir().join("d")).unwrap().permissions().mode();
        assert_eq!(file_mode & 0o777, FILE_MODE);
        assert_eq!(dir_mode & 0o777, DIR_MODE);
    }

    #[test]
    fn test_resolve_stays_under_base() {
        let (_dir, cache) = setup();
        let base = cache.base_dir().to_path_buf();

        assert_eq!(cache.resolve("a/b"), base.join("a").join("b"));
        assert_eq!(cache.resolve("/a//b/./c"), base.join("a").join("b").join("c"));
        assert_eq!(cache.resolve("a/../b"), base.join("b"));
        assert_eq!(cache.resolve("../../etc/passwd"), base.join("etc").join("passwd"));
    }

    #[test]
    fn test_set_on_root_key_fails() {
        let (_dir, cache) = setup();
        assert_matches!(cache.set("", Object::now("x")), Err(Error::Io { .. }));
    }

    #[test]
    fn test_delete_exact() {
        let (_dir, cache) = setup();
        cache.set("a", Object::now("a")).unwrap();
        cache.set("ab", Object::now("ab")).unwrap();

        cache.del("a");
        assert!(!cache.base_dir().join("a").exists());
        assert!(cache.base_dir().join("ab").exists());
        assert!(cache.get("a", None).is_err());
        assert!(cache.get("ab", None).is_ok());

        cache.del("does/not/exist");
    }

    #[test]
    fn test_delete_glob() {
        let (_dir, cache) = setup();
        for key in ["posts/a.html", "posts/b.html", "posts/b.html.gz", "pages/a.html"] {
            cache.set(key, Object::now(key)).unwrap();
        }

        cache.del("posts/*.html");
        assert!(cache.get("posts/a.html", None).is_err());
        assert!(cache.get("posts/b.html", None).is_err());
        assert!(cache.get("posts/b.html.gz", None).is_ok());
        assert!(cache.get("pages/a.html", None).is_ok());
    }

    #[test]
    fn test_delete_glob_removes_directories() {
        let (_dir, cache) = setup();
        cache.set("posts/2024/a", Object::now("a")).unwrap();
        cache.set("posts/2024/b", Object::now("b")).unwrap();
        cache.set("postscript", Object::now("c")).unwrap();

        cache.del("posts/*");
        assert!(!cache.base_dir().join("posts/2024").exists());
        assert!(cache.base_dir().join("posts").exists());
        assert!(cache.get("posts/2024/a", None).is_err());
        assert!(cache.get("postscript", None).is_ok());
    }

    #[test]
    fn test_delete_star_does_not_cross_separator() {
        let (_dir, cache) = setup();
        cache.set("a/b/c", Object::now("c")).unwrap();

        cache.del("a/*/d");
        assert!(cache.get("a/b/c", None).is_ok());
    }

    #[test]
    fn test_delete_everything() {
        let (_dir, cache) = setup();
        for i in 0..5 {
            cache.set(&format!("dir{}/file", i), Object::now("x")).unwrap();
        }
        cache.set("top", Object::now("x")).unwrap();

        cache.del("*");
        assert_eq!(cache.indexed_len(), 0);
        assert_eq!(fs::read_dir(cache.base_dir()).unwrap().count(), 0);
        assert!(cache.base_dir().exists());
    }

    #[test]
    fn test_stats() {
        let (_dir, cache) = setup();
        cache.set("k", Object::now("value")).unwrap();
        cache.get("k", None).unwrap();
        let _ = cache.get("missing", None);

        let stats = cache.stats();
        assert_eq!(stats.indexed_files, 1);
        assert_eq!(stats.indexed_bytes, 5);
        assert_eq!(stats.counters.hits, 1);
        assert_eq!(stats.counters.misses, 1);
        assert_eq!(stats.counters.writes, 1);
    }
}
