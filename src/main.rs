//! objcache - Cache Maintenance Tool
//!
//! Loads a cache layout and runs single operations against it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐    ┌──────────────────┐
//! │ layout.yaml  │───▶│   dyn Cache  │◀──▶│ SourceDirFiller  │
//! │  or --dir    │    │ get/set/del  │    │ (raw + .gz fill) │
//! └──────────────┘    └──────────────┘    └──────────────────┘
//! ```

use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use objcache::cache::{
    compress_and_set, representation_keys, Cache, Compressor, DiskCache, DiskCacheConfig, Filler,
    GzipCompressor, Object,
};
use objcache::config::CacheLayout;
use objcache::error::{Error, Result};

// =============================================================================
// CLI Arguments
// =============================================================================

/// objcache - inspect and maintain object caches
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Cache layout file (YAML)
    #[arg(long, env = "OBJCACHE_CONFIG", conflicts_with = "dir")]
    config: Option<PathBuf>,

    /// Use a plain disk cache rooted at this directory
    #[arg(long, env = "OBJCACHE_DIR")]
    dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch an object, filling misses from a source directory
    Get {
        /// Cache key
        key: String,
        /// Directory to fill misses from (stores raw and .gz forms)
        #[arg(long)]
        source_dir: Option<PathBuf>,
        /// Write the payload here instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
    /// Store a file under a key
    Set {
        /// Cache key
        key: String,
        /// File to store
        file: PathBuf,
        /// Also store a gzip representation under KEY.gz
        #[arg(long)]
        gzip: bool,
    },
    /// Delete a key or a trailing-wildcard pattern
    Del {
        /// Key or pattern (`*` clears the cache)
        pattern: String,
    },
    /// Print disk cache index statistics (requires --dir)
    Stats,
}

// =============================================================================
// Main
// =============================================================================

fn main() {
    let args = Args::parse();

    init_logging(&args);

    if let Err(e) = run(args) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let open = || open_cache(args.config.as_deref(), args.dir.as_deref());

    match args.command {
        Command::Get {
            key,
            source_dir,
            output,
        } => {
            let cache = open()?;
            let filler = source_dir.map(SourceDirFiller::new);
            let object = cache.get(&key, filler.as_ref().map(|f| f as &dyn Filler))?;
            info!(key = %key, bytes = object.len(), mod_time = %object.mod_time(), "fetched");

            match output {
                Some(path) => std::fs::write(&path, object.data()).map_err(|e| Error::io(&path, e))?,
                None => std::io::stdout().write_all(object.data())?,
            }
        }
        Command::Set { key, file, gzip } => {
            let cache = open()?;
            let (data, mod_time) = read_source(&file)?;
            if gzip {
                let reps = compress_and_set(cache.as_ref(), &key, data, mod_time)?;
                info!(
                    raw = %reps.uncompressed_key,
                    compressed = %reps.compressed_key,
                    raw_bytes = reps.uncompressed.len(),
                    compressed_bytes = reps.compressed.len(),
                    "stored both representations"
                );
            } else {
                let bytes = data.len();
                cache.set(&key, Object::new(data, mod_time))?;
                info!(key = %key, bytes, "stored");
            }
        }
        Command::Del { pattern } => {
            open()?.del(&pattern);
            info!(pattern = %pattern, "deleted");
        }
        Command::Stats => {
            let dir = args
                .dir
                .as_deref()
                .ok_or_else(|| Error::Config("stats requires --dir".into()))?;
            let stats = DiskCache::with_config(DiskCacheConfig::new(dir))?.stats();
            println!("indexed_files: {}", stats.indexed_files);
            println!("indexed_bytes: {}", stats.indexed_bytes);
        }
    }

    Ok(())
}

fn open_cache(config: Option<&Path>, dir: Option<&Path>) -> Result<Arc<dyn Cache>> {
    match (config, dir) {
        (Some(path), _) => {
            info!("Loading cache layout from {}", path.display());
            CacheLayout::load(path)?.build()
        }
        (None, Some(dir)) => {
            info!("Opening disk cache at {}", dir.display());
            Ok(Arc::new(DiskCache::with_config(DiskCacheConfig::new(dir))?))
        }
        (None, None) => Err(Error::Config("either --config or --dir is required".into())),
    }
}

fn read_source(path: &Path) -> Result<(Vec<u8>, DateTime<Utc>)> {
    let data = std::fs::read(path).map_err(|e| Error::io(path, e))?;
    let modified = std::fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map_err(|e| Error::io(path, e))?;
    Ok((data, DateTime::<Utc>::from(modified)))
}

// =============================================================================
// Source Directory Filler
// =============================================================================

/// Fills misses by reading the uncompressed file from a source tree and
/// storing both its raw and gzip forms.
struct SourceDirFiller {
    root: PathBuf,
}

impl SourceDirFiller {
    fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn source_path(&self, key: &str) -> Option<PathBuf> {
        let relative = Path::new(key.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return None;
        }
        Some(self.root.join(relative))
    }
}

impl Filler for SourceDirFiller {
    fn fill(&self, cache: Option<&dyn Cache>, key: &str) -> Result<Object> {
        let (uncompressed_key, _) = representation_keys(key);
        let path = self.source_path(&uncompressed_key).ok_or_else(|| Error::FillFailed {
            key: key.to_string(),
            reason: "key escapes the source directory".into(),
        })?;

        let (data, mod_time) = read_source(&path).map_err(|e| Error::FillFailed {
            key: key.to_string(),
            reason: e.to_string(),
        })?;

        match cache {
            Some(cache) => Ok(compress_and_set(cache, key, data, mod_time)?.into_selected(key)),
            None if key == uncompressed_key => Ok(Object::new(data, mod_time)),
            None => Ok(Object::new(GzipCompressor::best().compress(&data)?, mod_time)),
        }
    }
}

// =============================================================================
// Logging
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    // Payloads go to stdout, so logs go to stderr.
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
