//! Shared helpers for CLI commands.

use std::path::PathBuf;

use firesight::config::DEFAULT_CACHE_MAX_SIZE_BYTES;
use firesight::{CacheConfig, DiskCacheStore};

use crate::error::CliError;

/// Default cache directory: `~/.cache/firesight`, falling back to
/// `.firesight-cache` in the working directory.
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|d| d.join("firesight"))
        .unwrap_or_else(|| PathBuf::from(".firesight-cache"))
}

/// Resolve the cache config from CLI flags.
pub fn cache_config(cache_dir: Option<PathBuf>, max_size_mb: Option<u64>) -> CacheConfig {
    let directory = cache_dir.unwrap_or_else(default_cache_dir);
    let max_size_bytes = max_size_mb
        .map(|mb| mb * 1024 * 1024)
        .unwrap_or(DEFAULT_CACHE_MAX_SIZE_BYTES);
    CacheConfig::new(directory).with_max_size(max_size_bytes)
}

/// Open the disk cache described by `config`.
pub async fn open_cache(config: &CacheConfig) -> Result<DiskCacheStore, CliError> {
    DiskCacheStore::open(config.directory.clone(), config.max_size_bytes)
        .await
        .map_err(|e| CliError::Cache(e.to_string()))
}

/// Render a byte count for humans.
pub fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * KIB;
    const GIB: u64 = 1024 * MIB;

    if bytes >= GIB {
        format!("{:.2} GiB", bytes as f64 / GIB as f64)
    } else if bytes >= MIB {
        format!("{:.2} MiB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.2} KiB", bytes as f64 / KIB as f64)
    } else {
        format!("{} B", bytes)
    }
}
