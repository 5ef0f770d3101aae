//! In-memory recency index for cache entries.
//!
//! Tracks every cached payload with its size and a logical access
//! stamp, so eviction can pick the least-recently-used entries
//! without scanning the filesystem.
//!
//! # Recency stamps
//!
//! Access times are drawn from a process-wide logical clock (an
//! `AtomicU64`), not wall time. Every `record`/`touch` gets a unique,
//! strictly increasing stamp, which makes LRU ordering total: entries
//! never tie, and entries inserted earlier sort older than entries
//! inserted later.
//!
//! # Lifecycle
//!
//! The index is ephemeral. It is rebuilt from a directory scan at
//! startup ([`LruIndex::populate_from_disk`]) with file mtimes
//! seeding the initial ordering, then kept in sync by the store on
//! every operation.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use super::key::CacheKey;

/// Filename extension for payload files.
const PAYLOAD_EXTENSION: &str = "img";

/// Minimal per-entry metadata. Paths are computed from keys, not
/// stored.
#[derive(Debug, Clone)]
pub struct EntryMetadata {
    /// Payload size in bytes.
    pub size_bytes: u64,
    /// Logical stamp of the last access.
    pub last_accessed: u64,
}

/// Statistics from rebuilding the index from disk.
#[derive(Debug, Default)]
pub struct PopulateStats {
    /// Payload files adopted into the index.
    pub files_indexed: u64,
    /// Files skipped because their name is not a cache key.
    pub skipped_foreign: u64,
    /// Total adopted bytes.
    pub total_bytes: u64,
}

/// Thread-safe recency index.
pub struct LruIndex {
    entries: DashMap<CacheKey, EntryMetadata>,
    total_size: AtomicU64,
    clock: AtomicU64,
    cache_dir: PathBuf,
}

impl LruIndex {
    /// Create an empty index rooted at `cache_dir`.
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            entries: DashMap::new(),
            total_size: AtomicU64::new(0),
            clock: AtomicU64::new(0),
            cache_dir,
        }
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Record a new entry or replace an existing one.
    pub fn record(&self, key: &CacheKey, size_bytes: u64) {
        let metadata = EntryMetadata {
            size_bytes,
            last_accessed: self.tick(),
        };
        if let Some(old) = self.entries.insert(key.clone(), metadata) {
            if size_bytes >= old.size_bytes {
                self.total_size
                    .fetch_add(size_bytes - old.size_bytes, Ordering::Relaxed);
            } else {
                self.total_size
                    .fetch_sub(old.size_bytes - size_bytes, Ordering::Relaxed);
            }
        } else {
            self.total_size.fetch_add(size_bytes, Ordering::Relaxed);
        }
    }

    /// Bump the access stamp for an existing entry. No-op for unknown
    /// keys.
    pub fn touch(&self, key: &CacheKey) {
        if let Some(mut entry) = self.entries.get_mut(key) {
            entry.last_accessed = self.tick();
        }
    }

    /// Remove an entry, returning its metadata if it existed.
    pub fn remove(&self, key: &CacheKey) -> Option<EntryMetadata> {
        let (_, metadata) = self.entries.remove(key)?;
        self.total_size
            .fetch_sub(metadata.size_bytes, Ordering::Relaxed);
        Some(metadata)
    }

    /// Whether the key is present.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Current metadata for a key, if present.
    pub fn metadata(&self, key: &CacheKey) -> Option<EntryMetadata> {
        self.entries.get(key).map(|e| e.value().clone())
    }

    /// All entries sorted least-recently-accessed first, excluding
    /// `protect` if given. Used by the store's eviction loop.
    pub fn eviction_order(&self, protect: Option<&CacheKey>) -> Vec<(CacheKey, EntryMetadata)> {
        let mut candidates: Vec<_> = self
            .entries
            .iter()
            .filter(|entry| protect != Some(entry.key()))
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        candidates.sort_by_key(|(_, m)| m.last_accessed);
        candidates
    }

    /// Keys of all entries, in no particular order.
    pub fn keys(&self) -> Vec<CacheKey> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }

    /// Total bytes tracked by the index.
    pub fn total_size(&self) -> u64 {
        self.total_size.load(Ordering::Relaxed)
    }

    /// Number of tracked entries.
    pub fn entry_count(&self) -> u64 {
        self.entries.len() as u64
    }

    /// Payload path for a key.
    pub fn key_to_path(&self, key: &CacheKey) -> PathBuf {
        self.cache_dir
            .join(format!("{}.{}", key.as_str(), PAYLOAD_EXTENSION))
    }

    /// Parse a payload filename back to its key.
    pub fn filename_to_key(filename: &str) -> Option<CacheKey> {
        let stem = filename.strip_suffix(&format!(".{}", PAYLOAD_EXTENSION))?;
        CacheKey::from_hex(stem)
    }

    /// Rebuild the index from payload files on disk.
    ///
    /// Files whose name parses as a cache key are adopted; everything
    /// else (including in-flight `.tmp` files) is skipped and left
    /// untouched. Adopted entries get recency stamps in mtime order,
    /// so pre-restart access patterns keep their relative LRU
    /// ordering.
    pub async fn populate_from_disk(&self) -> std::io::Result<PopulateStats> {
        let mut stats = PopulateStats::default();

        if !self.cache_dir.exists() {
            return Ok(stats);
        }

        let mut adopted: Vec<(CacheKey, u64, std::time::SystemTime)> = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.cache_dir).await?;

        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            let metadata = match tokio::fs::metadata(&path).await {
                Ok(m) if m.is_file() => m,
                _ => continue,
            };

            let key = path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(Self::filename_to_key);
            let key = match key {
                Some(k) => k,
                None => {
                    stats.skipped_foreign += 1;
                    continue;
                }
            };

            let mtime = metadata
                .modified()
                .unwrap_or_else(|_| std::time::SystemTime::UNIX_EPOCH);
            adopted.push((key, metadata.len(), mtime));

            if adopted.len() % 100 == 0 {
                tokio::task::yield_now().await;
            }
        }

        // Oldest files first so they are also oldest in LRU order.
        adopted.sort_by_key(|(_, _, mtime)| *mtime);
        for (key, size, _) in adopted {
            stats.files_indexed += 1;
            stats.total_bytes += size;
            self.record(&key, size);
        }

        tracing::debug!(
            files = stats.files_indexed,
            skipped = stats.skipped_foreign,
            total_bytes = stats.total_bytes,
            "cache index rebuilt from disk"
        );

        Ok(stats)
    }

    /// The directory this index is rooted at.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }
}
