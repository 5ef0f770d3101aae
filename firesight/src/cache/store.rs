//! Disk-backed cache store with LRU eviction.
//!
//! Payloads live as individual files named by their cache key; the
//! recency index lives in memory ([`LruIndex`]) and is rebuilt from a
//! directory scan when the store is opened. Writes go to a temp file
//! first and are renamed into place, so a crashed or cancelled write
//! never leaves a partial payload visible.
//!
//! # Concurrency
//!
//! Operations on the same key are serialised through a per-key async
//! mutex; operations on distinct keys proceed concurrently. Eviction
//! takes the victim's key lock before deleting, so a concurrent `get`
//! on that key either completes before the delete or misses cleanly.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::key::CacheKey;
use super::lru_index::LruIndex;

/// Errors from cache store operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// I/O failure reading or writing payload files.
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The payload alone exceeds the configured maximum; it is not
    /// stored.
    #[error("entry too large for cache: {size} bytes (max: {max})")]
    EntryTooLarge { size: u64, max: u64 },
}

/// Bounded, persistent key→payload store with LRU eviction.
pub struct DiskCacheStore {
    index: LruIndex,
    max_size_bytes: u64,
    key_locks: DashMap<CacheKey, Arc<Mutex<()>>>,
}

impl DiskCacheStore {
    /// Open (or create) a store rooted at `cache_dir`.
    ///
    /// Rebuilds the index from whatever payload files the directory
    /// holds, then evicts down to `max_size_bytes` if a smaller bound
    /// is now configured.
    pub async fn open(cache_dir: PathBuf, max_size_bytes: u64) -> Result<Self, CacheError> {
        tokio::fs::create_dir_all(&cache_dir).await?;

        let index = LruIndex::new(cache_dir);
        let stats = index.populate_from_disk().await?;

        let store = Self {
            index,
            max_size_bytes,
            key_locks: DashMap::new(),
        };

        info!(
            cache_dir = %store.index.cache_dir().display(),
            entries = stats.files_indexed,
            total_bytes = stats.total_bytes,
            max_size_bytes,
            "disk cache opened"
        );

        // Bound may have shrunk since last run.
        store.evict_past_limit(None).await;

        Ok(store)
    }

    fn key_lock(&self, key: &CacheKey) -> Arc<Mutex<()>> {
        self.key_locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Look up a payload, touching its recency on a hit.
    ///
    /// A stale index entry whose payload file has vanished is dropped
    /// and reported as a miss.
    pub async fn get(&self, key: &CacheKey) -> Result<Option<Bytes>, CacheError> {
        let lock = self.key_lock(key);
        let _guard = lock.lock().await;

        if !self.index.contains(key) {
            return Ok(None);
        }

        let path = self.index.key_to_path(key);
        match tokio::fs::read(&path).await {
            Ok(data) => {
                self.index.touch(key);
                Ok(Some(Bytes::from(data)))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(key = %key, "payload missing for indexed entry, dropping");
                self.index.remove(key);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Insert or replace a payload, then evict past the bound.
    ///
    /// The freshly inserted entry is never chosen for eviction. If the
    /// payload alone exceeds the bound it is rejected with
    /// [`CacheError::EntryTooLarge`] and nothing is stored.
    pub async fn put(&self, key: &CacheKey, payload: &[u8]) -> Result<(), CacheError> {
        let size = payload.len() as u64;
        if size > self.max_size_bytes {
            return Err(CacheError::EntryTooLarge {
                size,
                max: self.max_size_bytes,
            });
        }

        {
            let lock = self.key_lock(key);
            let _guard = lock.lock().await;

            let path = self.index.key_to_path(key);
            let tmp = path.with_extension("tmp");
            tokio::fs::write(&tmp, payload).await?;
            tokio::fs::rename(&tmp, &path).await?;
            self.index.record(key, size);
        }

        self.evict_past_limit(Some(key)).await;
        Ok(())
    }

    /// Remove one entry. Idempotent; returns whether it existed.
    pub async fn remove(&self, key: &CacheKey) -> Result<bool, CacheError> {
        let lock = self.key_lock(key);
        let _guard = lock.lock().await;
        self.delete_locked(key).await
    }

    /// Remove every indexed entry. Idempotent. Files the index does
    /// not know about are left untouched.
    pub async fn clear(&self) -> Result<(), CacheError> {
        for key in self.index.keys() {
            let lock = self.key_lock(&key);
            let _guard = lock.lock().await;
            self.delete_locked(&key).await?;
        }
        Ok(())
    }

    /// Delete payload and index entry; caller holds the key lock.
    async fn delete_locked(&self, key: &CacheKey) -> Result<bool, CacheError> {
        let existed = self.index.remove(key).is_some();
        let path = self.index.key_to_path(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(existed),
            Err(e) => Err(e.into()),
        }
    }

    /// Evict least-recently-used entries until the store is at or
    /// under its bound. `protect` is never evicted.
    async fn evict_past_limit(&self, protect: Option<&CacheKey>) {
        if self.index.total_size() <= self.max_size_bytes {
            return;
        }

        let mut evicted = 0u64;
        let mut freed = 0u64;

        while self.index.total_size() > self.max_size_bytes {
            let mut progressed = false;

            for (key, snapshot) in self.index.eviction_order(protect) {
                if self.index.total_size() <= self.max_size_bytes {
                    break;
                }

                let lock = self.key_lock(&key);
                let _guard = lock.lock().await;

                // A concurrent get may have touched this entry while
                // we waited for its lock; a newer stamp means it is no
                // longer least recently used, so leave it for the next
                // snapshot.
                let unchanged = self
                    .index
                    .metadata(&key)
                    .is_some_and(|m| m.last_accessed == snapshot.last_accessed);
                if !unchanged {
                    continue;
                }

                if let Some(metadata) = self.index.remove(&key) {
                    let path = self.index.key_to_path(&key);
                    if let Err(e) = tokio::fs::remove_file(&path).await {
                        if e.kind() != ErrorKind::NotFound {
                            warn!(key = %key, error = %e, "failed to delete evicted payload");
                        }
                    }
                    evicted += 1;
                    freed += metadata.size_bytes;
                    progressed = true;
                }
            }

            if !progressed {
                break;
            }
        }

        if evicted > 0 {
            info!(
                entries = evicted,
                bytes_freed = freed,
                size_bytes = self.index.total_size(),
                "cache eviction complete"
            );
        } else {
            debug!("cache over bound but nothing evictable");
        }
    }

    /// Current occupied bytes.
    pub fn size_bytes(&self) -> u64 {
        self.index.total_size()
    }

    /// Current entry count.
    pub fn entry_count(&self) -> u64 {
        self.index.entry_count()
    }

    /// Configured maximum occupied bytes.
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    /// Directory the store persists into.
    pub fn cache_dir(&self) -> &Path {
        self.index.cache_dir()
    }
}
