//! # Disk Cache Store
//!
//! Bounded on-disk cache keyed by media URL.
//!
//! Each entry is one file named by the SHA-256 hex digest of its URL. An
//! in-memory [`LruCache`] index tracks entry sizes and recency; the total
//! never exceeds the configured byte ceiling, and the least-recently-used
//! entries are deleted first to make room.
//!
//! Files survive the process. [`CacheStore::open`] re-indexes whatever it
//! finds in the directory, oldest-modified first, so recency roughly carries
//! over between sessions.

use crate::cache::stats::CacheStats;
use crate::error::{PlaybackError, Result};
use bridge_traits::storage::FileSystemAccess;
use bytes::Bytes;
use lru::LruCache;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Length of a SHA-256 hex digest.
const KEY_LEN: usize = 64;

struct CacheIndex {
    entries: LruCache<String, u64>,
    total_bytes: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
    closed: bool,
}

impl CacheIndex {
    fn new() -> Self {
        Self {
            entries: LruCache::unbounded(),
            total_bytes: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
            closed: false,
        }
    }

    fn forget(&mut self, key: &str) -> Option<u64> {
        let size = self.entries.pop(key)?;
        self.total_bytes -= size;
        Some(size)
    }
}

/// Bounded LRU media cache on disk.
pub struct CacheStore {
    root: PathBuf,
    capacity_bytes: u64,
    fs: Arc<dyn FileSystemAccess>,
    index: Mutex<CacheIndex>,
}

impl CacheStore {
    /// Open (or create) the cache at `root` with a ceiling of `capacity_bytes`.
    ///
    /// Fails with [`PlaybackError::CacheUnavailable`] when the directory
    /// cannot be created or listed.
    #[instrument(skip(fs), fields(root = ?root))]
    pub async fn open(
        fs: Arc<dyn FileSystemAccess>,
        root: PathBuf,
        capacity_bytes: u64,
    ) -> Result<Self> {
        if capacity_bytes == 0 {
            return Err(PlaybackError::CacheUnavailable(
                "cache capacity must be greater than 0".to_string(),
            ));
        }

        fs.create_dir_all(&root).await.map_err(|e| {
            PlaybackError::CacheUnavailable(format!("Failed to create {:?}: {}", root, e))
        })?;

        let files = fs.list_files(&root).await.map_err(|e| {
            PlaybackError::CacheUnavailable(format!("Failed to list {:?}: {}", root, e))
        })?;

        let mut found: Vec<_> = files
            .into_iter()
            .filter_map(|entry| {
                let key = entry_key(&entry.path)?;
                Some((entry.modified_at.unwrap_or(0), key, entry.size))
            })
            .collect();

        // Oldest first so the most recently written file ends up most recent.
        found.sort_by_key(|(modified, _, _)| *modified);

        let mut index = CacheIndex::new();
        for (_, key, size) in found {
            index.total_bytes += size;
            index.entries.put(key, size);
        }

        let store = Self {
            root,
            capacity_bytes,
            fs,
            index: Mutex::new(index),
        };

        {
            let mut index = store.index.lock().await;
            store.evict_until_fits(&mut index, 0).await;
            info!(
                entries = index.entries.len(),
                total_bytes = index.total_bytes,
                capacity_bytes,
                "Cache store opened"
            );
        }

        Ok(store)
    }

    /// SHA-256 hex digest used as the file name for `url`.
    pub fn key_for(url: &str) -> String {
        hex::encode(Sha256::digest(url.as_bytes()))
    }

    /// Directory holding the cache files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Byte ceiling.
    pub fn capacity_bytes(&self) -> u64 {
        self.capacity_bytes
    }

    fn path_for_key(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    /// Whether `url` is cached. Does not affect recency.
    pub async fn contains(&self, url: &str) -> bool {
        let index = self.index.lock().await;
        !index.closed && index.entries.contains(&Self::key_for(url))
    }

    /// Read a cached entry, marking it most recently used.
    ///
    /// A missing or unreadable file is dropped from the index and reported
    /// as a miss.
    pub async fn get(&self, url: &str) -> Result<Option<Bytes>> {
        let key = Self::key_for(url);
        let mut index = self.index.lock().await;

        if index.closed || index.entries.get(&key).is_none() {
            index.misses += 1;
            return Ok(None);
        }

        match self.fs.read_file(&self.path_for_key(&key)).await {
            Ok(data) => {
                index.hits += 1;
                debug!(key = %key, size = data.len(), "Cache hit");
                Ok(Some(data))
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Cached file unreadable, dropping entry");
                index.forget(&key);
                index.misses += 1;
                Ok(None)
            }
        }
    }

    /// Store `data` for `url`, evicting least-recently-used entries first.
    ///
    /// Returns `Ok(false)` without touching the cache when the entry alone
    /// exceeds the ceiling.
    pub async fn put(&self, url: &str, data: Bytes) -> Result<bool> {
        let size = data.len() as u64;
        let key = Self::key_for(url);
        let mut index = self.index.lock().await;

        if index.closed {
            return Err(PlaybackError::CacheUnavailable("cache is closed".to_string()));
        }

        if size > self.capacity_bytes {
            debug!(key = %key, size, "Entry larger than cache ceiling, not stored");
            return Ok(false);
        }

        index.forget(&key);
        self.evict_until_fits(&mut index, size).await;

        let path = self.path_for_key(&key);
        if let Err(e) = self.fs.write_file(&path, data).await {
            // Any previous version is already out of the index.
            if let Err(remove_err) = self.fs.remove_file(&path).await {
                warn!(key = %key, error = %remove_err, "Failed to delete stale cache file");
            }
            return Err(PlaybackError::CacheError(format!("Failed to write cache file: {}", e)));
        }

        index.entries.put(key, size);
        index.total_bytes += size;
        debug!(size, total_bytes = index.total_bytes, "Cache entry stored");
        Ok(true)
    }

    /// Remove the entry for `url`. Returns whether it existed.
    pub async fn remove(&self, url: &str) -> Result<bool> {
        let key = Self::key_for(url);
        let mut index = self.index.lock().await;

        if index.forget(&key).is_none() {
            return Ok(false);
        }

        self.fs
            .remove_file(&self.path_for_key(&key))
            .await
            .map_err(|e| PlaybackError::CacheError(format!("Failed to delete cache file: {}", e)))?;
        Ok(true)
    }

    /// Delete every entry. Returns how many were removed.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<usize> {
        let mut index = self.index.lock().await;
        let mut cleared = 0;

        while let Some((key, size)) = index.entries.pop_lru() {
            index.total_bytes -= size;
            if let Err(e) = self.fs.remove_file(&self.path_for_key(&key)).await {
                warn!(key = %key, error = %e, "Failed to delete cache file");
            }
            cleared += 1;
        }

        info!(cleared, "Cache cleared");
        Ok(cleared)
    }

    /// Current counters.
    pub async fn stats(&self) -> CacheStats {
        let index = self.index.lock().await;
        CacheStats {
            entries: index.entries.len(),
            total_bytes: index.total_bytes,
            capacity_bytes: self.capacity_bytes,
            hits: index.hits,
            misses: index.misses,
            evictions: index.evictions,
        }
    }

    /// Drop the in-memory index. Files stay on disk for the next `open`.
    pub async fn close(&self) {
        let mut index = self.index.lock().await;
        index.entries.clear();
        index.total_bytes = 0;
        index.closed = true;
        debug!("Cache store closed");
    }

    pub async fn is_closed(&self) -> bool {
        self.index.lock().await.closed
    }

    async fn evict_until_fits(&self, index: &mut CacheIndex, incoming: u64) {
        while index.total_bytes + incoming > self.capacity_bytes {
            let Some((key, size)) = index.entries.pop_lru() else {
                break;
            };
            index.total_bytes -= size;
            index.evictions += 1;

            if let Err(e) = self.fs.remove_file(&self.path_for_key(&key)).await {
                warn!(key = %key, error = %e, "Failed to delete evicted cache file");
            }
            debug!(key = %key, size, "Evicted cache entry");
        }
    }
}

/// Cache key encoded in a file name, if it is one of ours.
fn entry_key(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    (name.len() == KEY_LEN && name.bytes().all(|b| b.is_ascii_hexdigit()))
        .then(|| name.to_ascii_lowercase())
}
