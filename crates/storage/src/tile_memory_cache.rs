//! In-memory LRU cache for rendered tiles.
//!
//! ## Memory-Based Eviction
//!
//! The cache is bounded by bytes rather than entry count. When an insert
//! would exceed the configured limit, ~5% of the budget is evicted in LRU
//! order in one batch.
//!
//! ## Expiry
//!
//! Entries carry their own TTL and are dropped lazily when read after it.

use async_trait::async_trait;
use bytes::Bytes;
use lru::LruCache;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::info;

use crate::backend::CacheBackend;
use hazard_common::HazardResult;

/// In-memory LRU cache for rendered tiles.
pub struct TileMemoryCache {
    cache: RwLock<LruCache<String, CachedTile>>,
    max_bytes: u64,
    stats: Counters,
}

struct CachedTile {
    data: Bytes,
    inserted_at: Instant,
    ttl: Duration,
}

impl CachedTile {
    fn is_expired(&self) -> bool {
        self.inserted_at.elapsed() >= self.ttl
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expired: AtomicU64,
    size_bytes: AtomicU64,
    entry_count: AtomicU64,
    eviction_runs: AtomicU64,
}

/// Point-in-time statistics of a [`TileMemoryCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MemoryCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expired: u64,
    pub size_bytes: u64,
    pub entry_count: u64,
    pub eviction_runs: u64,
    pub max_bytes: u64,
}

impl MemoryCacheStats {
    /// Cache hit rate as a percentage (0-100).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

impl TileMemoryCache {
    /// Create a cache holding at most `max_size_mb` megabytes of tiles.
    ///
    /// # Example
    /// ```
    /// use storage::TileMemoryCache;
    ///
    /// let cache = TileMemoryCache::new(256);
    /// assert_eq!(cache.max_bytes(), 256 * 1024 * 1024);
    /// ```
    pub fn new(max_size_mb: usize) -> Self {
        Self::with_max_bytes(max_size_mb as u64 * 1024 * 1024)
    }

    pub fn with_max_bytes(max_bytes: u64) -> Self {
        // Eviction is by bytes, so the LRU itself never evicts.
        Self {
            cache: RwLock::new(LruCache::unbounded()),
            max_bytes,
            stats: Counters::default(),
        }
    }

    /// Get a tile; expired entries are removed and count as misses.
    pub async fn get_tile(&self, key: &str) -> Option<Bytes> {
        // LRU reads reorder entries, so a write lock is needed.
        let mut cache = self.cache.write().await;

        let Some(cached) = cache.get(key) else {
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };

        if cached.is_expired() {
            let size = cached.data.len() as u64;
            cache.pop(key);
            self.stats.expired.fetch_add(1, Ordering::Relaxed);
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
            self.stats.size_bytes.fetch_sub(size, Ordering::Relaxed);
            self.stats.entry_count.fetch_sub(1, Ordering::Relaxed);
            return None;
        }

        self.stats.hits.fetch_add(1, Ordering::Relaxed);
        Some(cached.data.clone())
    }

    /// Store a tile, evicting a batch first if the byte budget would overflow.
    pub async fn set_tile(&self, key: &str, data: Bytes, ttl: Duration) {
        let tile_size = data.len() as u64;
        let mut cache = self.cache.write().await;

        if let Some(existing) = cache.pop(key) {
            self.stats
                .size_bytes
                .fetch_sub(existing.data.len() as u64, Ordering::Relaxed);
            self.stats.entry_count.fetch_sub(1, Ordering::Relaxed);
        }

        let current_bytes = self.stats.size_bytes.load(Ordering::Relaxed);
        if current_bytes + tile_size > self.max_bytes {
            self.evict_batch_locked(&mut cache, tile_size);
        }

        cache.put(
            key.to_string(),
            CachedTile {
                data,
                inserted_at: Instant::now(),
                ttl,
            },
        );
        self.stats.entry_count.fetch_add(1, Ordering::Relaxed);
        self.stats.size_bytes.fetch_add(tile_size, Ordering::Relaxed);
    }

    /// Evict LRU entries until 5% of the budget (and at least `needed`
    /// bytes) is free.
    fn evict_batch_locked(&self, cache: &mut LruCache<String, CachedTile>, needed: u64) {
        let current_bytes = self.stats.size_bytes.load(Ordering::Relaxed);
        let target_free = (self.max_bytes / 20)
            .max((current_bytes + needed).saturating_sub(self.max_bytes));

        let mut bytes_freed = 0u64;
        let mut entries_evicted = 0u64;
        while bytes_freed < target_free {
            let Some((_, evicted)) = cache.pop_lru() else {
                break;
            };
            bytes_freed += evicted.data.len() as u64;
            entries_evicted += 1;
        }

        self.stats.size_bytes.fetch_sub(bytes_freed, Ordering::Relaxed);
        self.stats
            .entry_count
            .fetch_sub(entries_evicted, Ordering::Relaxed);
        self.stats
            .evictions
            .fetch_add(entries_evicted, Ordering::Relaxed);
        self.stats.eviction_runs.fetch_add(1, Ordering::Relaxed);

        info!(
            entries_evicted = entries_evicted,
            bytes_freed = bytes_freed,
            cache_size_bytes = current_bytes - bytes_freed,
            max_bytes = self.max_bytes,
            "tile cache batch eviction completed"
        );
    }

    /// Current statistics.
    pub fn stats(&self) -> MemoryCacheStats {
        MemoryCacheStats {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
            expired: self.stats.expired.load(Ordering::Relaxed),
            size_bytes: self.stats.size_bytes.load(Ordering::Relaxed),
            entry_count: self.stats.entry_count.load(Ordering::Relaxed),
            eviction_runs: self.stats.eviction_runs.load(Ordering::Relaxed),
            max_bytes: self.max_bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.stats.entry_count.load(Ordering::Relaxed) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub fn size_bytes(&self) -> u64 {
        self.stats.size_bytes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl CacheBackend for TileMemoryCache {
    async fn get(&self, key: &str) -> HazardResult<Option<Bytes>> {
        Ok(self.get_tile(key).await)
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> HazardResult<()> {
        self.set_tile(key, value, ttl).await;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINUTE: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_cache_basic_operations() {
        let cache = TileMemoryCache::new(100);
        assert!(cache.is_empty());

        assert!(cache.get_tile("tile1").await.is_none());

        let data = Bytes::from("test data");
        cache.set_tile("tile1", data.clone(), MINUTE).await;
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get_tile("tile1").await, Some(data));

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entry_count, 1);
        assert!((stats.hit_rate() - 50.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_cache_ttl_expiration() {
        let cache = TileMemoryCache::new(100);

        cache
            .set_tile("tile1", Bytes::from("test data"), Duration::from_millis(100))
            .await;
        assert!(cache.get_tile("tile1").await.is_some());

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert!(cache.get_tile("tile1").await.is_none());
        let stats = cache.stats();
        assert_eq!(stats.expired, 1);
        assert_eq!(stats.entry_count, 0);
        assert_eq!(stats.size_bytes, 0);
    }

    #[tokio::test]
    async fn test_cache_memory_based_eviction() {
        let cache = TileMemoryCache::new(1);

        let tile_100kb = Bytes::from(vec![0u8; 100 * 1024]);
        for i in 0..15 {
            cache
                .set_tile(&format!("tile{}", i), tile_100kb.clone(), MINUTE)
                .await;
        }

        let stats = cache.stats();
        assert!(stats.evictions > 0);
        assert!(stats.eviction_runs > 0);
        assert!(stats.size_bytes <= 1024 * 1024);
        // Most recent entry survives, oldest is gone.
        assert!(cache.get_tile("tile14").await.is_some());
        assert!(cache.get_tile("tile0").await.is_none());
    }

    #[tokio::test]
    async fn test_replacing_entry_tracks_size() {
        let cache = TileMemoryCache::new(100);

        cache.set_tile("tile1", Bytes::from("hello"), MINUTE).await;
        cache.set_tile("tile2", Bytes::from("world!"), MINUTE).await;
        assert_eq!(cache.size_bytes(), 11);

        cache.set_tile("tile1", Bytes::from("hello world"), MINUTE).await;
        assert_eq!(cache.size_bytes(), 17);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn test_backend_trait_roundtrip() {
        let cache = TileMemoryCache::new(1);
        let backend: &dyn CacheBackend = &cache;

        backend.set("k", Bytes::from_static(b"png"), MINUTE).await.unwrap();
        assert_eq!(
            backend.get("k").await.unwrap(),
            Some(Bytes::from_static(b"png"))
        );
        assert_eq!(backend.name(), "memory");
    }
}
