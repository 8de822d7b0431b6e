//! Fake cache backends.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use hazard_common::{HazardError, HazardResult};
use storage::CacheBackend;

/// A backend whose every operation reports unavailability.
#[derive(Default)]
pub struct FlakyCache {
    gets: AtomicUsize,
    sets: AtomicUsize,
}

impl FlakyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CacheBackend for FlakyCache {
    async fn get(&self, _key: &str) -> HazardResult<Option<Bytes>> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        Err(HazardError::CacheBackendUnavailable("connection refused".into()))
    }

    async fn set(&self, _key: &str, _value: Bytes, _ttl: Duration) -> HazardResult<()> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        Err(HazardError::CacheBackendUnavailable("connection refused".into()))
    }

    fn name(&self) -> &'static str {
        "flaky"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flaky_cache_counts_and_fails() {
        let cache = FlakyCache::new();

        let read = tokio_test::block_on(cache.get("hazard:tile:d1/0/0/0"));
        let write = tokio_test::block_on(cache.set(
            "hazard:tile:d1/0/0/0",
            Bytes::from_static(b"png"),
            Duration::from_secs(300),
        ));

        assert!(matches!(read, Err(HazardError::CacheBackendUnavailable(_))));
        assert!(write.is_err());
        assert_eq!((cache.gets(), cache.sets()), (1, 1));
    }
}
