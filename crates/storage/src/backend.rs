//! The cache backend interface.

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

use hazard_common::{HazardResult, TileAddress};

/// Key/value store for rendered tiles.
///
/// Implementations must be safe for concurrent use. Errors are reported as
/// `HazardError::CacheBackendUnavailable`; callers treat them as a miss.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Fetch a value, `None` when missing or expired.
    async fn get(&self, key: &str) -> HazardResult<Option<Bytes>>;

    /// Store a value that expires after `ttl`.
    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> HazardResult<()>;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}

/// Cache key for one rendered tile.
pub fn tile_cache_key(address: &TileAddress) -> String {
    format!("hazard:tile:{}", address.cache_key())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_cache_key_distinguishes_days() {
        let day1 = TileAddress::new(1, 4, 4, 5).unwrap();
        let day2 = TileAddress::new(2, 4, 4, 5).unwrap();
        assert_eq!(tile_cache_key(&day1), "hazard:tile:d1/4/4/5");
        assert_ne!(tile_cache_key(&day1), tile_cache_key(&day2));
    }
}
