//! Redis-based tile cache for rendered images.

use async_trait::async_trait;
use bytes::Bytes;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use std::time::Duration;

use crate::backend::CacheBackend;
use hazard_common::{HazardError, HazardResult};

/// Redis tile cache client.
///
/// The multiplexed connection is cloned per operation, so one client can be
/// shared across request tasks.
#[derive(Clone)]
pub struct RedisTileCache {
    conn: MultiplexedConnection,
}

impl RedisTileCache {
    /// Connect to Redis.
    pub async fn connect(redis_url: &str) -> HazardResult<Self> {
        let client = Client::open(redis_url).map_err(|e| {
            HazardError::CacheBackendUnavailable(format!("Redis connection failed: {}", e))
        })?;

        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| {
                HazardError::CacheBackendUnavailable(format!("Redis connection failed: {}", e))
            })?;

        Ok(Self { conn })
    }

    /// Check the connection with a PING.
    pub async fn ping(&self) -> HazardResult<()> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| HazardError::CacheBackendUnavailable(format!("PING failed: {}", e)))?;
        Ok(())
    }
}

#[async_trait]
impl CacheBackend for RedisTileCache {
    async fn get(&self, key: &str) -> HazardResult<Option<Bytes>> {
        let mut conn = self.conn.clone();

        let result: Option<Vec<u8>> = conn
            .get(key)
            .await
            .map_err(|e| HazardError::CacheBackendUnavailable(format!("Cache get failed: {}", e)))?;

        Ok(result.map(Bytes::from))
    }

    async fn set(&self, key: &str, value: Bytes, ttl: Duration) -> HazardResult<()> {
        let mut conn = self.conn.clone();

        // SETEX rejects a zero expiry
        let ttl_secs = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(key, value.as_ref(), ttl_secs)
            .await
            .map_err(|e| HazardError::CacheBackendUnavailable(format!("Cache set failed: {}", e)))?;

        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
