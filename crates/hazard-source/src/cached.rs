//! Raw-data cache in front of a [`HazardSource`].
//!
//! Snapshots are stored per day and replaced wholesale. Fetch errors are
//! never cached, so the next request after a failure goes upstream again.
//! Concurrent misses for the same day may fetch redundantly; the last
//! successful write wins.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

use crate::source::HazardSource;
use hazard_common::{HazardResult, HazardSnapshot};

struct CachedSnapshot {
    snapshot: Arc<HazardSnapshot>,
    stored_at: Instant,
}

/// TTL snapshot cache wrapping any source.
pub struct CachedHazardSource<S> {
    inner: S,
    ttl: Duration,
    entries: RwLock<HashMap<u8, CachedSnapshot>>,
}

impl<S: HazardSource> CachedHazardSource<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Snapshot for `day`, from cache when fresh, otherwise from the source.
    pub async fn get(&self, day: u8) -> HazardResult<Arc<HazardSnapshot>> {
        if let Some(snapshot) = self.peek(day).await {
            debug!(day = day, "Snapshot cache hit");
            return Ok(snapshot);
        }

        let snapshot = Arc::new(self.inner.fetch(day).await?);
        self.entries.write().await.insert(
            day,
            CachedSnapshot {
                snapshot: snapshot.clone(),
                stored_at: Instant::now(),
            },
        );
        debug!(
            day = day,
            polygons = snapshot.polygons.len(),
            "Snapshot cache stored"
        );
        Ok(snapshot)
    }

    /// Fresh cached snapshot for `day`, without fetching.
    pub async fn peek(&self, day: u8) -> Option<Arc<HazardSnapshot>> {
        let entries = self.entries.read().await;
        entries
            .get(&day)
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| entry.snapshot.clone())
    }

    /// Drop the cached snapshot for `day`.
    pub async fn invalidate(&self, day: u8) {
        self.entries.write().await.remove(&day);
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: HazardSource> HazardSource for CachedHazardSource<S> {
    async fn fetch(&self, day: u8) -> HazardResult<HazardSnapshot> {
        self.get(day).await.map(|snapshot| (*snapshot).clone())
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}
