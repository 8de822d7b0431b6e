//! Application state shared across handlers.

use anyhow::Result;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tracing::{error, info};

use crate::config::{CacheBackendKind, SourceKind, TileServiceConfig};
use crate::metrics::MetricsCollector;
use crate::orchestrator::{SnapshotCache, TileService, TileTtls};
use hazard_source::{HazardSource, RasterHazardSource, VectorHazardSource};
use storage::{CacheBackend, RedisTileCache, TileMemoryCache};

/// Shared application state.
pub struct AppState {
    pub tiles: TileService,
    pub metrics: Arc<MetricsCollector>,
    /// Set when tiles are cached in-process, for `/api/metrics`.
    pub memory_cache: Option<Arc<TileMemoryCache>>,
    pub prometheus: Option<PrometheusHandle>,
}

impl AppState {
    /// Build state from configuration, connecting to Redis when configured.
    pub async fn from_config(config: &TileServiceConfig) -> Result<Self> {
        let source: Arc<dyn HazardSource> = match config.source {
            SourceKind::Vector => Arc::new(VectorHazardSource::new(
                config.query_url.clone(),
                config.day_layers,
                config.fetch_timeout,
            )?),
            SourceKind::Raster => Arc::new(RasterHazardSource::new(
                config.export_url.clone(),
                config.day_layers,
                config.fetch_timeout,
            )?),
        };
        info!(source = source.name(), "Hazard source configured");

        let (cache, memory_cache) = match config.cache_backend {
            CacheBackendKind::Redis => match connect_redis(&config.redis_url).await {
                Ok(redis) => (Arc::new(redis) as Arc<dyn CacheBackend>, None),
                Err(e) => {
                    error!(error = %e, "Redis unavailable, falling back to in-memory tile cache");
                    memory_backend(config.tile_cache_size_mb)
                }
            },
            CacheBackendKind::Memory => memory_backend(config.tile_cache_size_mb),
        };
        info!(backend = cache.name(), "Tile cache configured");

        let metrics = Arc::new(MetricsCollector::new());
        let snapshots = SnapshotCache::new(source, config.snapshot_ttl);
        let tiles = TileService::new(
            snapshots,
            cache,
            config.render.clone(),
            TileTtls {
                tile: config.tile_ttl,
                fallback_max_age: config.fallback_max_age,
            },
            metrics.clone(),
        )?;

        Ok(Self {
            tiles,
            metrics,
            memory_cache,
            prometheus: None,
        })
    }

    /// Assemble state from prebuilt parts.
    pub fn new(
        tiles: TileService,
        metrics: Arc<MetricsCollector>,
        memory_cache: Option<Arc<TileMemoryCache>>,
    ) -> Self {
        Self {
            tiles,
            metrics,
            memory_cache,
            prometheus: None,
        }
    }

    pub fn with_prometheus(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }
}

async fn connect_redis(url: &str) -> hazard_common::HazardResult<RedisTileCache> {
    let cache = RedisTileCache::connect(url).await?;
    cache.ping().await?;
    info!(url = %url, "Connected to Redis tile cache");
    Ok(cache)
}

fn memory_backend(max_mb: usize) -> (Arc<dyn CacheBackend>, Option<Arc<TileMemoryCache>>) {
    let cache = Arc::new(TileMemoryCache::new(max_mb));
    info!(max_mb = max_mb, "Using in-memory tile cache");
    (cache.clone() as Arc<dyn CacheBackend>, Some(cache))
}
