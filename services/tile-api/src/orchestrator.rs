//! Tile request orchestration.
//!
//! `cache lookup -> snapshot fetch -> render -> cache store`. Every failure
//! after input validation degrades to the shared transparent tile, which is
//! served with a short `max-age` and never written to the tile cache.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::metrics::{MetricsCollector, Timer};
use hazard_common::{HazardError, HazardResult, HazardSnapshot, TileAddress};
use hazard_source::{CachedHazardSource, HazardSource};
use renderer::{render_tile, RenderConfig};
use storage::{tile_cache_key, CacheBackend};

/// Snapshot cache over whichever upstream source is configured.
pub type SnapshotCache = CachedHazardSource<Arc<dyn HazardSource>>;

/// How a tile response was produced; sent as `X-Cache`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
    /// Fallback tile, not cached.
    Bypass,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
            CacheStatus::Bypass => "BYPASS",
        }
    }
}

/// A PNG ready to send, with its response metadata.
#[derive(Debug, Clone)]
pub struct TileResponse {
    pub png: Bytes,
    pub day: u8,
    pub status: CacheStatus,
    /// Blur sigma in output pixels for this zoom.
    pub sigma_px: f64,
    pub issued_at: Option<DateTime<Utc>>,
    pub max_age: Duration,
}

/// Cache lifetimes used by [`TileService`].
#[derive(Debug, Clone, Copy)]
pub struct TileTtls {
    pub tile: Duration,
    pub fallback_max_age: Duration,
}

pub struct TileService {
    snapshots: SnapshotCache,
    cache: Arc<dyn CacheBackend>,
    render: Arc<RenderConfig>,
    ttls: TileTtls,
    transparent: Bytes,
    metrics: Arc<MetricsCollector>,
}

impl TileService {
    /// Build the service, encoding the shared transparent tile once.
    pub fn new(
        snapshots: SnapshotCache,
        cache: Arc<dyn CacheBackend>,
        render: RenderConfig,
        ttls: TileTtls,
        metrics: Arc<MetricsCollector>,
    ) -> HazardResult<Self> {
        let transparent = Bytes::from(renderer::png::transparent_tile_png(render.tile_size as usize)?);
        Ok(Self {
            snapshots,
            cache,
            render: Arc::new(render),
            ttls,
            transparent,
            metrics,
        })
    }

    /// Produce the tile for an address. Only invalid input is an error.
    #[instrument(skip(self), fields(cache = self.cache.name()))]
    pub async fn get_tile(&self, day: u8, zoom: u32, x: u32, y: u32) -> HazardResult<TileResponse> {
        let tile = TileAddress::new(day, zoom, x, y)?;
        self.metrics.record_tile_request(day);

        let key = tile_cache_key(&tile);
        let sigma_px = self.render.sigma_for_zoom(zoom);

        match self.cache.get(&key).await {
            Ok(Some(png)) => {
                self.metrics.record_cache_hit();
                debug!(key = %key, "Tile cache hit");
                let issued_at = self
                    .snapshots
                    .peek(day)
                    .await
                    .and_then(|snapshot| snapshot.issued_at);
                return Ok(TileResponse {
                    png,
                    day,
                    status: CacheStatus::Hit,
                    sigma_px,
                    issued_at,
                    max_age: self.ttls.tile,
                });
            }
            Ok(None) => self.metrics.record_cache_miss(),
            Err(e) => {
                warn!(key = %key, error = %e, "Tile cache read failed, treating as miss");
                self.metrics.record_cache_error(self.cache.name());
                self.metrics.record_cache_miss();
            }
        }

        let snapshot = match self.snapshots.get(day).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(day = day, error = %e, "Hazard fetch failed, serving transparent tile");
                self.metrics.record_fetch_failure(self.snapshots.name());
                return Ok(self.fallback_tile(day, zoom, "fetch"));
            }
        };

        let png = if snapshot.is_empty() {
            debug!(day = day, "Quiet day, caching transparent tile");
            self.transparent.clone()
        } else {
            match self.render_png(&snapshot, tile).await {
                Ok(png) => png,
                Err(e) => {
                    warn!(tile = %tile.cache_key(), error = %e, "Render failed, serving transparent tile");
                    self.metrics.record_render_error();
                    return Ok(self.fallback_tile(day, zoom, "render"));
                }
            }
        };

        if let Err(e) = self.cache.set(&key, png.clone(), self.ttls.tile).await {
            warn!(key = %key, error = %e, "Tile cache write failed");
            self.metrics.record_cache_error(self.cache.name());
        }

        Ok(TileResponse {
            png,
            day,
            status: CacheStatus::Miss,
            sigma_px,
            issued_at: snapshot.issued_at,
            max_age: self.ttls.tile,
        })
    }

    /// Snapshot for a day through the raw-data cache.
    pub async fn snapshot(&self, day: u8) -> HazardResult<Arc<HazardSnapshot>> {
        hazard_common::tile::validate_day(day)?;
        self.snapshots.get(day).await
    }

    pub fn render_config(&self) -> &RenderConfig {
        &self.render
    }

    /// Render on the blocking pool; panics surface as `RenderFailure`.
    async fn render_png(&self, snapshot: &Arc<HazardSnapshot>, tile: TileAddress) -> HazardResult<Bytes> {
        let snapshot = snapshot.clone();
        let config = self.render.clone();
        let timer = Timer::start();

        let rendered = tokio::task::spawn_blocking(move || {
            render_tile(&snapshot.polygons, &tile, &config)
        })
        .await
        .map_err(|e| HazardError::RenderFailure(format!("render task failed: {}", e)))??;

        let elapsed_us = timer.elapsed_us();
        self.metrics.record_render(elapsed_us).await;
        debug!(
            tile = %tile.cache_key(),
            supersample = rendered.supersample,
            sigma_px = rendered.sigma_px,
            coverage = rendered.has_coverage,
            bytes = rendered.png.len(),
            elapsed_ms = elapsed_us as f64 / 1000.0,
            "Rendered tile"
        );
        Ok(Bytes::from(rendered.png))
    }

    /// Transparent BYPASS tile with the short fallback `max-age`; never cached.
    pub fn fallback_tile(&self, day: u8, zoom: u32, reason: &'static str) -> TileResponse {
        self.metrics.record_fallback(reason);
        TileResponse {
            png: self.transparent.clone(),
            day,
            status: CacheStatus::Bypass,
            sigma_px: self.render.sigma_for_zoom(zoom),
            issued_at: None,
            max_age: self.ttls.fallback_max_age,
        }
    }
}
