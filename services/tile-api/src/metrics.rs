//! Application metrics collection and reporting.

use metrics::{counter, gauge, histogram};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::RwLock;

use storage::MemoryCacheStats;

/// Metrics collector for the tile API.
///
/// Every recorder updates both the in-process counters served at
/// `/api/metrics` and the Prometheus facade served at `/metrics`.
#[derive(Debug)]
pub struct MetricsCollector {
    pub tile_requests: AtomicU64,
    pub invalid_requests: AtomicU64,
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
    pub cache_errors: AtomicU64,
    pub fetch_failures: AtomicU64,

    /// Render stats
    pub renders_total: AtomicU64,
    pub render_errors: AtomicU64,
    pub fallback_tiles: AtomicU64,

    /// Timing stats (stored as microseconds)
    render_times: RwLock<TimingStats>,

    start_time: Instant,
}

#[derive(Debug, Default)]
struct TimingStats {
    count: u64,
    total_us: u64,
    min_us: u64,
    max_us: u64,
    last_us: u64,
}

impl TimingStats {
    fn record(&mut self, duration_us: u64) {
        self.count += 1;
        self.total_us += duration_us;
        self.last_us = duration_us;
        if self.min_us == 0 || duration_us < self.min_us {
            self.min_us = duration_us;
        }
        if duration_us > self.max_us {
            self.max_us = duration_us;
        }
    }

    fn avg_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            (self.total_us as f64 / self.count as f64) / 1000.0
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            tile_requests: AtomicU64::new(0),
            invalid_requests: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            cache_errors: AtomicU64::new(0),
            fetch_failures: AtomicU64::new(0),
            renders_total: AtomicU64::new(0),
            render_errors: AtomicU64::new(0),
            fallback_tiles: AtomicU64::new(0),
            render_times: RwLock::new(TimingStats::default()),
            start_time: Instant::now(),
        }
    }

    pub fn record_tile_request(&self, day: u8) {
        self.tile_requests.fetch_add(1, Ordering::Relaxed);
        counter!("hazard_tile_requests_total", "day" => day.to_string()).increment(1);
    }

    /// Record a request rejected with 400
    pub fn record_invalid_request(&self) {
        self.invalid_requests.fetch_add(1, Ordering::Relaxed);
        counter!("hazard_tile_invalid_requests_total").increment(1);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
        counter!("hazard_tile_cache_hits_total").increment(1);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
        counter!("hazard_tile_cache_misses_total").increment(1);
    }

    /// Record a cache backend get/set failure
    pub fn record_cache_error(&self, backend: &'static str) {
        self.cache_errors.fetch_add(1, Ordering::Relaxed);
        counter!("hazard_tile_cache_errors_total", "backend" => backend).increment(1);
    }

    pub fn record_fetch_failure(&self, source: &'static str) {
        self.fetch_failures.fetch_add(1, Ordering::Relaxed);
        counter!("hazard_upstream_fetch_failures_total", "source" => source).increment(1);
    }

    /// Record a successful render and its duration
    pub async fn record_render(&self, duration_us: u64) {
        self.renders_total.fetch_add(1, Ordering::Relaxed);
        counter!("hazard_renders_total").increment(1);
        histogram!("hazard_render_duration_seconds").record(duration_us as f64 / 1_000_000.0);

        let mut times = self.render_times.write().await;
        times.record(duration_us);
    }

    pub fn record_render_error(&self) {
        self.render_errors.fetch_add(1, Ordering::Relaxed);
        counter!("hazard_render_failures_total").increment(1);
    }

    /// Record a transparent tile served in place of a failed one
    pub fn record_fallback(&self, reason: &'static str) {
        self.fallback_tiles.fetch_add(1, Ordering::Relaxed);
        counter!("hazard_fallback_tiles_total", "reason" => reason).increment(1);
    }

    /// Publish in-memory tile cache statistics as gauges
    pub fn record_memory_cache_stats(&self, stats: &MemoryCacheStats) {
        gauge!("hazard_tile_memory_cache_hit_rate_percent").set(stats.hit_rate());
        gauge!("hazard_tile_memory_cache_evictions_total").set(stats.evictions as f64);
        gauge!("hazard_tile_memory_cache_expired_total").set(stats.expired as f64);
        gauge!("hazard_tile_memory_cache_size_bytes").set(stats.size_bytes as f64);
        gauge!("hazard_tile_memory_cache_entries").set(stats.entry_count as f64);
    }

    /// Get current metrics snapshot
    pub async fn snapshot(&self) -> MetricsSnapshot {
        let render = self.render_times.read().await;

        let hits = self.cache_hits.load(Ordering::Relaxed);
        let misses = self.cache_misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        let cache_hit_rate = if lookups > 0 {
            (hits as f64 / lookups as f64) * 100.0
        } else {
            0.0
        };

        MetricsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            tile_requests: self.tile_requests.load(Ordering::Relaxed),
            invalid_requests: self.invalid_requests.load(Ordering::Relaxed),
            cache_hits: hits,
            cache_misses: misses,
            cache_errors: self.cache_errors.load(Ordering::Relaxed),
            cache_hit_rate,
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            renders_total: self.renders_total.load(Ordering::Relaxed),
            render_errors: self.render_errors.load(Ordering::Relaxed),
            fallback_tiles: self.fallback_tiles.load(Ordering::Relaxed),
            render_avg_ms: render.avg_ms(),
            render_last_ms: render.last_us as f64 / 1000.0,
            render_min_ms: render.min_us as f64 / 1000.0,
            render_max_ms: render.max_us as f64 / 1000.0,
        }
    }
}

/// Serializable metrics snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,

    pub tile_requests: u64,
    pub invalid_requests: u64,

    // Tile cache
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_errors: u64,
    pub cache_hit_rate: f64,

    pub fetch_failures: u64,

    // Render stats
    pub renders_total: u64,
    pub render_errors: u64,
    pub fallback_tiles: u64,
    pub render_avg_ms: f64,
    pub render_last_ms: f64,
    pub render_min_ms: f64,
    pub render_max_ms: f64,
}

/// Timer guard for measuring operation duration.
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_micros() as f64 / 1000.0
    }
}
