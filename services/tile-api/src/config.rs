//! Service configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use hazard_source::DayLayers;
use renderer::RenderConfig;

/// Default upstream MapServer for the winter storm severity layers.
pub const DEFAULT_HAZARD_URL: &str =
    "https://mapservices.weather.noaa.gov/vector/rest/services/outlooks/wpc_wssi/MapServer";

/// Which upstream representation to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// GeoJSON polygon query.
    Vector,
    /// Pre-rendered image, reclassified by color.
    Raster,
}

impl SourceKind {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "vector" => Some(Self::Vector),
            "raster" => Some(Self::Raster),
            _ => None,
        }
    }
}

/// Where rendered tiles are cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackendKind {
    Memory,
    Redis,
}

impl CacheBackendKind {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "memory" => Some(Self::Memory),
            "redis" => Some(Self::Redis),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TileServiceConfig {
    pub source: SourceKind,
    pub query_url: String,
    pub export_url: String,
    pub day_layers: DayLayers,
    pub fetch_timeout: Duration,

    /// Lifetime of a fetched snapshot in the raw-data cache.
    pub snapshot_ttl: Duration,
    /// Lifetime of a rendered tile; also advertised as `max-age`.
    pub tile_ttl: Duration,
    /// `max-age` for fallback tiles served after a failure.
    pub fallback_max_age: Duration,

    pub cache_backend: CacheBackendKind,
    pub redis_url: String,
    pub tile_cache_size_mb: usize,

    pub render: RenderConfig,
}

impl Default for TileServiceConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::Vector,
            query_url: DEFAULT_HAZARD_URL.to_string(),
            export_url: DEFAULT_HAZARD_URL.to_string(),
            day_layers: DayLayers::default(),
            fetch_timeout: Duration::from_secs(15),
            snapshot_ttl: Duration::from_secs(600),
            tile_ttl: Duration::from_secs(300),
            fallback_max_age: Duration::from_secs(60),
            cache_backend: CacheBackendKind::Memory,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            tile_cache_size_mb: 256,
            render: RenderConfig::default(),
        }
    }
}

impl TileServiceConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`. Unparsable values keep the
    /// default and log a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(val) = lookup("HAZARD_SOURCE") {
            match SourceKind::parse(&val) {
                Some(kind) => config.source = kind,
                None => warn!(value = %val, "Unknown HAZARD_SOURCE, using vector"),
            }
        }

        if let Some(val) = lookup("HAZARD_QUERY_URL") {
            config.query_url = val.clone();
            // The export endpoint follows the query endpoint unless set explicitly.
            config.export_url = val;
        }
        if let Some(val) = lookup("HAZARD_EXPORT_URL") {
            config.export_url = val;
        }

        if let Some(val) = lookup("HAZARD_DAY_LAYERS") {
            match DayLayers::parse(&val) {
                Ok(layers) => config.day_layers = layers,
                Err(e) => warn!(error = %e, "Invalid HAZARD_DAY_LAYERS, using default"),
            }
        }

        if let Some(secs) = parse_var::<u64>(&lookup, "HAZARD_FETCH_TIMEOUT_SECS") {
            config.fetch_timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "SNAPSHOT_CACHE_TTL_SECS") {
            config.snapshot_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "TILE_CACHE_TTL_SECS") {
            config.tile_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "EMPTY_TILE_MAX_AGE_SECS") {
            config.fallback_max_age = Duration::from_secs(secs);
        }

        if let Some(val) = lookup("CACHE_BACKEND") {
            match CacheBackendKind::parse(&val) {
                Some(kind) => config.cache_backend = kind,
                None => warn!(value = %val, "Unknown CACHE_BACKEND, using memory"),
            }
        }
        if let Some(val) = lookup("REDIS_URL") {
            config.redis_url = val;
        }
        if let Some(size) = parse_var::<usize>(&lookup, "TILE_CACHE_SIZE_MB") {
            config.tile_cache_size_mb = size.max(1);
        }

        if let Some(alpha) = parse_var::<u8>(&lookup, "RENDER_FILL_ALPHA") {
            config.render.fill_alpha = alpha;
        }
        if let Some(km) = parse_var::<f64>(&lookup, "RENDER_SMOOTHING_KM") {
            if km.is_finite() && km >= 0.0 {
                config.render.smoothing_radius_km = km;
            } else {
                warn!(value = km, "RENDER_SMOOTHING_KM must be non-negative, using default");
            }
        }
        if let Some(factor) = parse_var::<u32>(&lookup, "RENDER_MAX_SUPERSAMPLE") {
            config.render.max_supersample = factor.clamp(1, 4);
        }

        config
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key = key, value = %raw, "Ignoring unparsable configuration value");
            None
        }
    }
}
