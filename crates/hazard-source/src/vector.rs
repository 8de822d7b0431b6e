//! Vector polygon source: GeoJSON query against the upstream MapServer.

use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use crate::geojson::parse_feature_collection;
use crate::source::{DayLayers, HazardSource};
use hazard_common::{HazardError, HazardResult, HazardSnapshot};

/// Fetches hazard polygons from `{base_url}/{layer}/query`.
pub struct VectorHazardSource {
    client: Client,
    base_url: String,
    layers: DayLayers,
}

impl VectorHazardSource {
    pub fn new(base_url: impl Into<String>, layers: DayLayers, timeout: Duration) -> HazardResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("hazard-tiles/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| HazardError::UpstreamFetchFailed(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            layers,
        })
    }

    /// Query URL for a layer, without parameters.
    pub fn query_url(&self, layer: u32) -> String {
        format!("{}/{}/query", self.base_url, layer)
    }

    /// Query parameters selecting every feature as WGS84 GeoJSON.
    pub fn query_params() -> [(&'static str, &'static str); 5] {
        [
            ("where", "1=1"),
            ("outFields", "*"),
            ("returnGeometry", "true"),
            ("outSR", "4326"),
            ("f", "geojson"),
        ]
    }
}

#[async_trait]
impl HazardSource for VectorHazardSource {
    #[instrument(skip(self), fields(source = "vector"))]
    async fn fetch(&self, day: u8) -> HazardResult<HazardSnapshot> {
        let layer = self.layers.layer_for(day)?;
        let url = self.query_url(layer);
        let started = Instant::now();

        debug!(url = %url, layer = layer, "Querying hazard layer");

        let response = self
            .client
            .get(&url)
            .query(&Self::query_params())
            .send()
            .await
            .map_err(|e| {
                warn!(url = %url, error = %e, "Hazard query failed");
                HazardError::UpstreamFetchFailed(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status = %status, "Hazard query returned error status");
            return Err(HazardError::UpstreamFetchFailed(format!(
                "{} returned {}",
                url, status
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| HazardError::UpstreamFetchFailed(format!("reading body: {}", e)))?;

        let parsed = parse_feature_collection(&body)?;

        info!(
            day = day,
            layer = layer,
            status = %status,
            features = parsed.feature_count,
            polygons = parsed.polygons.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Fetched hazard layer"
        );

        Ok(HazardSnapshot::new(day, parsed.polygons).with_times(parsed.issued_at, parsed.valid_at))
    }

    fn name(&self) -> &'static str {
        "vector"
    }
}
