//! Health checks and metrics endpoints.

use axum::{
    extract::Extension,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tracing::instrument;

use crate::state::AppState;

/// GET /health - Basic health check
pub async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /metrics - Prometheus metrics endpoint
#[instrument(skip(state))]
pub async fn metrics_handler(Extension(state): Extension<Arc<AppState>>) -> Response {
    if let Some(cache) = &state.memory_cache {
        state.metrics.record_memory_cache_stats(&cache.stats());
    }

    let output = state
        .prometheus
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default();

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        output,
    )
        .into_response()
}

/// GET /api/metrics - JSON metrics summary
#[instrument(skip(state))]
pub async fn api_metrics_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Json<serde_json::Value> {
    let snapshot = state.metrics.snapshot().await;
    let tile_cache = state.memory_cache.as_ref().map(|cache| {
        let stats = cache.stats();
        serde_json::json!({
            "stats": stats,
            "hit_rate": stats.hit_rate(),
            "size_mb": stats.size_bytes as f64 / 1024.0 / 1024.0,
        })
    });
    let render = state.tiles.render_config();

    Json(serde_json::json!({
        "metrics": snapshot,
        "tile_cache": tile_cache,
        "render": {
            "tile_size": render.tile_size,
            "fill_alpha": render.fill_alpha,
            "smoothing_radius_km": render.smoothing_radius_km,
            "max_supersample": render.max_supersample,
        },
    }))
}
