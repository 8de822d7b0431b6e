//! Weather hazard XYZ tile service.
//!
//! Serves blurred, severity-colored hazard overlays as 256x256 PNG tiles for
//! forecast days 1-3, backed by a snapshot cache over the upstream source and
//! a rendered-tile cache.

pub mod config;
pub mod handlers;
pub mod metrics;
pub mod orchestrator;
pub mod state;

use axum::{extract::Extension, routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use state::AppState;

/// Build the HTTP router over shared state.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // XYZ tiles; `y` may carry a `.png` suffix
        .route("/tiles/:day/:z/:x/:y", get(handlers::tile_handler))
        // Snapshot inspection
        .route("/api/hazards/:day", get(handlers::hazards_handler))
        // Health check
        .route("/health", get(handlers::health_handler))
        // Metrics
        .route("/metrics", get(handlers::metrics_handler))
        .route("/api/metrics", get(handlers::api_metrics_handler))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
