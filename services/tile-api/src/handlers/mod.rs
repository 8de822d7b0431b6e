//! HTTP request handlers.
//!
//! - `tiles`: XYZ hazard tiles
//! - `api`: snapshot inspection
//! - `metrics`: health check, Prometheus and JSON metrics

pub mod api;
pub mod metrics;
pub mod tiles;

pub use api::hazards_handler;
pub use metrics::{api_metrics_handler, health_handler, metrics_handler};
pub use tiles::tile_handler;
