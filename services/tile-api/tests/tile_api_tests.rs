//! HTTP-level tests for the tile service, driven through the axum router.

use axum::body::{to_bytes, Body};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use hazard_common::SeverityCategory;
use hazard_source::HazardSource;
use renderer::RenderConfig;
use storage::{CacheBackend, TileMemoryCache};
use test_utils::fixtures::{full_cover_snapshot, nested_storm_snapshot};
use test_utils::{FailingHazardSource, FlakyCache, StaticHazardSource};
use tile_api::build_router;
use tile_api::metrics::MetricsCollector;
use tile_api::orchestrator::{SnapshotCache, TileService, TileTtls};
use tile_api::state::AppState;

fn app(source: Arc<dyn HazardSource>, cache: Arc<dyn CacheBackend>) -> Router {
    app_with_memory(source, cache, None)
}

fn app_with_memory(
    source: Arc<dyn HazardSource>,
    cache: Arc<dyn CacheBackend>,
    memory_cache: Option<Arc<TileMemoryCache>>,
) -> Router {
    let metrics = Arc::new(MetricsCollector::new());
    let tiles = TileService::new(
        SnapshotCache::new(source, Duration::from_secs(600)),
        cache,
        RenderConfig::default(),
        TileTtls {
            tile: Duration::from_secs(300),
            fallback_max_age: Duration::from_secs(60),
        },
        metrics.clone(),
    )
    .unwrap();
    build_router(Arc::new(AppState::new(tiles, metrics, memory_cache)))
}

fn memory_cache() -> Arc<TileMemoryCache> {
    Arc::new(TileMemoryCache::new(16))
}

async fn get(app: &Router, uri: &str) -> (StatusCode, HeaderMap, Bytes) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, body)
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers.get(name).unwrap().to_str().unwrap()
}

fn assert_fully_transparent(png: &[u8]) {
    let image = image::load_from_memory(png).unwrap().to_rgba8();
    assert_eq!(image.dimensions(), (256, 256));
    assert!(image.pixels().all(|p| p.0[3] == 0));
}

// ============================================================================
// Rendering
// ============================================================================

#[tokio::test]
async fn test_full_cover_major_tile() {
    let source = Arc::new(
        StaticHazardSource::new().with_snapshot(full_cover_snapshot(1, SeverityCategory::Major)),
    );
    let app = app(source, memory_cache());

    let (status, headers, body) = get(&app, "/tiles/1/4/4/5").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(header(&headers, "content-type"), "image/png");
    assert_eq!(header(&headers, "cache-control"), "public, max-age=300");
    assert_eq!(header(&headers, "access-control-allow-origin"), "*");
    assert_eq!(header(&headers, "x-hazard-day"), "1");
    assert_eq!(header(&headers, "x-cache"), "MISS");

    let expected_sigma = format!("{:.2}", RenderConfig::default().sigma_for_zoom(4));
    assert_eq!(header(&headers, "x-blur-sigma"), expected_sigma);

    let image = image::load_from_memory(&body).unwrap().to_rgba8();
    assert_eq!(image.dimensions(), (256, 256));
    let expected = [230i16, 40, 40, 180];
    for pixel in image.pixels() {
        for (channel, want) in pixel.0.iter().zip(expected) {
            assert!(
                (*channel as i16 - want).abs() <= 1,
                "pixel {:?} differs from {:?}",
                pixel.0,
                expected
            );
        }
    }
}

#[tokio::test]
async fn test_png_suffix_is_accepted() {
    let source = Arc::new(StaticHazardSource::new().with_snapshot(nested_storm_snapshot(2)));
    let app = app(source, memory_cache());

    let (status, headers, body) = get(&app, "/tiles/2/4/4/5.png").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(header(&headers, "x-hazard-day"), "2");

    // The Great Lakes storm is inside this tile, so something is painted.
    let image = image::load_from_memory(&body).unwrap().to_rgba8();
    assert!(image.pixels().any(|p| p.0[3] > 0));
}

#[tokio::test]
async fn test_second_request_is_cache_hit() {
    let source = Arc::new(
        StaticHazardSource::new().with_snapshot(full_cover_snapshot(1, SeverityCategory::Minor)),
    );
    let app = app(source.clone(), memory_cache());

    let (_, first_headers, first_body) = get(&app, "/tiles/1/3/2/3").await;
    let (_, second_headers, second_body) = get(&app, "/tiles/1/3/2/3").await;

    assert_eq!(header(&first_headers, "x-cache"), "MISS");
    assert_eq!(header(&second_headers, "x-cache"), "HIT");
    assert_eq!(first_body, second_body);
    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn test_issued_time_header() {
    let issued = Utc.with_ymd_and_hms(2024, 1, 15, 8, 0, 0).unwrap();
    let snapshot = full_cover_snapshot(3, SeverityCategory::Moderate).with_times(Some(issued), None);
    let app = app(Arc::new(StaticHazardSource::new().with_snapshot(snapshot)), memory_cache());

    let (_, headers, _) = get(&app, "/tiles/3/2/0/1").await;
    assert_eq!(header(&headers, "x-hazard-issued"), "2024-01-15T08:00:00+00:00");

    let (_, headers, _) = get(&app, "/tiles/3/2/0/1").await;
    assert_eq!(header(&headers, "x-cache"), "HIT");
    assert_eq!(header(&headers, "x-hazard-issued"), "2024-01-15T08:00:00+00:00");
}

// ============================================================================
// Quiet days and failures
// ============================================================================

#[tokio::test]
async fn test_quiet_day_tile_is_transparent_and_cached() {
    let source = Arc::new(StaticHazardSource::new());
    let app = app(source.clone(), memory_cache());

    let (status, headers, body) = get(&app, "/tiles/2/5/8/12").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(header(&headers, "x-cache"), "MISS");
    assert_eq!(header(&headers, "cache-control"), "public, max-age=300");
    assert_fully_transparent(&body);

    let (_, headers, _) = get(&app, "/tiles/2/5/8/12").await;
    assert_eq!(header(&headers, "x-cache"), "HIT");
    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn test_fetch_failure_is_not_cached() {
    let source = Arc::new(FailingHazardSource::new());
    let app = app(source.clone(), memory_cache());

    for _ in 0..2 {
        let (status, headers, body) = get(&app, "/tiles/1/4/4/5").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(header(&headers, "x-cache"), "BYPASS");
        assert_eq!(header(&headers, "cache-control"), "public, max-age=60");
        assert!(headers.get("x-hazard-issued").is_none());
        assert_fully_transparent(&body);
    }

    // No negative caching at either layer.
    assert_eq!(source.calls(), 2);
}

#[tokio::test]
async fn test_unavailable_cache_still_renders() {
    let source = Arc::new(
        StaticHazardSource::new().with_snapshot(full_cover_snapshot(1, SeverityCategory::Extreme)),
    );
    let cache = Arc::new(FlakyCache::new());
    let app = app(source, cache.clone());

    for _ in 0..2 {
        let (status, headers, body) = get(&app, "/tiles/1/6/14/23").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(header(&headers, "x-cache"), "MISS");

        let image = image::load_from_memory(&body).unwrap().to_rgba8();
        let center = image.get_pixel(128, 128).0;
        assert!((center[0] as i16 - 170).abs() <= 1);
        assert!((center[3] as i16 - 180).abs() <= 1);
    }

    assert_eq!(cache.gets(), 2);
    assert_eq!(cache.sets(), 2);
}

// ============================================================================
// Input validation
// ============================================================================

#[tokio::test]
async fn test_invalid_requests_are_rejected() {
    let source = Arc::new(StaticHazardSource::new());
    let app = app(source.clone(), memory_cache());

    for uri in [
        "/tiles/0/4/4/5",
        "/tiles/4/4/4/5",
        "/tiles/1/13/0/0",
        "/tiles/1/2/4/0",
        "/tiles/1/2/0/4",
        "/tiles/1/4/abc/5",
        "/tiles/1/4/-1/5",
        "/tiles/one/4/4/5",
    ] {
        let (status, headers, body) = get(&app, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert!(header(&headers, "content-type").starts_with("text/plain"));
        assert!(!body.is_empty());
    }

    // Validation happens before any upstream work.
    assert_eq!(source.calls(), 0);
}

// ============================================================================
// Auxiliary endpoints
// ============================================================================

#[tokio::test]
async fn test_health() {
    let app = app(Arc::new(StaticHazardSource::new()), memory_cache());
    let (status, _, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"OK");
}

#[tokio::test]
async fn test_hazard_summary() {
    let source = Arc::new(StaticHazardSource::new().with_snapshot(nested_storm_snapshot(1)));
    let app = app(source, memory_cache());

    let (status, _, body) = get(&app, "/api/hazards/1").await;
    assert_eq!(status, StatusCode::OK);
    let summary: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(summary["day"], 1);
    assert_eq!(summary["polygons"], 5);
    assert_eq!(summary["empty"], false);
    assert_eq!(summary["categories"]["Extreme"], 1);
    assert!(summary["issued_at"].is_null());

    let (status, _, _) = get(&app, "/api/hazards/9").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _, _) = get(&app, "/api/hazards/today").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_hazard_summary_upstream_failure() {
    let app = app(Arc::new(FailingHazardSource::new()), memory_cache());
    let (status, _, body) = get(&app, "/api/hazards/2").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(error["error"], "upstream_fetch_failed");
}

#[tokio::test]
async fn test_api_metrics_reports_cache_activity() {
    let cache = memory_cache();
    let app = app_with_memory(
        Arc::new(StaticHazardSource::new()),
        cache.clone(),
        Some(cache),
    );

    get(&app, "/tiles/1/1/0/0").await;
    get(&app, "/tiles/1/1/0/0").await;
    get(&app, "/tiles/0/1/0/0").await;

    let (status, _, body) = get(&app, "/api/metrics").await;
    assert_eq!(status, StatusCode::OK);
    let metrics: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(metrics["metrics"]["tile_requests"], 2);
    assert_eq!(metrics["metrics"]["invalid_requests"], 1);
    assert_eq!(metrics["metrics"]["cache_hits"], 1);
    assert_eq!(metrics["tile_cache"]["stats"]["entry_count"], 1);
    assert_eq!(metrics["render"]["fill_alpha"], 180);
}
