//! Common test fixtures for hazard tile tests.
//!
//! Polygons, snapshots and upstream GeoJSON payloads describing common
//! scenarios: a quiet day, a single hazard area, nested severities.

use serde_json::{json, Value};

use hazard_common::hazard::Ring;
use hazard_common::{HazardPolygon, HazardSnapshot, SeverityCategory};

/// Common bounding box definitions for testing, as (min_lon, min_lat, max_lon, max_lat).
pub mod bbox {
    /// Continental United States
    pub const CONUS: (f64, f64, f64, f64) = (-130.0, 20.0, -60.0, 55.0);

    /// Everything Web Mercator can show
    pub const MERCATOR_WORLD: (f64, f64, f64, f64) = (-180.0, -85.06, 180.0, 85.06);

    /// Great Lakes region, a typical lake-effect snow area
    pub const GREAT_LAKES: (f64, f64, f64, f64) = (-92.0, 41.0, -76.0, 49.0);
}

/// Common tile addresses as (day, zoom, x, y).
pub mod tiles {
    /// Covers the northern Great Plains and upper Midwest.
    pub const MIDWEST_Z4: (u8, u32, u32, u32) = (1, 4, 4, 5);

    /// The single world tile.
    pub const WORLD_Z0: (u8, u32, u32, u32) = (1, 0, 0, 0);
}

/// A closed axis-aligned rectangle ring.
pub fn rect_ring(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Ring {
    vec![
        (min_lon, min_lat),
        (max_lon, min_lat),
        (max_lon, max_lat),
        (min_lon, max_lat),
        (min_lon, min_lat),
    ]
}

/// A rectangular hazard polygon.
pub fn rect_polygon(
    category: SeverityCategory,
    min_lon: f64,
    min_lat: f64,
    max_lon: f64,
    max_lat: f64,
) -> HazardPolygon {
    HazardPolygon::new(category, vec![rect_ring(min_lon, min_lat, max_lon, max_lat)])
}

/// A rectangular polygon with one rectangular hole.
pub fn polygon_with_hole(
    category: SeverityCategory,
    outer: (f64, f64, f64, f64),
    hole: (f64, f64, f64, f64),
) -> HazardPolygon {
    HazardPolygon::new(
        category,
        vec![
            rect_ring(outer.0, outer.1, outer.2, outer.3),
            rect_ring(hole.0, hole.1, hole.2, hole.3),
        ],
    )
}

/// A snapshot holding `polygons`.
pub fn snapshot(day: u8, polygons: Vec<HazardPolygon>) -> HazardSnapshot {
    HazardSnapshot::new(day, polygons)
}

/// A snapshot where `category` covers the whole Mercator world.
pub fn full_cover_snapshot(day: u8, category: SeverityCategory) -> HazardSnapshot {
    let (min_lon, min_lat, max_lon, max_lat) = bbox::MERCATOR_WORLD;
    snapshot(
        day,
        vec![rect_polygon(category, min_lon, min_lat, max_lon, max_lat)],
    )
}

/// Nested severities centered on the Great Lakes, weakest outermost.
pub fn nested_storm_snapshot(day: u8) -> HazardSnapshot {
    let (min_lon, min_lat, max_lon, max_lat) = bbox::GREAT_LAKES;
    let polygons = [
        SeverityCategory::Elevated,
        SeverityCategory::Minor,
        SeverityCategory::Moderate,
        SeverityCategory::Major,
        SeverityCategory::Extreme,
    ]
    .iter()
    .enumerate()
    .map(|(i, &category)| {
        let inset = i as f64 * 1.5;
        rect_polygon(
            category,
            min_lon + inset,
            min_lat + inset * 0.5,
            max_lon - inset,
            max_lat - inset * 0.5,
        )
    })
    .collect();
    snapshot(day, polygons)
}

/// A GeoJSON Polygon feature with the given properties.
pub fn geojson_polygon_feature(properties: Value, rings: &[Ring]) -> Value {
    let coordinates: Vec<Vec<[f64; 2]>> = rings
        .iter()
        .map(|ring| ring.iter().map(|&(lon, lat)| [lon, lat]).collect())
        .collect();
    json!({
        "type": "Feature",
        "properties": properties,
        "geometry": {"type": "Polygon", "coordinates": coordinates}
    })
}

/// A GeoJSON FeatureCollection body.
pub fn feature_collection(features: Vec<Value>) -> String {
    json!({"type": "FeatureCollection", "features": features}).to_string()
}

/// The body an upstream returns on a quiet day.
pub fn empty_feature_collection() -> String {
    feature_collection(Vec::new())
}
