//! GeoJSON FeatureCollection parsing into hazard polygons.
//!
//! Only Polygon and MultiPolygon geometries are used; other geometry types
//! and features without geometry are skipped. ArcGIS servers report query
//! errors as a 200 response with an `error` object, which is treated as a
//! malformed payload.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::classify::classify;
use crate::timestamps::{find_timestamp, ISSUED_KEYS, VALID_KEYS};
use hazard_common::hazard::Ring;
use hazard_common::{HazardError, HazardPolygon, HazardResult};

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Option<Vec<Feature>>,
    #[serde(default)]
    error: Option<ArcGisError>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Option<Map<String, Value>>,
    #[serde(default)]
    geometry: Option<Geometry>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    coordinates: Value,
}

#[derive(Debug, Deserialize)]
struct ArcGisError {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

/// Polygons and product times from one layer query.
#[derive(Debug, Clone, Default)]
pub struct ParsedLayer {
    pub polygons: Vec<HazardPolygon>,
    pub issued_at: Option<DateTime<Utc>>,
    pub valid_at: Option<DateTime<Utc>>,
    /// Features in the payload, including skipped ones.
    pub feature_count: usize,
}

/// Parse a GeoJSON FeatureCollection body.
///
/// Zero features is a valid, empty result. Each MultiPolygon member becomes
/// its own [`HazardPolygon`] with the feature's category.
pub fn parse_feature_collection(body: &[u8]) -> HazardResult<ParsedLayer> {
    let collection: FeatureCollection = serde_json::from_slice(body)?;

    if let Some(error) = collection.error {
        return Err(HazardError::UpstreamParse(format!(
            "upstream error {}: {}",
            error.code.unwrap_or_default(),
            error.message.unwrap_or_default()
        )));
    }

    let features = collection
        .features
        .ok_or_else(|| HazardError::UpstreamParse("payload has no features array".into()))?;

    let mut parsed = ParsedLayer {
        feature_count: features.len(),
        ..Default::default()
    };

    for feature in features {
        let properties = feature.properties.unwrap_or_default();
        let category = classify(&properties);

        parsed.issued_at = latest(parsed.issued_at, find_timestamp(&properties, ISSUED_KEYS));
        parsed.valid_at = latest(parsed.valid_at, find_timestamp(&properties, VALID_KEYS));

        let Some(geometry) = feature.geometry else {
            continue;
        };
        if category.is_none() {
            debug!(?properties, "feature has no recognizable severity");
            continue;
        }

        for rings in polygon_rings(&geometry) {
            parsed.polygons.push(HazardPolygon::new(category, rings));
        }
    }

    Ok(parsed)
}

fn latest(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

/// Ring lists of each polygon in a geometry, empty for non-polygon types.
fn polygon_rings(geometry: &Geometry) -> Vec<Vec<Ring>> {
    match geometry.kind.as_str() {
        "Polygon" => parse_polygon(&geometry.coordinates).into_iter().collect(),
        "MultiPolygon" => geometry
            .coordinates
            .as_array()
            .map(|polygons| polygons.iter().filter_map(parse_polygon).collect())
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Outer ring plus holes. An unusable outer ring drops the whole polygon so
/// a hole is never promoted to the outer boundary; bad holes are skipped.
fn parse_polygon(value: &Value) -> Option<Vec<Ring>> {
    let mut rings = value.as_array()?.iter();
    let outer = parse_ring(rings.next()?)?;

    let mut parsed = vec![outer];
    parsed.extend(rings.filter_map(parse_ring));
    Some(parsed)
}

fn parse_ring(value: &Value) -> Option<Ring> {
    let ring: Ring = value
        .as_array()?
        .iter()
        .filter_map(|position| {
            let position = position.as_array()?;
            Some((position.first()?.as_f64()?, position.get(1)?.as_f64()?))
        })
        .collect();
    (ring.len() >= 3).then_some(ring)
}
