//! Hazard polygons and the per-day snapshot that carries them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{BoundingBox, SeverityCategory};

/// A (lon, lat) coordinate in degrees.
pub type Point = (f64, f64);

/// A closed ring of points. The closing point may or may not be repeated.
pub type Ring = Vec<Point>;

/// One hazard polygon tagged with its severity.
///
/// `rings[0]` is the outer boundary; subsequent rings are holes.
/// A MultiPolygon is stored as several `HazardPolygon`s with the same category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardPolygon {
    pub category: SeverityCategory,
    pub rings: Vec<Ring>,
}

impl HazardPolygon {
    pub fn new(category: SeverityCategory, rings: Vec<Ring>) -> Self {
        Self { category, rings }
    }

    /// Outer boundary ring, if present.
    pub fn outer(&self) -> Option<&Ring> {
        self.rings.first()
    }

    /// Hole rings.
    pub fn holes(&self) -> &[Ring] {
        if self.rings.len() > 1 {
            &self.rings[1..]
        } else {
            &[]
        }
    }

    /// Geographic extent of the outer ring.
    pub fn bbox(&self) -> Option<BoundingBox> {
        self.outer()
            .and_then(|ring| BoundingBox::from_points(ring.iter().copied()))
    }

    /// Ray-casting containment test: inside the outer ring and outside every hole.
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        match self.outer() {
            Some(outer) if ring_contains(outer, lon, lat) => {
                !self.holes().iter().any(|hole| ring_contains(hole, lon, lat))
            }
            _ => false,
        }
    }
}

/// Even-odd ray-casting test of a point against a single ring.
///
/// Degenerate rings (fewer than 3 points) contain nothing.
pub fn ring_contains(ring: &[Point], lon: f64, lat: f64) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = n - 1;

    for i in 0..n {
        let (xi, yi) = ring[i];
        let (xj, yj) = ring[j];

        if ((yi > lat) != (yj > lat)) && (lon < (xj - xi) * (lat - yi) / (yj - yi) + xi) {
            inside = !inside;
        }
        j = i;
    }

    inside
}

/// The full set of hazard polygons for one forecast day.
///
/// Snapshots are immutable once built and are always replaced wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HazardSnapshot {
    pub day: u8,
    pub polygons: Vec<HazardPolygon>,
    pub fetched_at: DateTime<Utc>,
    /// Product issue time reported by the upstream, if any.
    pub issued_at: Option<DateTime<Utc>>,
    /// Product valid time reported by the upstream, if any.
    pub valid_at: Option<DateTime<Utc>>,
}

impl HazardSnapshot {
    pub fn new(day: u8, polygons: Vec<HazardPolygon>) -> Self {
        Self {
            day,
            polygons,
            fetched_at: Utc::now(),
            issued_at: None,
            valid_at: None,
        }
    }

    /// A valid snapshot for a quiet weather day.
    pub fn empty(day: u8) -> Self {
        Self::new(day, Vec::new())
    }

    pub fn with_times(
        mut self,
        issued_at: Option<DateTime<Utc>>,
        valid_at: Option<DateTime<Utc>>,
    ) -> Self {
        self.issued_at = issued_at;
        self.valid_at = valid_at;
        self
    }

    /// True when the upstream reported no hazard features.
    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    /// Age of the snapshot relative to now.
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.fetched_at
    }

    /// Polygon counts per category, skipping categories with no polygons.
    pub fn category_counts(&self) -> BTreeMap<SeverityCategory, usize> {
        let mut counts = BTreeMap::new();
        for polygon in &self.polygons {
            *counts.entry(polygon.category).or_insert(0) += 1;
        }
        counts
    }
}
