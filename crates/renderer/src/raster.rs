//! Vector-to-grid rasterization of hazard polygons.
//!
//! Every pixel takes the highest severity among the polygons covering its
//! geographic center. Each ring uses the even-odd ray-casting rule,
//! evaluated per scanline so each row only visits the columns between
//! boundary crossings.

use rayon::prelude::*;
use std::collections::BTreeMap;

use hazard_common::tile::{mercator_point_to_wgs84, mercator_to_wgs84};
use hazard_common::{BoundingBox, HazardPolygon, SeverityCategory};

/// One severity priority per pixel, row-major, top row first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityGrid {
    pub width: usize,
    pub height: usize,
    pub cells: Vec<u8>,
}

impl PriorityGrid {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![0; width * height],
        }
    }

    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.cells[y * self.width + x]
    }

    pub fn category_at(&self, x: usize, y: usize) -> SeverityCategory {
        SeverityCategory::from_priority(self.get(x, y))
    }

    /// True when no pixel is covered by any hazard.
    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(|&c| c == 0)
    }

    pub fn max_priority(&self) -> u8 {
        self.cells.iter().copied().max().unwrap_or(0)
    }
}

/// Geographic coordinates of the pixel centers of a Web Mercator canvas.
///
/// Longitude depends only on the column and latitude only on the row, so
/// both are precomputed once per canvas.
#[derive(Debug, Clone)]
pub struct PixelCenters {
    /// Longitude of each column center, increasing.
    pub lons: Vec<f64>,
    /// Latitude of each row center, decreasing (row 0 is north).
    pub lats: Vec<f64>,
}

impl PixelCenters {
    /// Pixel centers for `width` x `height` pixels over a Web Mercator bbox.
    pub fn new(mercator_bbox: &BoundingBox, width: usize, height: usize) -> Self {
        let dx = mercator_bbox.width() / width as f64;
        let dy = mercator_bbox.height() / height as f64;

        let lons = (0..width)
            .map(|col| {
                let mx = mercator_bbox.min_x + (col as f64 + 0.5) * dx;
                mercator_point_to_wgs84(mx, 0.0).0
            })
            .collect();
        let lats = (0..height)
            .map(|row| {
                let my = mercator_bbox.max_y - (row as f64 + 0.5) * dy;
                mercator_point_to_wgs84(0.0, my).1
            })
            .collect();

        Self { lons, lats }
    }

    pub fn pixel_center(&self, col: usize, row: usize) -> (f64, f64) {
        (self.lons[col], self.lats[row])
    }
}

struct PreparedPolygon<'a> {
    polygon: &'a HazardPolygon,
    min_lat: f64,
    max_lat: f64,
    /// Added to every longitude; nonzero for copies across the antimeridian.
    lon_offset: f64,
}

/// Whole-world longitude shifts tried for each polygon.
const WORLD_WRAPS: [f64; 3] = [0.0, -360.0, 360.0];

/// Rasterize hazard polygons onto a `width` x `height` grid covering
/// `mercator_bbox` (EPSG:3857 meters).
///
/// Categories are applied in ascending priority and a cell is only
/// overwritten by a strictly higher priority, so the result does not
/// depend on polygon order. A pixel is covered when its center is inside
/// the outer ring and outside every hole. Canvases that extend past
/// +/-180 degrees see polygons from the other side of the antimeridian.
pub fn rasterize(
    polygons: &[HazardPolygon],
    mercator_bbox: &BoundingBox,
    width: usize,
    height: usize,
) -> PriorityGrid {
    let mut grid = PriorityGrid::new(width, height);
    if width == 0 || height == 0 {
        return grid;
    }

    let centers = PixelCenters::new(mercator_bbox, width, height);
    let canvas_geo = mercator_to_wgs84(mercator_bbox);

    let mut by_category: BTreeMap<SeverityCategory, Vec<PreparedPolygon>> = BTreeMap::new();
    for polygon in polygons {
        if polygon.category.is_none() {
            continue;
        }
        let Some(bbox) = polygon.bbox() else {
            continue;
        };
        for lon_offset in WORLD_WRAPS {
            let shifted = BoundingBox::new(
                bbox.min_x + lon_offset,
                bbox.min_y,
                bbox.max_x + lon_offset,
                bbox.max_y,
            );
            if !touches(&shifted, &canvas_geo) {
                continue;
            }
            by_category
                .entry(polygon.category)
                .or_default()
                .push(PreparedPolygon {
                    polygon,
                    min_lat: bbox.min_y,
                    max_lat: bbox.max_y,
                    lon_offset,
                });
        }
    }

    for (category, group) in &by_category {
        let priority = category.priority();

        grid.cells
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(row, row_cells)| {
                let lat = centers.lats[row];
                let mut crossings: Vec<f64> = Vec::new();
                let mut outer_spans: Vec<(usize, usize)> = Vec::new();
                let mut hole_spans: Vec<(usize, usize)> = Vec::new();
                let mut covered = vec![false; width];

                for prepared in group {
                    if lat < prepared.min_lat || lat > prepared.max_lat {
                        continue;
                    }
                    let Some(outer) = prepared.polygon.outer() else {
                        continue;
                    };

                    ring_spans(
                        outer,
                        lat,
                        prepared.lon_offset,
                        &centers.lons,
                        &mut crossings,
                        &mut outer_spans,
                    );
                    if outer_spans.is_empty() {
                        continue;
                    }
                    for &(first, last) in &outer_spans {
                        covered[first..last].fill(true);
                    }

                    // Holes are cleared on their own, so a hole reaching past
                    // the outer ring or overlapping another hole never paints.
                    for hole in prepared.polygon.holes() {
                        ring_spans(
                            hole,
                            lat,
                            prepared.lon_offset,
                            &centers.lons,
                            &mut crossings,
                            &mut hole_spans,
                        );
                        for &(first, last) in &hole_spans {
                            covered[first..last].fill(false);
                        }
                    }

                    for &(first, last) in &outer_spans {
                        for col in first..last {
                            if covered[col] && priority > row_cells[col] {
                                row_cells[col] = priority;
                            }
                            covered[col] = false;
                        }
                    }
                }
            });
    }

    grid
}

/// Column ranges `[first, last)` whose centers lie inside `ring` on the
/// scanline at `lat`, by the even-odd rule.
fn ring_spans(
    ring: &[(f64, f64)],
    lat: f64,
    lon_offset: f64,
    lons: &[f64],
    crossings: &mut Vec<f64>,
    spans: &mut Vec<(usize, usize)>,
) {
    crossings.clear();
    spans.clear();
    ring_crossings(ring, lat, crossings);
    crossings.sort_by(|a, b| a.total_cmp(b));

    for span in crossings.chunks_exact(2) {
        let first = lons.partition_point(|&lon| lon < span[0] + lon_offset);
        let last = lons.partition_point(|&lon| lon < span[1] + lon_offset);
        if first < last {
            spans.push((first, last));
        }
    }
}

/// Closed-interval bbox overlap; zero-width extents still count.
fn touches(a: &BoundingBox, b: &BoundingBox) -> bool {
    a.min_x <= b.max_x && a.max_x >= b.min_x && a.min_y <= b.max_y && a.max_y >= b.min_y
}

/// Longitudes where the horizontal line at `lat` crosses the ring's edges.
///
/// Uses the same half-open edge rule as point ray casting, so a pixel is
/// inside exactly when an odd number of crossings lie east of it.
fn ring_crossings(ring: &[(f64, f64)], lat: f64, out: &mut Vec<f64>) {
    let n = ring.len();
    if n < 3 {
        return;
    }

    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = ring[i];
        let (xj, yj) = ring[j];

        if (yi > lat) != (yj > lat) {
            out.push((xj - xi) * (lat - yi) / (yj - yi) + xi);
        }
        j = i;
    }
}
