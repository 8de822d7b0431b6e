//! Raster reclassification source.
//!
//! Used when the polygon query endpoint is unavailable: the day's layer is
//! exported as a PNG over a fixed geographic extent, each pixel is bucketed
//! to the nearest category color, and runs of equal pixels become rectangle
//! polygons. The export requests EPSG:4326 so pixel columns and rows are
//! linear in longitude and latitude.

use async_trait::async_trait;
use image::RgbaImage;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use crate::source::{DayLayers, HazardSource};
use hazard_common::{BoundingBox, HazardError, HazardPolygon, HazardResult, HazardSnapshot, SeverityCategory};

/// Continental US extent covered by the export.
pub const CONUS_EXTENT: BoundingBox = BoundingBox {
    min_x: -125.0,
    min_y: 24.0,
    max_x: -66.0,
    max_y: 50.0,
};

/// Pixels with alpha below this are treated as empty.
const MIN_ALPHA: u8 = 32;

/// Largest RGB distance still matched to a category color.
const MAX_COLOR_DISTANCE: u32 = 80;

/// Fetches a pre-rendered layer image and reclassifies it.
pub struct RasterHazardSource {
    client: Client,
    base_url: String,
    layers: DayLayers,
    extent: BoundingBox,
    width: u32,
    height: u32,
}

impl RasterHazardSource {
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
            extent: CONUS_EXTENT,
            width: 1180,
            height: 520,
        })
    }

    /// Export URL for a layer over the configured extent.
    pub fn export_url(&self, layer: u32) -> String {
        format!(
            "{}/export?bbox={},{},{},{}&bboxSR=4326&imageSR=4326&size={},{}&format=png32&transparent=true&layers=show:{}&f=image",
            self.base_url,
            self.extent.min_x,
            self.extent.min_y,
            self.extent.max_x,
            self.extent.max_y,
            self.width,
            self.height,
            layer
        )
    }
}

#[async_trait]
impl HazardSource for RasterHazardSource {
    #[instrument(skip(self), fields(source = "raster"))]
    async fn fetch(&self, day: u8) -> HazardResult<HazardSnapshot> {
        let layer = self.layers.layer_for(day)?;
        let url = self.export_url(layer);
        let started = Instant::now();

        debug!(url = %url, "Exporting hazard layer image");

        let response = self.client.get(&url).send().await.map_err(|e| {
            warn!(url = %url, error = %e, "Hazard export failed");
            HazardError::UpstreamFetchFailed(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status = %status, "Hazard export returned error status");
            return Err(HazardError::UpstreamFetchFailed(format!("{} returned {}", url, status)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| HazardError::UpstreamFetchFailed(format!("reading body: {}", e)))?;

        let image = image::load_from_memory(&body)
            .map_err(|e| HazardError::UpstreamParse(format!("export image: {}", e)))?
            .to_rgba8();
        let polygons = reclassify_image(&image, &self.extent);

        info!(
            day = day,
            layer = layer,
            bytes = body.len(),
            polygons = polygons.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Reclassified hazard layer image"
        );

        Ok(HazardSnapshot::new(day, polygons))
    }

    fn name(&self) -> &'static str {
        "raster"
    }
}

/// Nearest category for an RGBA pixel, `None` for empty or unknown colors.
pub fn nearest_category(pixel: [u8; 4]) -> SeverityCategory {
    if pixel[3] < MIN_ALPHA {
        return SeverityCategory::None;
    }

    let mut best = SeverityCategory::None;
    let mut best_distance = MAX_COLOR_DISTANCE * MAX_COLOR_DISTANCE;
    for category in SeverityCategory::ALL {
        if category.is_none() {
            continue;
        }
        let (r, g, b) = category.color();
        let distance = sq_diff(pixel[0], r) + sq_diff(pixel[1], g) + sq_diff(pixel[2], b);
        if distance <= best_distance {
            best = category;
            best_distance = distance;
        }
    }
    best
}

fn sq_diff(a: u8, b: u8) -> u32 {
    let d = a as i32 - b as i32;
    (d * d) as u32
}

/// Open rectangle while scanning rows: columns `[start, end)` from `top_row`.
struct OpenRect {
    start: u32,
    end: u32,
    category: SeverityCategory,
    top_row: u32,
}

/// Convert a classified image into rectangle polygons.
///
/// Each row is split into runs of one category; a run identical to one in
/// the previous row extends that rectangle downward instead of starting a
/// new one.
pub fn reclassify_image(image: &RgbaImage, extent: &BoundingBox) -> Vec<HazardPolygon> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let lon_per_px = extent.width() / width as f64;
    let lat_per_px = extent.height() / height as f64;
    let to_polygon = |rect: &OpenRect, bottom_row: u32| {
        let west = extent.min_x + rect.start as f64 * lon_per_px;
        let east = extent.min_x + rect.end as f64 * lon_per_px;
        let north = extent.max_y - rect.top_row as f64 * lat_per_px;
        let south = extent.max_y - bottom_row as f64 * lat_per_px;
        HazardPolygon::new(
            rect.category,
            vec![vec![(west, south), (east, south), (east, north), (west, north), (west, south)]],
        )
    };

    let mut polygons = Vec::new();
    let mut open: Vec<OpenRect> = Vec::new();

    for row in 0..height {
        let runs = row_runs(image, row);
        let mut next_open = Vec::with_capacity(runs.len());

        for (start, end, category) in runs {
            let continued = open
                .iter()
                .position(|r| r.start == start && r.end == end && r.category == category);
            match continued {
                Some(index) => next_open.push(open.swap_remove(index)),
                None => next_open.push(OpenRect {
                    start,
                    end,
                    category,
                    top_row: row,
                }),
            }
        }

        // Anything not continued ends at this row's top edge.
        polygons.extend(open.iter().map(|rect| to_polygon(rect, row)));
        open = next_open;
    }
    polygons.extend(open.iter().map(|rect| to_polygon(rect, height)));

    polygons
}

/// Runs of equal non-`None` category in one row, as `(start, end, category)`.
fn row_runs(image: &RgbaImage, row: u32) -> Vec<(u32, u32, SeverityCategory)> {
    let mut runs = Vec::new();
    let mut current: Option<(u32, SeverityCategory)> = None;

    for col in 0..image.width() {
        let category = nearest_category(image.get_pixel(col, row).0);
        match current {
            Some((_, open)) if open == category => {}
            Some((start, open)) => {
                if !open.is_none() {
                    runs.push((start, col, open));
                }
                current = Some((col, category));
            }
            None => current = Some((col, category)),
        }
    }
    if let Some((start, open)) = current {
        if !open.is_none() {
            runs.push((start, image.width(), open));
        }
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn color(category: SeverityCategory) -> Rgba<u8> {
        let (r, g, b) = category.color();
        Rgba([r, g, b, 255])
    }

    #[test]
    fn test_nearest_category() {
        assert_eq!(nearest_category([232, 44, 38, 255]), SeverityCategory::Major);
        assert_eq!(nearest_category([230, 40, 40, 10]), SeverityCategory::None);
        // Far from every category color.
        assert_eq!(nearest_category([0, 0, 0, 255]), SeverityCategory::None);
    }

    #[test]
    fn test_block_becomes_one_rectangle() {
        let mut image = RgbaImage::new(10, 10);
        for y in 2..6 {
            for x in 3..8 {
                image.put_pixel(x, y, color(SeverityCategory::Moderate));
            }
        }
        let extent = BoundingBox::new(0.0, 0.0, 10.0, 10.0);

        let polygons = reclassify_image(&image, &extent);
        assert_eq!(polygons.len(), 1);
        let polygon = &polygons[0];
        assert_eq!(polygon.category, SeverityCategory::Moderate);
        let bbox = polygon.bbox().unwrap();
        assert_eq!(
            (bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y),
            (3.0, 4.0, 8.0, 8.0)
        );
        assert!(polygon.contains(5.0, 6.0));
        assert!(!polygon.contains(5.0, 2.0));
    }

    #[test]
    fn test_adjacent_categories_split() {
        let mut image = RgbaImage::new(4, 1);
        image.put_pixel(0, 0, color(SeverityCategory::Minor));
        image.put_pixel(1, 0, color(SeverityCategory::Minor));
        image.put_pixel(2, 0, color(SeverityCategory::Extreme));
        let extent = BoundingBox::new(0.0, 0.0, 4.0, 1.0);

        let polygons = reclassify_image(&image, &extent);
        assert_eq!(polygons.len(), 2);
        assert!(polygons.iter().any(|p| p.category == SeverityCategory::Minor));
        assert!(polygons.iter().any(|p| p.category == SeverityCategory::Extreme));
    }

    #[test]
    fn test_export_url() {
        let source = RasterHazardSource::new(
            "https://example.test/MapServer",
            DayLayers::default(),
            Duration::from_secs(1),
        )
        .unwrap();
        let url = source.export_url(3);
        assert!(url.starts_with("https://example.test/MapServer/export?bbox=-125,24,-66,50"));
        assert!(url.ends_with("layers=show:3&f=image"));
    }
}
