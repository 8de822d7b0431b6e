//! Tile render pipeline: rasterize, colorize, blur, crop, downsample, encode.

use image::RgbaImage;
use tracing::debug;

use crate::blur::gaussian_blur_rgba;
use crate::colorize::colorize;
use crate::downsample::downsample_area;
use crate::png::{create_png_auto, transparent_tile_png};
use crate::raster::rasterize;
use hazard_common::tile::{blur_sigma_px, TILE_SIZE};
use hazard_common::{HazardError, HazardPolygon, HazardResult, TileAddress, TileBufferConfig};

/// Render-time constants.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    /// Output tile edge in pixels.
    pub tile_size: u32,
    /// Alpha applied to every covered pixel before blurring.
    pub fill_alpha: u8,
    /// Real-world blur radius in kilometers.
    pub smoothing_radius_km: f64,
    pub min_sigma_px: f64,
    pub max_sigma_px: f64,
    /// Blur is skipped at or below this sigma.
    pub sigma_floor_px: f64,
    /// Upper bound on the supersample factor (1 disables supersampling).
    pub max_supersample: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            tile_size: TILE_SIZE,
            fill_alpha: 180,
            smoothing_radius_km: 40.0,
            min_sigma_px: 1.0,
            max_sigma_px: 30.0,
            sigma_floor_px: 0.5,
            max_supersample: 4,
        }
    }
}

impl RenderConfig {
    /// Supersample factor for a zoom level: 4x up to z3, 2x up to z5.
    pub fn supersample_for_zoom(&self, zoom: u32) -> u32 {
        let factor = match zoom {
            0..=3 => 4,
            4..=5 => 2,
            _ => 1,
        };
        factor.min(self.max_supersample.max(1))
    }

    /// Blur sigma in output pixels.
    pub fn sigma_for_zoom(&self, zoom: u32) -> f64 {
        blur_sigma_px(
            zoom,
            self.smoothing_radius_km,
            self.min_sigma_px,
            self.max_sigma_px,
        )
    }

    /// Output pixels of context needed on each side for the blur.
    pub fn buffer_for_zoom(&self, zoom: u32) -> u32 {
        let sigma = self.sigma_for_zoom(zoom);
        if sigma <= self.sigma_floor_px {
            0
        } else {
            (3.0 * sigma).ceil() as u32
        }
    }
}

/// A rendered tile ready for caching.
#[derive(Debug, Clone)]
pub struct RenderedTileImage {
    pub png: Vec<u8>,
    /// Blur sigma in output pixels (0 when the blur was skipped).
    pub sigma_px: f64,
    pub supersample: u32,
    /// False when no polygon reached the canvas.
    pub has_coverage: bool,
}

/// Render one tile of hazard polygons to PNG.
pub fn render_tile(
    polygons: &[HazardPolygon],
    address: &TileAddress,
    config: &RenderConfig,
) -> HazardResult<RenderedTileImage> {
    let supersample = config.supersample_for_zoom(address.zoom);
    let sigma = config.sigma_for_zoom(address.zoom);
    let applied_sigma = if sigma > config.sigma_floor_px { sigma } else { 0.0 };

    let png = match render_tile_rgba(polygons, address, config)? {
        Some(image) => {
            let (width, height) = image.dimensions();
            create_png_auto(image.as_raw(), width as usize, height as usize)?
        }
        None => {
            return Ok(RenderedTileImage {
                png: transparent_tile_png(config.tile_size as usize)?,
                sigma_px: applied_sigma,
                supersample,
                has_coverage: false,
            })
        }
    };

    Ok(RenderedTileImage {
        png,
        sigma_px: applied_sigma,
        supersample,
        has_coverage: true,
    })
}

/// Render one tile to straight-alpha RGBA at output resolution.
///
/// Returns `None` when no polygon covers any pixel of the expanded canvas.
pub fn render_tile_rgba(
    polygons: &[HazardPolygon],
    address: &TileAddress,
    config: &RenderConfig,
) -> HazardResult<Option<RgbaImage>> {
    if config.tile_size == 0 {
        return Err(HazardError::RenderFailure("tile size must be positive".into()));
    }

    let scale = config.supersample_for_zoom(address.zoom);
    let sigma = config.sigma_for_zoom(address.zoom);
    let buffer = config.buffer_for_zoom(address.zoom);

    // Supersampled canvas, buffer included, on the global pixel grid.
    let buffer_config = TileBufferConfig::new(buffer * scale, config.tile_size * scale);
    let canvas_bbox = buffer_config.expanded_bbox(&address.mercator_bbox());
    let width = buffer_config.render_width() as usize;
    let height = buffer_config.render_height() as usize;

    let grid = rasterize(polygons, &canvas_bbox, width, height);
    if grid.is_empty() {
        debug!(tile = %address.cache_key(), "no coverage on canvas");
        return Ok(None);
    }

    let mut canvas = colorize(&grid, config.fill_alpha);
    if buffer > 0 {
        canvas = gaussian_blur_rgba(&canvas, (sigma * scale as f64) as f32);
    }

    let cropped = buffer_config.crop_to_tile(canvas.as_raw());
    let tile_px = config.tile_size * scale;
    let cropped = RgbaImage::from_raw(tile_px, tile_px, cropped)
        .ok_or_else(|| HazardError::RenderFailure("crop produced a short buffer".into()))?;

    let output = downsample_area(&cropped, scale);

    debug!(
        tile = %address.cache_key(),
        canvas = width,
        supersample = scale,
        sigma = sigma,
        "rendered tile"
    );

    Ok(Some(output))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hazard_common::SeverityCategory;

    fn rect(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> HazardPolygon {
        HazardPolygon::new(
            SeverityCategory::Major,
            vec![vec![
                (min_lon, min_lat),
                (max_lon, min_lat),
                (max_lon, max_lat),
                (min_lon, max_lat),
            ]],
        )
    }

    #[test]
    fn test_supersample_thresholds() {
        let config = RenderConfig::default();
        assert_eq!(config.supersample_for_zoom(0), 4);
        assert_eq!(config.supersample_for_zoom(3), 4);
        assert_eq!(config.supersample_for_zoom(4), 2);
        assert_eq!(config.supersample_for_zoom(5), 2);
        assert_eq!(config.supersample_for_zoom(6), 1);

        let capped = RenderConfig {
            max_supersample: 1,
            ..RenderConfig::default()
        };
        assert_eq!(capped.supersample_for_zoom(0), 1);
    }

    #[test]
    fn test_buffer_covers_three_sigma() {
        let config = RenderConfig::default();
        for zoom in 0..=12 {
            let sigma = config.sigma_for_zoom(zoom);
            assert!(config.buffer_for_zoom(zoom) as f64 >= 3.0 * sigma);
        }
    }

    #[test]
    fn test_empty_polygons_give_transparent_tile() {
        let address = TileAddress::new(1, 6, 10, 20).unwrap();
        let rendered = render_tile(&[], &address, &RenderConfig::default()).unwrap();
        assert!(!rendered.has_coverage);
        assert_eq!(
            rendered.png,
            transparent_tile_png(256).unwrap()
        );
    }

    #[test]
    fn test_output_is_tile_sized() {
        let address = TileAddress::new(2, 3, 1, 2).unwrap();
        let polygons = vec![rect(-110.0, 30.0, -90.0, 45.0)];
        let image = render_tile_rgba(&polygons, &address, &RenderConfig::default())
            .unwrap()
            .unwrap();
        assert_eq!(image.dimensions(), (256, 256));
    }
}
