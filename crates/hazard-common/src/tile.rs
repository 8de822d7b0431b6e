//! XYZ tile addressing and spherical Web Mercator math.
//!
//! All tiles are addressed in the standard Google/OSM scheme (top-left
//! origin, 256 px tiles). No ellipsoidal correction is applied.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::{BoundingBox, HazardError, HazardResult};

/// Half the width of the Web Mercator world, in meters.
pub const WEB_MERCATOR_EXTENT: f64 = 20037508.34;

/// Equatorial circumference used for ground-resolution estimates.
pub const EARTH_CIRCUMFERENCE_KM: f64 = 40075.0;

/// Standard tile edge length in pixels.
pub const TILE_SIZE: u32 = 256;

/// Highest zoom level served.
pub const MAX_ZOOM: u32 = 12;

/// The severity product is only published three days out.
pub const MIN_DAY: u8 = 1;
pub const MAX_DAY: u8 = 3;

/// A validated tile request: forecast day plus z/x/y.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileAddress {
    pub day: u8,
    pub zoom: u32,
    pub x: u32,
    pub y: u32,
}

impl TileAddress {
    /// Build a tile address, rejecting out-of-range day or coordinates.
    pub fn new(day: u8, zoom: u32, x: u32, y: u32) -> HazardResult<Self> {
        validate_day(day)?;
        if zoom > MAX_ZOOM {
            return Err(HazardError::invalid(
                "z",
                format!("zoom {} outside 0..={}", zoom, MAX_ZOOM),
            ));
        }
        let n = 1u32 << zoom;
        if x >= n {
            return Err(HazardError::invalid(
                "x",
                format!("column {} outside 0..{} at zoom {}", x, n, zoom),
            ));
        }
        if y >= n {
            return Err(HazardError::invalid(
                "y",
                format!("row {} outside 0..{} at zoom {}", y, n, zoom),
            ));
        }
        Ok(Self { day, zoom, x, y })
    }

    /// Generate a cache key string.
    pub fn cache_key(&self) -> String {
        format!("d{}/{}/{}/{}", self.day, self.zoom, self.x, self.y)
    }

    /// Tile extent in Web Mercator meters.
    pub fn mercator_bbox(&self) -> BoundingBox {
        tile_to_mercator_bbox(self.zoom, self.x, self.y)
    }

    /// Tile extent in geographic degrees.
    pub fn geo_bbox(&self) -> BoundingBox {
        mercator_to_wgs84(&self.mercator_bbox())
    }
}

/// Check that a forecast day is one the upstream publishes.
pub fn validate_day(day: u8) -> HazardResult<()> {
    if (MIN_DAY..=MAX_DAY).contains(&day) {
        Ok(())
    } else {
        Err(HazardError::invalid(
            "day",
            format!("day {} outside {}..={}", day, MIN_DAY, MAX_DAY),
        ))
    }
}

/// Web Mercator bounds of tile `(zoom, x, y)`.
///
/// Each edge is computed from its own tile index so adjacent tiles share
/// bit-identical boundary coordinates.
pub fn tile_to_mercator_bbox(zoom: u32, x: u32, y: u32) -> BoundingBox {
    let n = (1u64 << zoom) as f64;
    let span = 2.0 * WEB_MERCATOR_EXTENT / n;

    let min_x = -WEB_MERCATOR_EXTENT + x as f64 * span;
    let max_x = -WEB_MERCATOR_EXTENT + (x + 1) as f64 * span;
    let max_y = WEB_MERCATOR_EXTENT - y as f64 * span;
    let min_y = WEB_MERCATOR_EXTENT - (y + 1) as f64 * span;

    BoundingBox::new(min_x, min_y, max_x, max_y)
}

/// Convert a Web Mercator (EPSG:3857) point to WGS84 (EPSG:4326) lon/lat.
pub fn mercator_point_to_wgs84(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / WEB_MERCATOR_EXTENT) * 180.0;
    let lat = (y / WEB_MERCATOR_EXTENT) * 180.0;
    let lat = 180.0 / PI * (2.0 * (lat * PI / 180.0).exp().atan() - PI / 2.0);
    (lon, lat)
}

/// Convert a WGS84 lon/lat to Web Mercator meters.
pub fn wgs84_point_to_mercator(lon: f64, lat: f64) -> (f64, f64) {
    let x = lon * WEB_MERCATOR_EXTENT / 180.0;
    let y = ((90.0 + lat) * PI / 360.0).tan().ln() / (PI / 180.0);
    (x, y * WEB_MERCATOR_EXTENT / 180.0)
}

/// Convert a Web Mercator bbox to a geographic bbox.
pub fn mercator_to_wgs84(bbox: &BoundingBox) -> BoundingBox {
    let (min_lon, min_lat) = mercator_point_to_wgs84(bbox.min_x, bbox.min_y);
    let (max_lon, max_lat) = mercator_point_to_wgs84(bbox.max_x, bbox.max_y);
    BoundingBox::new(min_lon, min_lat, max_lon, max_lat)
}

/// Ground distance covered by one 256 px tile pixel at the equator.
pub fn km_per_pixel(zoom: u32) -> f64 {
    EARTH_CIRCUMFERENCE_KM / (TILE_SIZE as f64 * (1u64 << zoom) as f64)
}

/// Gaussian sigma (in tile pixels) for a real-world smoothing radius.
///
/// Clamped to `[min_px, max_px]` so the blur neither vanishes at low zoom
/// nor explodes at high zoom.
pub fn blur_sigma_px(zoom: u32, radius_km: f64, min_px: f64, max_px: f64) -> f64 {
    (radius_km / km_per_pixel(zoom)).clamp(min_px, max_px)
}

// =============================================================================
// TileBufferConfig - pixel margin for blur context across tile edges
// =============================================================================

/// Configuration for rendering tiles with a pixel buffer margin.
///
/// The buffer gives the blur real neighbouring data beyond the tile edge.
/// Rendering the expanded canvas and cropping back makes adjacent tiles
/// agree at their shared boundary.
///
/// # Example
/// ```
/// use hazard_common::tile::TileBufferConfig;
///
/// let config = TileBufferConfig::new(12, 256);
/// assert_eq!(config.render_width(), 280);
///
/// let config = TileBufferConfig::no_buffer();
/// assert_eq!(config.render_width(), 256);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileBufferConfig {
    /// Buffer size in pixels on each side of the tile
    pub buffer_pixels: u32,
    /// Base tile size in pixels
    pub tile_size: u32,
}

impl Default for TileBufferConfig {
    fn default() -> Self {
        Self {
            buffer_pixels: 0,
            tile_size: TILE_SIZE,
        }
    }
}

impl TileBufferConfig {
    pub fn new(buffer_pixels: u32, tile_size: u32) -> Self {
        Self {
            buffer_pixels,
            tile_size,
        }
    }

    /// No buffer.
    pub fn no_buffer() -> Self {
        Self::default()
    }

    /// Total render width including buffer on both sides.
    pub fn render_width(&self) -> u32 {
        self.tile_size + 2 * self.buffer_pixels
    }

    /// Total render height including buffer on both sides.
    pub fn render_height(&self) -> u32 {
        self.tile_size + 2 * self.buffer_pixels
    }

    /// Expand a tile bbox by the buffer margin.
    ///
    /// The bbox must be in a space that is linear in pixels (Web Mercator
    /// meters for XYZ tiles) so the buffer stays on the global pixel grid.
    pub fn expanded_bbox(&self, tile_bbox: &BoundingBox) -> BoundingBox {
        if self.buffer_pixels == 0 {
            return *tile_bbox;
        }

        let units_per_pixel_x = tile_bbox.width() / self.tile_size as f64;
        let units_per_pixel_y = tile_bbox.height() / self.tile_size as f64;

        tile_bbox.expand(
            self.buffer_pixels as f64 * units_per_pixel_x,
            self.buffer_pixels as f64 * units_per_pixel_y,
        )
    }

    /// Crop the center tile from an expanded RGBA pixel buffer.
    pub fn crop_to_tile(&self, expanded_pixels: &[u8]) -> Vec<u8> {
        if self.buffer_pixels == 0 {
            return expanded_pixels.to_vec();
        }

        let render_width = self.render_width() as usize;
        let tile_size = self.tile_size as usize;
        let buffer = self.buffer_pixels as usize;

        let mut result = vec![0u8; tile_size * tile_size * 4];

        for row in 0..tile_size {
            let src_y = buffer + row;
            let src_start = (src_y * render_width + buffer) * 4;
            let src_end = src_start + tile_size * 4;

            let dst_start = row * tile_size * 4;
            let dst_end = dst_start + tile_size * 4;

            if src_end <= expanded_pixels.len() {
                result[dst_start..dst_end].copy_from_slice(&expanded_pixels[src_start..src_end]);
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_address_validation() {
        assert!(TileAddress::new(1, 4, 4, 5).is_ok());
        assert!(TileAddress::new(0, 4, 4, 5).is_err());
        assert!(TileAddress::new(4, 4, 4, 5).is_err());
        assert!(TileAddress::new(1, 13, 0, 0).is_err());
        assert!(TileAddress::new(1, 4, 16, 0).is_err());
        assert!(TileAddress::new(1, 4, 0, 16).is_err());
        assert!(TileAddress::new(3, 0, 0, 0).is_ok());
        assert!(TileAddress::new(2, 12, 4095, 4095).is_ok());
    }

    #[test]
    fn test_zoom0_covers_world() {
        let bbox = tile_to_mercator_bbox(0, 0, 0);
        assert_eq!(bbox.min_x, -WEB_MERCATOR_EXTENT);
        assert_eq!(bbox.max_x, WEB_MERCATOR_EXTENT);

        let geo = mercator_to_wgs84(&bbox);
        assert!((geo.min_x + 180.0).abs() < 1e-9);
        assert!((geo.max_x - 180.0).abs() < 1e-9);
        assert!((geo.max_y - 85.0511).abs() < 1e-3);
        assert!((geo.min_y + 85.0511).abs() < 1e-3);
    }

    #[test]
    fn test_mercator_roundtrip() {
        for &(lon, lat) in &[(-97.5, 35.2), (0.0, 0.0), (150.0, -60.0)] {
            let (x, y) = wgs84_point_to_mercator(lon, lat);
            let (lon2, lat2) = mercator_point_to_wgs84(x, y);
            assert!((lon - lon2).abs() < 1e-9);
            assert!((lat - lat2).abs() < 1e-9);
        }
    }

    #[test]
    fn test_blur_sigma_clamped() {
        assert_eq!(blur_sigma_px(0, 40.0, 1.0, 30.0), 1.0);
        assert_eq!(blur_sigma_px(12, 40.0, 1.0, 30.0), 30.0);
        let z4 = blur_sigma_px(4, 40.0, 1.0, 30.0);
        assert!((z4 - 40.0 / km_per_pixel(4)).abs() < 1e-12);
    }

    #[test]
    fn test_tile_buffer_config_expanded_bbox() {
        let config = TileBufferConfig::new(64, 256);
        let tile_bbox = BoundingBox::new(0.0, 0.0, 256.0, 256.0);

        let expanded = config.expanded_bbox(&tile_bbox);
        assert_eq!(expanded, BoundingBox::new(-64.0, -64.0, 320.0, 320.0));
        assert_eq!(TileBufferConfig::no_buffer().expanded_bbox(&tile_bbox), tile_bbox);
    }

    #[test]
    fn test_tile_buffer_config_crop() {
        let config = TileBufferConfig::new(50, 256);

        let render_w = config.render_width() as usize;
        let render_h = config.render_height() as usize;
        let mut expanded = vec![0u8; render_w * render_h * 4];

        for y in 50..(50 + 256) {
            for x in 50..(50 + 256) {
                let idx = (y * render_w + x) * 4;
                expanded[idx..idx + 4].copy_from_slice(&[255, 255, 255, 255]);
            }
        }

        let cropped = config.crop_to_tile(&expanded);
        assert_eq!(cropped.len(), 256 * 256 * 4);
        for chunk in cropped.chunks(4) {
            assert_eq!(chunk, &[255, 255, 255, 255]);
        }
    }
}
