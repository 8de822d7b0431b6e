//! Hazard overlay rendering.
//!
//! Turns hazard polygons into a blurred, colorized PNG tile:
//! - Scanline rasterization to a per-pixel priority grid
//! - Category colorization with a fixed fill alpha
//! - Distance-calibrated Gaussian blur over a buffered canvas
//! - Crop, area-average downsample and PNG encoding

pub mod blur;
pub mod colorize;
pub mod downsample;
pub mod pipeline;
pub mod png;
pub mod raster;

pub use pipeline::{render_tile, render_tile_rgba, RenderConfig, RenderedTileImage};
pub use raster::{rasterize, PriorityGrid};
