//! Priority grid to RGBA conversion.

use image::{Rgba, RgbaImage};
use rayon::prelude::*;

use crate::raster::PriorityGrid;
use hazard_common::SeverityCategory;

/// Paint each covered cell with its category color at `alpha`.
///
/// Uncovered cells stay fully transparent (0, 0, 0, 0).
pub fn colorize(grid: &PriorityGrid, alpha: u8) -> RgbaImage {
    let mut image = RgbaImage::new(grid.width as u32, grid.height as u32);

    image
        .par_chunks_mut(4)
        .zip(grid.cells.par_iter())
        .for_each(|(pixel, &priority)| {
            if priority != 0 {
                let (r, g, b) = SeverityCategory::from_priority(priority).color();
                pixel.copy_from_slice(&[r, g, b, alpha]);
            }
        });

    image
}

/// The RGBA value a covered cell of `category` receives.
pub fn category_rgba(category: SeverityCategory, alpha: u8) -> Rgba<u8> {
    if category.is_none() {
        return Rgba([0, 0, 0, 0]);
    }
    let (r, g, b) = category.color();
    Rgba([r, g, b, alpha])
}
