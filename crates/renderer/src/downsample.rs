//! Box-filter reduction of supersampled canvases.

use image::RgbaImage;
use rayon::prelude::*;

use crate::blur::unpremultiply;

/// Downsample an RGBA image by an integer `factor`.
///
/// Each output pixel is the mean of a `factor` x `factor` block, averaged in
/// premultiplied space so transparent pixels do not darken the result.
/// Output dimensions are rounded down for sizes that are not a multiple of
/// `factor`.
pub fn downsample_area(image: &RgbaImage, factor: u32) -> RgbaImage {
    if factor <= 1 {
        return image.clone();
    }

    let new_width = image.width() / factor;
    let new_height = image.height() / factor;
    let mut output = RgbaImage::new(new_width, new_height);
    if new_width == 0 || new_height == 0 {
        return output;
    }

    let block = (factor * factor) as f32;
    output
        .par_chunks_mut(new_width as usize * 4)
        .enumerate()
        .for_each(|(out_y, out_row)| {
            for (out_x, pixel) in out_row.chunks_exact_mut(4).enumerate() {
                let mut acc = [0.0f32; 4];
                for dy in 0..factor {
                    for dx in 0..factor {
                        let p = image.get_pixel(out_x as u32 * factor + dx, out_y as u32 * factor + dy);
                        let a = p[3] as f32;
                        let scale = a / 255.0;
                        acc[0] += p[0] as f32 * scale;
                        acc[1] += p[1] as f32 * scale;
                        acc[2] += p[2] as f32 * scale;
                        acc[3] += a;
                    }
                }
                for channel in &mut acc {
                    *channel /= block;
                }
                pixel.copy_from_slice(&unpremultiply(&acc));
            }
        });

    output
}
