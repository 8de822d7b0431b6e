//! Separable Gaussian blur for RGBA overlays.
//!
//! Blurring happens on premultiplied f32 channels: straight-alpha blurring
//! would bleed the black of transparent pixels into category colors.
//! Quantization back to u8 happens once, with rounding, so a uniform region
//! keeps its exact color and alpha.

use image::RgbaImage;
use rayon::prelude::*;

/// Normalized 1-D Gaussian kernel truncated at `3 * sigma`.
pub fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    let radius = kernel_radius(sigma);
    let two_sigma_sq = 2.0 * sigma * sigma;

    let mut kernel: Vec<f32> = (-(radius as i64)..=radius as i64)
        .map(|i| (-((i * i) as f32) / two_sigma_sq).exp())
        .collect();
    let sum: f32 = kernel.iter().sum();
    for weight in &mut kernel {
        *weight /= sum;
    }
    kernel
}

/// Pixels of context the kernel reads on each side.
pub fn kernel_radius(sigma: f32) -> usize {
    (3.0 * sigma).ceil().max(1.0) as usize
}

/// Gaussian-blur an RGBA image; edges are clamped.
pub fn gaussian_blur_rgba(image: &RgbaImage, sigma: f32) -> RgbaImage {
    let width = image.width() as usize;
    let height = image.height() as usize;
    if sigma <= 0.0 || width == 0 || height == 0 {
        return image.clone();
    }

    let kernel = gaussian_kernel(sigma);
    let radius = (kernel.len() / 2) as i64;

    let premultiplied: Vec<[f32; 4]> = image
        .as_raw()
        .par_chunks_exact(4)
        .map(|p| {
            let a = p[3] as f32;
            let scale = a / 255.0;
            [p[0] as f32 * scale, p[1] as f32 * scale, p[2] as f32 * scale, a]
        })
        .collect();

    // Horizontal pass
    let mut horizontal = vec![[0.0f32; 4]; width * height];
    horizontal
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, out_row)| {
            let src_row = &premultiplied[y * width..(y + 1) * width];
            for (x, out) in out_row.iter_mut().enumerate() {
                let mut acc = [0.0f32; 4];
                for (k, &weight) in kernel.iter().enumerate() {
                    let sx = (x as i64 + k as i64 - radius).clamp(0, width as i64 - 1) as usize;
                    let src = &src_row[sx];
                    acc[0] += src[0] * weight;
                    acc[1] += src[1] * weight;
                    acc[2] += src[2] * weight;
                    acc[3] += src[3] * weight;
                }
                *out = acc;
            }
        });

    // Vertical pass, quantized straight into the output image
    let mut output = RgbaImage::new(width as u32, height as u32);
    output
        .par_chunks_mut(width * 4)
        .enumerate()
        .for_each(|(y, out_row)| {
            let mut acc_row = vec![[0.0f32; 4]; width];
            for (k, &weight) in kernel.iter().enumerate() {
                let sy = (y as i64 + k as i64 - radius).clamp(0, height as i64 - 1) as usize;
                let src_row = &horizontal[sy * width..(sy + 1) * width];
                for (acc, src) in acc_row.iter_mut().zip(src_row) {
                    acc[0] += src[0] * weight;
                    acc[1] += src[1] * weight;
                    acc[2] += src[2] * weight;
                    acc[3] += src[3] * weight;
                }
            }
            for (pixel, acc) in out_row.chunks_exact_mut(4).zip(&acc_row) {
                pixel.copy_from_slice(&unpremultiply(acc));
            }
        });

    output
}

/// Premultiplied f32 channels (alpha in 0..=255) to straight-alpha u8.
pub(crate) fn unpremultiply(p: &[f32; 4]) -> [u8; 4] {
    let alpha = p[3].round().clamp(0.0, 255.0);
    if alpha < 1.0 {
        return [0, 0, 0, 0];
    }
    let scale = 255.0 / p[3];
    [
        (p[0] * scale).round().clamp(0.0, 255.0) as u8,
        (p[1] * scale).round().clamp(0.0, 255.0) as u8,
        (p[2] * scale).round().clamp(0.0, 255.0) as u8,
        alpha as u8,
    ]
}
