//! PNG encoding for hazard overlay tiles.
//!
//! Two encoding modes:
//! - **Indexed PNG (color type 3)**: used when the tile has at most 256
//!   distinct RGBA values. Hard-edged and empty tiles always qualify.
//! - **RGBA PNG (color type 6)**: fallback for blurred tiles, whose soft
//!   edges usually carry more alpha levels than a palette can hold.

use std::collections::HashMap;
use std::io::Write;

use hazard_common::{HazardError, HazardResult};

/// Maximum colors for indexed PNG (PNG8)
const MAX_PALETTE_SIZE: usize = 256;

const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

type PaletteEntry = (u8, u8, u8, u8);

/// Encode RGBA pixels, choosing indexed output when the palette fits.
///
/// `pixels` must hold exactly `width * height * 4` bytes.
pub fn create_png_auto(pixels: &[u8], width: usize, height: usize) -> HazardResult<Vec<u8>> {
    check_len(pixels, width, height, 4)?;

    match extract_palette(pixels) {
        Some((palette, indices)) => create_png_indexed(width, height, &palette, &indices),
        None => create_png(pixels, width, height),
    }
}

/// A fully transparent `size` x `size` tile.
///
/// This is the fallback body for every failure path, so it is encoded once
/// by callers and reused.
pub fn transparent_tile_png(size: usize) -> HazardResult<Vec<u8>> {
    let indices = vec![0u8; size * size];
    create_png_indexed(size, size, &[(0, 0, 0, 0)], &indices)
}

#[inline(always)]
fn pack_color(p: &[u8]) -> u32 {
    u32::from_le_bytes([p[0], p[1], p[2], p[3]])
}

/// Palette plus one index per pixel, or `None` past 256 distinct colors.
fn extract_palette(pixels: &[u8]) -> Option<(Vec<PaletteEntry>, Vec<u8>)> {
    let mut color_to_index: HashMap<u32, u8> = HashMap::with_capacity(MAX_PALETTE_SIZE);
    let mut palette: Vec<PaletteEntry> = Vec::with_capacity(MAX_PALETTE_SIZE);
    let mut indices: Vec<u8> = Vec::with_capacity(pixels.len() / 4);

    for chunk in pixels.chunks_exact(4) {
        let packed = pack_color(chunk);

        let index = match color_to_index.get(&packed) {
            Some(&idx) => idx,
            None => {
                if palette.len() >= MAX_PALETTE_SIZE {
                    return None;
                }
                let idx = palette.len() as u8;
                palette.push((chunk[0], chunk[1], chunk[2], chunk[3]));
                color_to_index.insert(packed, idx);
                idx
            }
        };
        indices.push(index);
    }

    Some((palette, indices))
}

/// Create an indexed PNG (color type 3) from palette and indices.
pub fn create_png_indexed(
    width: usize,
    height: usize,
    palette: &[PaletteEntry],
    indices: &[u8],
) -> HazardResult<Vec<u8>> {
    check_len(indices, width, height, 1)?;
    if palette.is_empty() || palette.len() > MAX_PALETTE_SIZE {
        return Err(HazardError::RenderFailure(format!(
            "palette size {} out of range",
            palette.len()
        )));
    }

    let mut png = Vec::new();
    png.extend_from_slice(&PNG_SIGNATURE);
    write_chunk(&mut png, b"IHDR", &ihdr(width, height, 3));

    let plte_data: Vec<u8> = palette.iter().flat_map(|&(r, g, b, _)| [r, g, b]).collect();
    write_chunk(&mut png, b"PLTE", &plte_data);

    // tRNS only when some entry is not opaque
    if palette.iter().any(|&(_, _, _, a)| a < 255) {
        let trns_data: Vec<u8> = palette.iter().map(|&(_, _, _, a)| a).collect();
        write_chunk(&mut png, b"tRNS", &trns_data);
    }

    let idat_data = deflate_scanlines(indices, width, height)?;
    write_chunk(&mut png, b"IDAT", &idat_data);
    write_chunk(&mut png, b"IEND", &[]);

    Ok(png)
}

/// Create a PNG image from RGBA pixel data (color type 6).
pub fn create_png(pixels: &[u8], width: usize, height: usize) -> HazardResult<Vec<u8>> {
    check_len(pixels, width, height, 4)?;

    let mut png = Vec::new();
    png.extend_from_slice(&PNG_SIGNATURE);
    write_chunk(&mut png, b"IHDR", &ihdr(width, height, 6));

    let idat_data = deflate_scanlines(pixels, width * 4, height)?;
    write_chunk(&mut png, b"IDAT", &idat_data);
    write_chunk(&mut png, b"IEND", &[]);

    Ok(png)
}

fn check_len(data: &[u8], width: usize, height: usize, bytes_per_pixel: usize) -> HazardResult<()> {
    let expected = width * height * bytes_per_pixel;
    if width == 0 || height == 0 || data.len() != expected {
        return Err(HazardError::RenderFailure(format!(
            "image buffer is {} bytes, expected {} for {}x{}",
            data.len(),
            expected,
            width,
            height
        )));
    }
    Ok(())
}

fn ihdr(width: usize, height: usize, color_type: u8) -> Vec<u8> {
    let mut data = Vec::with_capacity(13);
    data.extend_from_slice(&(width as u32).to_be_bytes());
    data.extend_from_slice(&(height as u32).to_be_bytes());
    data.push(8); // bit depth
    data.push(color_type);
    data.push(0); // compression method
    data.push(0); // filter method
    data.push(0); // interlace method
    data
}

/// Write a PNG chunk: length, type, data, CRC over type and data.
fn write_chunk(png: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(chunk_type);
    png.extend_from_slice(data);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(data);
    png.extend_from_slice(&hasher.finalize().to_be_bytes());
}

/// Zlib-compress scanlines of `row_bytes` each, prefixed with filter type 0.
fn deflate_scanlines(data: &[u8], row_bytes: usize, height: usize) -> HazardResult<Vec<u8>> {
    let mut uncompressed = Vec::with_capacity(height * (1 + row_bytes));
    for row in data.chunks_exact(row_bytes).take(height) {
        uncompressed.push(0);
        uncompressed.extend_from_slice(row);
    }

    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::fast());
    encoder
        .write_all(&uncompressed)
        .and_then(|_| encoder.finish())
        .map_err(|e| HazardError::RenderFailure(format!("IDAT compression failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_palette_simple() {
        let pixels = [
            255, 0, 0, 255, //
            0, 255, 0, 255, //
            0, 0, 0, 0, //
            255, 0, 0, 255,
        ];

        let (palette, indices) = extract_palette(&pixels).unwrap();
        assert_eq!(palette.len(), 3);
        assert_eq!(indices, vec![0, 1, 2, 0]);
        assert!(palette.iter().any(|&(_, _, _, a)| a == 0));
    }

    #[test]
    fn test_palette_overflow() {
        let pixels: Vec<u8> = (0..300u32).flat_map(|i| [i as u8, (i / 256) as u8, 0, 255]).collect();
        assert!(extract_palette(&pixels).is_none());
        let png = create_png_auto(&pixels, 300, 1).unwrap();
        // IHDR color type byte
        assert_eq!(png[25], 6);
    }

    #[test]
    fn test_transparent_tile_signature_and_type() {
        let png = transparent_tile_png(256).unwrap();
        assert_eq!(&png[0..8], &PNG_SIGNATURE);
        assert_eq!(&png[12..16], b"IHDR");
        assert_eq!(png[25], 3);
    }

    #[test]
    fn test_wrong_buffer_length_rejected() {
        let err = create_png(&[0u8; 10], 2, 2).unwrap_err();
        assert!(matches!(err, HazardError::RenderFailure(_)));
    }
}
