//! PCX image encoder
//!
//! Writes 256-color images as 8 bpp with a trailing palette and 16-color
//! images as 4 EGA bit planes with the palette in the header.

use super::rle::encode_scanline;
use super::{
    ENCODING_RLE, HEADER_PALETTE_SIZE, ImageVariant, MAX_DIMENSION, PALETTE_MARKER, Palette,
    PcxHeader, PixelBuffer, VERSION,
};
use crate::error::{Error, Result};

/// Encode palette indices as a PCX image of the given variant
///
/// # Errors
/// Returns [`Error::ImageEncodeFailed`] if the dimensions, the palette size
/// or any index do not fit the variant.
pub fn encode_image(variant: ImageVariant, pixels: &PixelBuffer, palette: &Palette) -> Result<Vec<u8>> {
    validate(variant, pixels, palette)?;

    let (bits_per_pixel, planes, bytes_per_line) = match variant {
        ImageVariant::Colors256 => (8, 1, pixels.width.next_multiple_of(2)),
        ImageVariant::Colors16 => (1, 4, pixels.width.div_ceil(8).next_multiple_of(2)),
    };

    let mut header_palette = [0u8; HEADER_PALETTE_SIZE];
    if variant == ImageVariant::Colors16 {
        header_palette.copy_from_slice(&palette.to_rgb_bytes(16));
    }

    let header = PcxHeader {
        version: VERSION,
        encoding: ENCODING_RLE,
        bits_per_pixel,
        x_min: 0,
        y_min: 0,
        x_max: (pixels.width - 1) as u16,
        y_max: (pixels.height - 1) as u16,
        h_dpi: pixels.width as u16,
        v_dpi: pixels.height as u16,
        header_palette,
        planes,
        bytes_per_line: bytes_per_line as u16,
        palette_type: 1,
    };

    let mut out = header.to_bytes().to_vec();
    let mut line = vec![0u8; bytes_per_line * usize::from(planes)];

    for y in 0..pixels.height {
        line.fill(0);
        pack_row(variant, pixels.row(y), bytes_per_line, &mut line);
        out.extend_from_slice(&encode_scanline(&line));
    }

    if variant == ImageVariant::Colors256 {
        out.push(PALETTE_MARKER);
        out.extend_from_slice(&palette.to_rgb_bytes(256));
    }

    Ok(out)
}

fn validate(variant: ImageVariant, pixels: &PixelBuffer, palette: &Palette) -> Result<()> {
    let fail = |message: String| Err(Error::ImageEncodeFailed { message });

    if !(1..=MAX_DIMENSION).contains(&pixels.width) || !(1..=MAX_DIMENSION).contains(&pixels.height) {
        return fail(format!("{}x{} is out of range", pixels.width, pixels.height));
    }
    if pixels.indices.len() != pixels.width * pixels.height {
        return fail(format!(
            "{} indices for a {}x{} image",
            pixels.indices.len(),
            pixels.width,
            pixels.height
        ));
    }
    if palette.is_empty() || palette.len() > variant.palette_len() {
        return fail(format!(
            "palette has {} colors, variant holds up to {}",
            palette.len(),
            variant.palette_len()
        ));
    }
    if let Some(&index) = pixels.indices.iter().find(|&&i| usize::from(i) >= palette.len()) {
        return fail(format!(
            "index {index} outside a {}-color palette",
            palette.len()
        ));
    }
    Ok(())
}

/// Lay one row of indices out in the variant's scan-line format
fn pack_row(variant: ImageVariant, row: &[u8], bytes_per_line: usize, line: &mut [u8]) {
    match variant {
        ImageVariant::Colors256 => line[..row.len()].copy_from_slice(row),
        ImageVariant::Colors16 => {
            for (x, &index) in row.iter().enumerate() {
                for plane in 0..4 {
                    let bit = (index >> plane) & 1;
                    line[plane * bytes_per_line + x / 8] |= bit << (7 - (x % 8));
                }
            }
        }
    }
}
