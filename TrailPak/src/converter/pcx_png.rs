//! Indexed image → RGBA / PNG
//!
//! SPDX-FileCopyrightText: 2025 `CyberDeco`
//!
//! SPDX-License-Identifier: MIT

#![allow(clippy::cast_possible_truncation)]

use image::{ImageBuffer, RgbaImage};

use crate::error::{Error, ImageDecodeError, Result};
use crate::formats::pcx::{ImageVariant, IndexedImage, decode_image};

/// Apply the palette to every pixel, producing packed RGBA
///
/// # Errors
/// Returns [`ImageDecodeError::PaletteIndexOutOfRange`] if a pixel refers past
/// the end of the palette.
pub fn indexed_to_rgba(image: &IndexedImage) -> Result<Vec<u8>> {
    let pixels = &image.pixels;
    let mut rgba = Vec::with_capacity(pixels.indices.len() * 4);

    for (i, &index) in pixels.indices.iter().enumerate() {
        let color = image.palette.get(index).ok_or(ImageDecodeError::PaletteIndexOutOfRange {
            x: i % pixels.width,
            y: i / pixels.width,
            index,
            palette_len: image.palette.len(),
        })?;
        rgba.extend_from_slice(&[color.r, color.g, color.b, 0xFF]);
    }

    Ok(rgba)
}

/// Render a decoded image as PNG bytes
///
/// # Errors
/// Returns an error if a pixel is outside the palette or PNG encoding fails.
pub fn indexed_to_png_bytes(image: &IndexedImage) -> Result<Vec<u8>> {
    let rgba = indexed_to_rgba(image)?;

    let img: RgbaImage = ImageBuffer::from_raw(image.width() as u32, image.height() as u32, rgba)
        .ok_or(Error::ImageBufferFailed)?;

    let mut png_data = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut png_data);
    img.write_with_encoder(encoder)
        .map_err(|e| Error::PngEncodeFailed {
            message: e.to_string(),
        })?;

    Ok(png_data)
}

/// Decode PCX bytes and render them as PNG bytes
///
/// # Errors
/// Returns an error if decoding or PNG encoding fails.
pub fn pcx_bytes_to_png_bytes(data: &[u8], variant: ImageVariant) -> Result<Vec<u8>> {
    let image = decode_image(data, variant)?;
    indexed_to_png_bytes(&image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::pcx::{Palette, PixelBuffer, Rgb, encode_image};

    fn two_color_image() -> IndexedImage {
        let pixels = PixelBuffer {
            width: 2,
            height: 2,
            bytes_per_scanline: 0,
            indices: vec![0, 1, 1, 0],
        };
        let palette = Palette {
            colors: vec![Rgb::new(0, 0, 0), Rgb::new(255, 128, 0)],
        };
        let data = encode_image(ImageVariant::Colors256, &pixels, &palette).unwrap();
        decode_image(&data, ImageVariant::Colors256).unwrap()
    }

    #[test]
    fn test_indexed_to_rgba() {
        let rgba = indexed_to_rgba(&two_color_image()).unwrap();
        assert_eq!(&rgba[..8], &[0, 0, 0, 255, 255, 128, 0, 255]);
        assert_eq!(rgba.len(), 16);
    }

    #[test]
    fn test_png_output_decodes() {
        let png = indexed_to_png_bytes(&two_color_image()).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");

        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (2, 2));
        assert_eq!(decoded.get_pixel(1, 0).0, [255, 128, 0, 255]);
    }

    #[test]
    fn test_rgba_rejects_out_of_palette_index() {
        let mut image = two_color_image();
        image.palette.colors.truncate(1);
        assert!(matches!(
            indexed_to_rgba(&image),
            Err(Error::ImageDecode(ImageDecodeError::PaletteIndexOutOfRange { x: 1, y: 0, .. }))
        ));
    }
}
