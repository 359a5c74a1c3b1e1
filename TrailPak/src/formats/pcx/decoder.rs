//! PCX image decoder

use super::rle::decode_scanline;
use super::{
    HEADER_SIZE, ImageVariant, IndexedImage, PALETTE_MARKER, Palette, PcxHeader, PixelBuffer,
    VGA_PALETTE_SIZE,
};
use crate::error::ImageDecodeError;

/// Decode an image of the given variant into palette indices
///
/// The palette is located before any pixel data is decoded, so a missing
/// 256-color palette marker is reported as
/// [`ImageDecodeError::PaletteMarkerNotFound`] even when the pixel data is
/// truncated too.
///
/// # Errors
/// Returns an [`ImageDecodeError`] describing the first problem found.
pub fn decode_image(data: &[u8], variant: ImageVariant) -> Result<IndexedImage, ImageDecodeError> {
    let header = PcxHeader::parse(data)?;
    if !variant.supports_layout(header.bits_per_pixel, header.planes) {
        return Err(ImageDecodeError::UnsupportedLayout {
            bits_per_pixel: header.bits_per_pixel,
            planes: header.planes,
        });
    }

    let (palette, pixel_end) = match variant {
        ImageVariant::Colors16 => (header.header_palette(), data.len()),
        ImageVariant::Colors256 => {
            let marker_at = trailing_palette_offset(data)?;
            let palette = Palette::from_rgb_bytes(&data[marker_at + 1..]);
            (palette, marker_at)
        }
    };

    let width = header.width();
    let height = header.height();
    let stream = &data[..pixel_end];
    let mut line = vec![0u8; header.scanline_len()];
    let mut indices = Vec::with_capacity(width * height);
    let mut offset = HEADER_SIZE;

    for y in 0..height {
        offset = decode_scanline(stream, offset, &mut line, y)?;
        let row_start = indices.len();
        unpack_row(&header, &line, width, &mut indices);

        if let Some((x, &index)) = indices[row_start..]
            .iter()
            .enumerate()
            .find(|&(_, &index)| usize::from(index) >= palette.len())
        {
            return Err(ImageDecodeError::PaletteIndexOutOfRange {
                x,
                y,
                index,
                palette_len: palette.len(),
            });
        }
    }

    if offset < stream.len() {
        tracing::debug!(
            "{} trailing bytes after image data",
            stream.len() - offset
        );
    }

    Ok(IndexedImage {
        variant,
        pixels: PixelBuffer {
            width,
            height,
            bytes_per_scanline: header.scanline_len(),
            indices,
        },
        palette,
        header,
    })
}

/// Offset of the `0x0C` marker that precedes the 768-byte palette
fn trailing_palette_offset(data: &[u8]) -> Result<usize, ImageDecodeError> {
    let tail = VGA_PALETTE_SIZE + 1;
    let Some(marker_at) = data.len().checked_sub(tail).filter(|&at| at >= HEADER_SIZE) else {
        return Err(ImageDecodeError::PaletteMarkerNotFound {
            expected_offset: data.len().saturating_sub(tail),
            found: None,
        });
    };
    match data[marker_at] {
        PALETTE_MARKER => Ok(marker_at),
        other => Err(ImageDecodeError::PaletteMarkerNotFound {
            expected_offset: marker_at,
            found: Some(other),
        }),
    }
}

/// Combine one decoded scan line into `width` palette indices
fn unpack_row(header: &PcxHeader, line: &[u8], width: usize, out: &mut Vec<u8>) {
    let bytes_per_line = usize::from(header.bytes_per_line);
    match (header.bits_per_pixel, header.planes) {
        (8, 1) => out.extend_from_slice(&line[..width]),
        (4, 1) => out.extend((0..width).map(|x| {
            let byte = line[x / 2];
            if x % 2 == 0 { byte >> 4 } else { byte & 0x0F }
        })),
        (1, planes) => out.extend((0..width).map(|x| {
            let shift = 7 - (x % 8);
            (0..usize::from(planes)).fold(0u8, |index, plane| {
                let bit = (line[plane * bytes_per_line + x / 8] >> shift) & 1;
                index | (bit << plane)
            })
        })),
        // Layout already validated against the variant
        _ => out.resize(out.len() + width, 0),
    }
}
