//! PCX-family indexed-color images (`.256`, `.PC8`, `.16`, `.PC4`)
//!
//! Every image starts with a fixed 128-byte header followed by run-length
//! compressed scan lines. 16-color images carry their palette inside the
//! header; 256-color images append it after a `0x0C` marker at the very end
//! of the stream.
//!
//! Decoded pixels stay palette indices. Turning them into RGB is left to
//! [`crate::converter`].
//!
//! SPDX-FileCopyrightText: 2025 `CyberDeco`
//!
//! SPDX-License-Identifier: MIT

#![allow(clippy::cast_possible_truncation)]

mod decoder;
pub mod encoder;
pub mod rle;

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt};
use serde::Serialize;
use std::io::Cursor;

use crate::error::ImageDecodeError;
use crate::gxl::AssetFormat;

pub use decoder::decode_image;
pub use encoder::encode_image;

/// Size of the fixed image header
pub const HEADER_SIZE: usize = 128;

/// Manufacturer byte every image starts with
pub const MANUFACTURER: u8 = 0x0A;

/// Version byte written by the encoder (3.0 with palette)
pub const VERSION: u8 = 5;

/// Encoding byte for run-length compressed data
pub const ENCODING_RLE: u8 = 1;

/// Marker preceding the trailing 256-color palette
pub const PALETTE_MARKER: u8 = 0x0C;

/// Size of the trailing 256-color palette
pub const VGA_PALETTE_SIZE: usize = 768;

/// Offset of the 16-color palette inside the header
pub const HEADER_PALETTE_OFFSET: usize = 16;

/// Size of the 16-color header palette
pub const HEADER_PALETTE_SIZE: usize = 48;

/// Largest width or height accepted
pub const MAX_DIMENSION: usize = 4096;

/// Which image family an entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ImageVariant {
    /// 16 colors, palette in the header
    Colors16,
    /// 256 colors, palette appended after the pixel data
    Colors256,
}

impl ImageVariant {
    /// Image variant of an asset format, if it is an image
    #[must_use]
    pub fn from_format(format: &AssetFormat) -> Option<Self> {
        match format {
            AssetFormat::Image16 => Some(Self::Colors16),
            AssetFormat::Image256 => Some(Self::Colors256),
            _ => None,
        }
    }

    /// Number of palette entries this variant carries
    #[must_use]
    pub fn palette_len(self) -> usize {
        match self {
            Self::Colors16 => 16,
            Self::Colors256 => 256,
        }
    }

    /// Whether `bits_per_pixel` x `planes` is a layout this variant uses
    #[must_use]
    pub fn supports_layout(self, bits_per_pixel: u8, planes: u8) -> bool {
        match self {
            Self::Colors16 => matches!((bits_per_pixel, planes), (1, 4) | (4, 1) | (8, 1)),
            Self::Colors256 => (bits_per_pixel, planes) == (8, 1),
        }
    }
}

/// RGB palette color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Ordered list of at most 256 colors
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Palette {
    pub colors: Vec<Rgb>,
}

impl Palette {
    /// Build a palette from packed RGB triplets (a trailing partial triplet is ignored)
    #[must_use]
    pub fn from_rgb_bytes(bytes: &[u8]) -> Self {
        let colors = bytes
            .chunks_exact(3)
            .take(256)
            .map(|c| Rgb::new(c[0], c[1], c[2]))
            .collect();
        Self { colors }
    }

    /// Packed RGB triplets, padded with black up to `len` colors
    #[must_use]
    pub fn to_rgb_bytes(&self, len: usize) -> Vec<u8> {
        let mut bytes: Vec<u8> = self
            .colors
            .iter()
            .take(len)
            .flat_map(|c| [c.r, c.g, c.b])
            .collect();
        bytes.resize(len * 3, 0);
        bytes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: u8) -> Option<Rgb> {
        self.colors.get(usize::from(index)).copied()
    }
}

/// Parsed fixed image header
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PcxHeader {
    pub version: u8,
    pub encoding: u8,
    pub bits_per_pixel: u8,
    pub x_min: u16,
    pub y_min: u16,
    pub x_max: u16,
    pub y_max: u16,
    pub h_dpi: u16,
    pub v_dpi: u16,
    /// 16-color palette stored in the header
    #[serde(skip)]
    pub header_palette: [u8; HEADER_PALETTE_SIZE],
    pub planes: u8,
    /// Bytes per scan line of a single plane (includes padding)
    pub bytes_per_line: u16,
    pub palette_type: u16,
}

impl PcxHeader {
    /// Parse and validate the header geometry
    ///
    /// Only the fields shared by every variant are checked here; the
    /// bit depth / plane layout is checked against the variant by the decoder.
    ///
    /// # Errors
    /// Returns [`ImageDecodeError::InvalidHeader`] on a short buffer, a wrong
    /// manufacturer or encoding byte, or impossible dimensions.
    pub fn parse(data: &[u8]) -> Result<Self, ImageDecodeError> {
        if data.len() < HEADER_SIZE {
            return Err(invalid_header(format!(
                "{} bytes, header needs {HEADER_SIZE}",
                data.len()
            )));
        }
        let eof = |_| invalid_header("header truncated".to_string());

        let mut cursor = Cursor::new(&data[..HEADER_SIZE]);
        let manufacturer = cursor.read_u8().map_err(eof)?;
        if manufacturer != MANUFACTURER {
            return Err(invalid_header(format!(
                "manufacturer byte 0x{manufacturer:02X}, expected 0x0A"
            )));
        }
        let version = cursor.read_u8().map_err(eof)?;
        let encoding = cursor.read_u8().map_err(eof)?;
        if encoding != ENCODING_RLE {
            return Err(invalid_header(format!("encoding {encoding} is not RLE")));
        }
        let bits_per_pixel = cursor.read_u8().map_err(eof)?;
        let x_min = cursor.read_u16::<LittleEndian>().map_err(eof)?;
        let y_min = cursor.read_u16::<LittleEndian>().map_err(eof)?;
        let x_max = cursor.read_u16::<LittleEndian>().map_err(eof)?;
        let y_max = cursor.read_u16::<LittleEndian>().map_err(eof)?;
        let h_dpi = cursor.read_u16::<LittleEndian>().map_err(eof)?;
        let v_dpi = cursor.read_u16::<LittleEndian>().map_err(eof)?;

        let mut header_palette = [0u8; HEADER_PALETTE_SIZE];
        header_palette.copy_from_slice(
            &data[HEADER_PALETTE_OFFSET..HEADER_PALETTE_OFFSET + HEADER_PALETTE_SIZE],
        );
        // reserved byte at 64
        cursor.set_position(65);
        let planes = cursor.read_u8().map_err(eof)?;
        let bytes_per_line = cursor.read_u16::<LittleEndian>().map_err(eof)?;
        let palette_type = cursor.read_u16::<LittleEndian>().map_err(eof)?;

        let header = Self {
            version,
            encoding,
            bits_per_pixel,
            x_min,
            y_min,
            x_max,
            y_max,
            h_dpi,
            v_dpi,
            header_palette,
            planes,
            bytes_per_line,
            palette_type,
        };
        header.validate_geometry()?;
        Ok(header)
    }

    fn validate_geometry(&self) -> Result<(), ImageDecodeError> {
        if self.x_max < self.x_min || self.y_max < self.y_min {
            return Err(invalid_header(format!(
                "window ({}, {})..({}, {}) is inverted",
                self.x_min, self.y_min, self.x_max, self.y_max
            )));
        }
        let (width, height) = (self.width(), self.height());
        if width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(invalid_header(format!(
                "{width}x{height} exceeds {MAX_DIMENSION}x{MAX_DIMENSION}"
            )));
        }
        if self.planes == 0 || self.bits_per_pixel == 0 {
            return Err(invalid_header("zero planes or bit depth".to_string()));
        }
        let line_bits = usize::from(self.bytes_per_line) * 8;
        if line_bits < width * usize::from(self.bits_per_pixel) {
            return Err(invalid_header(format!(
                "{} bytes per line cannot hold {width} pixels at {} bpp",
                self.bytes_per_line, self.bits_per_pixel
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn width(&self) -> usize {
        usize::from(self.x_max) - usize::from(self.x_min) + 1
    }

    #[must_use]
    pub fn height(&self) -> usize {
        usize::from(self.y_max) - usize::from(self.y_min) + 1
    }

    /// Length of one decoded scan line across all planes
    #[must_use]
    pub fn scanline_len(&self) -> usize {
        usize::from(self.bytes_per_line) * usize::from(self.planes)
    }

    /// Palette stored in the header (16 colors)
    #[must_use]
    pub fn header_palette(&self) -> Palette {
        Palette::from_rgb_bytes(&self.header_palette)
    }

    /// Serialize to the fixed 128-byte layout
    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0] = MANUFACTURER;
        bytes[1] = self.version;
        bytes[2] = self.encoding;
        bytes[3] = self.bits_per_pixel;
        LittleEndian::write_u16(&mut bytes[4..6], self.x_min);
        LittleEndian::write_u16(&mut bytes[6..8], self.y_min);
        LittleEndian::write_u16(&mut bytes[8..10], self.x_max);
        LittleEndian::write_u16(&mut bytes[10..12], self.y_max);
        LittleEndian::write_u16(&mut bytes[12..14], self.h_dpi);
        LittleEndian::write_u16(&mut bytes[14..16], self.v_dpi);
        bytes[HEADER_PALETTE_OFFSET..HEADER_PALETTE_OFFSET + HEADER_PALETTE_SIZE]
            .copy_from_slice(&self.header_palette);
        // Byte 64 is reserved
        bytes[65] = self.planes;
        LittleEndian::write_u16(&mut bytes[66..68], self.bytes_per_line);
        LittleEndian::write_u16(&mut bytes[68..70], self.palette_type);
        bytes
    }
}

fn invalid_header(reason: String) -> ImageDecodeError {
    ImageDecodeError::InvalidHeader { reason }
}

/// Grid of palette indices with scan-line padding removed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    pub width: usize,
    pub height: usize,
    /// Decoded scan line length in the source stream (all planes, with padding)
    pub bytes_per_scanline: usize,
    /// `width * height` indices, row-major
    pub indices: Vec<u8>,
}

impl PixelBuffer {
    /// Palette index at (`x`, `y`)
    #[must_use]
    pub fn get(&self, x: usize, y: usize) -> Option<u8> {
        (x < self.width && y < self.height).then(|| self.indices[y * self.width + x])
    }

    /// One row of indices
    #[must_use]
    pub fn row(&self, y: usize) -> &[u8] {
        &self.indices[y * self.width..(y + 1) * self.width]
    }
}

/// Decoded indexed-color image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedImage {
    pub variant: ImageVariant,
    pub header: PcxHeader,
    pub palette: Palette,
    pub pixels: PixelBuffer,
}

impl IndexedImage {
    #[must_use]
    pub fn width(&self) -> usize {
        self.pixels.width
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.pixels.height
    }
}
