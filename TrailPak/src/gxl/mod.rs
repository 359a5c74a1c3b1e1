//! SPDX-FileCopyrightText: 2025 CyberDeco
//!
//! SPDX-License-Identifier: MIT
//!
//! GXL library archive reader/writer
//!
//! GXL files are Genus Microprogramming graphics libraries: a fixed 128-byte
//! header, a table of 26-byte rows (8.3 name, offset, length, DOS timestamp),
//! and the raw payloads. The table parser is strict about the header and
//! tolerant about individual rows.

pub mod analysis;
mod extractor;
pub mod integrity;
mod reader;
mod types;
mod writer;

pub use extractor::{AssetFormat, ExtractedAsset, entry_formats, extract_all, extract_entry};
pub use reader::{GxlReader, parse_archive};
pub use types::*;
pub use writer::GxlWriter;

/// GXL signature bytes
pub const SIGNATURE: [u8; 2] = [0x01, 0xCA];

/// Size of the fixed archive header; the file table starts right after it
pub const HEADER_SIZE: usize = 128;

/// Size of one file table row
pub const TABLE_ENTRY_SIZE: usize = 26;

/// Length of the copyright field in the header
pub const COPYRIGHT_LENGTH: usize = 50;

/// Length of the label field in the header
pub const LABEL_LENGTH: usize = 40;

/// Length of the base name field in a table row
pub const NAME_LENGTH: usize = 8;

/// Length of the extension field in a table row (dot, three chars, NUL)
pub const EXTENSION_LENGTH: usize = 5;

/// Offset of the entry count in the header
pub(crate) const ENTRY_COUNT_OFFSET: usize = 94;

/// Packing method for stored (uncompressed) entries
pub const PACKING_STORED: u8 = 0;
