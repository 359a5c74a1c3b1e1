//! # TrailPak
//!
//! A pure-Rust library for the asset files of The Oregon Trail for DOS.
//!
//! ## Supported Formats
//!
//! - **GXL archives** - Parse, list, extract and build Genus graphics libraries
//! - **PCX images** - 16- and 256-color run-length encoded images
//! - **XMIDI music** - Extended MIDI containers with one or more songs
//! - **PNG/MIDI** - Export of decoded images and songs
//!
//! ## Quick Start
//!
//! ### Working with GXL Archives
//!
//! ```no_run
//! use trailpak::gxl::GxlReader;
//!
//! // List contents of an archive
//! let reader = GxlReader::open("OREGON.GXL")?;
//! println!("Found {} files", reader.list().len());
//!
//! // Read a specific file without extracting
//! let data = reader.read_file_bytes("TITLE.PC8")?;
//! # Ok::<(), trailpak::Error>(())
//! ```
//!
//! ### Converting a Whole Archive
//!
//! ```no_run
//! use trailpak::pipeline::{ConversionOptions, convert_archive_file};
//!
//! let report = convert_archive_file("OREGON.GXL", &ConversionOptions::full())?;
//! for (outcome, error) in report.failures() {
//!     eprintln!("{}: {}", outcome.name, error);
//! }
//! # Ok::<(), trailpak::Error>(())
//! ```
//!
//! ### Using the Prelude
//!
//! ```
//! use trailpak::prelude::*;
//!
//! // Now you have access to:
//! // - GxlReader, GxlWriter, parse_archive, ArchiveTable
//! // - decode_image, transcode and their types
//! // - ConversionOptions, convert_archive, ConversionReport
//! // - Error, Result, and more
//! ```

pub mod converter;
pub mod error;
pub mod formats;
pub mod gxl;
pub mod pipeline;

// Re-exports for convenience
pub use error::{Error, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::error::{
        Error, HeaderCorruption, ImageDecodeError, MusicDecodeError, Result,
    };

    // Archive access
    pub use crate::gxl::analysis::{ArchiveSummary, summarize};
    pub use crate::gxl::integrity::{IntegrityReport, analyze, analyze_with_data};
    pub use crate::gxl::{
        ArchiveTable, AssetFormat, DiagnosticKind, ExtractedAsset, FileTableEntry, GxlReader,
        GxlWriter, parse_archive,
    };

    // Codecs
    pub use crate::formats::pcx::{
        ImageVariant, IndexedImage, Palette, PixelBuffer, Rgb, decode_image, encode_image,
    };
    pub use crate::formats::xmi::{
        MusicAsset, MusicEvent, MusicSequence, SongOutcome, TimedEvent, XmiOptions, transcode,
    };

    // Conversion
    pub use crate::converter;
    pub use crate::pipeline::{
        ConversionOptions, ConversionReport, ConversionResult, ConvertedAsset, EntryOutcome,
        SkipReason, convert_archive, convert_archive_file, convert_asset,
    };
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
