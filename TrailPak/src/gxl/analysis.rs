//! Archive summary for reports
//!
//! Counts entries per format, sums payload sizes and reads image dimensions
//! straight from each image header without decoding pixel data.

use indexmap::IndexMap;
use serde::Serialize;

use super::integrity::{IntegrityReport, analyze_with_data};
use super::{ArchiveTable, AssetFormat, extractor::slice_entry};
use crate::error::Result;
use crate::formats::pcx::PcxHeader;

/// Entry count and payload size of one format
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FormatStats {
    pub count: usize,
    pub bytes: u64,
}

/// Aggregate image statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImageStats {
    /// Image entries whose header could be read
    pub count: usize,
    pub total_bytes: u64,
    pub average_bytes: f64,
    pub min_width: usize,
    pub max_width: usize,
    pub min_height: usize,
    pub max_height: usize,
}

/// Per-entry line of the summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntrySummary {
    pub index: usize,
    pub name: String,
    pub format: String,
    pub size: u64,
    /// Diagnostic kind, if the entry cannot be extracted
    pub diagnostic: Option<&'static str>,
    /// Image geometry from the header, for readable image entries
    pub image: Option<ImageGeometry>,
}

/// Geometry read from an image header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageGeometry {
    pub width: usize,
    pub height: usize,
    pub bits_per_pixel: u8,
    pub planes: u8,
}

/// Whole-archive summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArchiveSummary {
    pub label: String,
    pub version: u16,
    pub archive_len: u64,
    pub entry_count: usize,
    pub extractable_count: usize,
    /// Sum of the lengths of extractable entries
    pub total_payload_bytes: u64,
    /// Keyed by format label, in order of first appearance
    pub formats: IndexMap<String, FormatStats>,
    pub images: ImageStats,
    pub entries: Vec<EntrySummary>,
    pub integrity: IntegrityReport,
}

impl ArchiveSummary {
    /// Pretty-printed JSON
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Summarize an archive
///
/// `data` must be the buffer the table was parsed from.
#[must_use]
pub fn summarize(table: &ArchiveTable, data: &[u8]) -> ArchiveSummary {
    let mut formats: IndexMap<String, FormatStats> = IndexMap::new();
    let mut entries = Vec::with_capacity(table.entries.len());
    let mut geometries = Vec::new();
    let mut image_bytes = 0u64;
    let mut total_payload_bytes = 0u64;
    let mut extractable_count = 0;

    for entry in &table.entries {
        let format = AssetFormat::from_name(&entry.name);
        let diagnostic = table.diagnostic_for(entry.index).map(|d| d.kind.as_str());

        let stats = formats.entry(format_key(&format)).or_default();
        stats.count += 1;

        let mut image = None;
        if diagnostic.is_none() {
            extractable_count += 1;
            total_payload_bytes += entry.length;
            stats.bytes += entry.length;

            if matches!(format, AssetFormat::Image16 | AssetFormat::Image256) {
                image = slice_entry(data, entry)
                    .ok()
                    .and_then(|bytes| PcxHeader::parse(bytes).ok())
                    .map(|header| ImageGeometry {
                        width: header.width(),
                        height: header.height(),
                        bits_per_pixel: header.bits_per_pixel,
                        planes: header.planes,
                    });
                match image {
                    Some(geometry) => {
                        geometries.push(geometry);
                        image_bytes += entry.length;
                    }
                    None => tracing::debug!("Unreadable image header in {}", entry.name),
                }
            }
        }

        entries.push(EntrySummary {
            index: entry.index,
            name: entry.name.clone(),
            format: format_key(&format),
            size: entry.length,
            diagnostic,
            image,
        });
    }

    ArchiveSummary {
        label: table.header.label.clone(),
        version: table.header.version,
        archive_len: table.archive_len,
        entry_count: table.entries.len(),
        extractable_count,
        total_payload_bytes,
        formats,
        images: image_stats(&geometries, image_bytes),
        entries,
        integrity: analyze_with_data(table, data),
    }
}

/// Format label; unknown extensions keep their suffix
fn format_key(format: &AssetFormat) -> String {
    match format {
        AssetFormat::Other(ext) if !ext.is_empty() => format!("other:{}", ext.to_ascii_lowercase()),
        other => other.as_str().to_string(),
    }
}

#[allow(clippy::cast_precision_loss)]
fn image_stats(geometries: &[ImageGeometry], total_bytes: u64) -> ImageStats {
    if geometries.is_empty() {
        return ImageStats::default();
    }
    let widths = geometries.iter().map(|g| g.width);
    let heights = geometries.iter().map(|g| g.height);
    ImageStats {
        count: geometries.len(),
        total_bytes,
        average_bytes: total_bytes as f64 / geometries.len() as f64,
        min_width: widths.clone().min().unwrap_or(0),
        max_width: widths.max().unwrap_or(0),
        min_height: heights.clone().min().unwrap_or(0),
        max_height: heights.max().unwrap_or(0),
    }
}
