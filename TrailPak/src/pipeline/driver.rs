//! Archive conversion driver

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;

use super::{
    ConversionOptions, ConversionPhase, ConversionProgress, ConversionProgressCallback,
    ConversionReport, ConversionResult, ConvertedAsset, EntryOutcome, SkipReason,
};
use crate::error::Result;
use crate::formats::pcx::{ImageVariant, decode_image};
use crate::formats::xmi::transcode;
use crate::gxl::integrity::{analyze, analyze_with_data};
use crate::gxl::{
    ArchiveTable, AssetFormat, ExtractedAsset, FileTableEntry, entry_formats, extract_entry,
    parse_archive,
};

/// Convert every entry of an archive held in memory
///
/// # Errors
/// Returns an error if the options are invalid or the archive header is
/// corrupt. Problems with individual entries are reported per entry.
pub fn convert_archive(data: &[u8], options: &ConversionOptions) -> Result<ConversionReport> {
    convert_archive_with_progress(data, options, &|_| {})
}

/// Convert every entry of an archive with progress callback
///
/// Outcomes are returned in table order whether or not conversion runs in
/// parallel.
///
/// # Errors
/// Returns an error if the options are invalid or the archive header is
/// corrupt.
pub fn convert_archive_with_progress(
    data: &[u8],
    options: &ConversionOptions,
    progress: ConversionProgressCallback,
) -> Result<ConversionReport> {
    options.validate()?;

    progress(&ConversionProgress::new(ConversionPhase::ParsingTable, 0, 1));
    let table = parse_archive(data)?;
    for diagnostic in &table.diagnostics {
        tracing::warn!(
            "Entry {} ({}): {}",
            diagnostic.index,
            diagnostic.name,
            diagnostic.kind.as_str()
        );
    }

    progress(&ConversionProgress::new(ConversionPhase::Analyzing, 0, 1));
    let integrity = if options.sniff_gaps {
        analyze_with_data(&table, data)
    } else {
        analyze(&table)
    };

    let formats = entry_formats(&table);
    let total = table.entries.len();
    let processed = AtomicUsize::new(0);

    let convert_one = |(entry, format): (&FileTableEntry, &AssetFormat)| {
        let current = processed.fetch_add(1, Ordering::SeqCst) + 1;
        progress(&ConversionProgress::with_entry(
            ConversionPhase::Converting,
            current,
            total,
            entry.name.clone(),
        ));
        convert_entry(data, &table, entry, format, options)
    };

    let outcomes: Vec<EntryOutcome> = if options.parallel {
        table
            .entries
            .par_iter()
            .zip(formats.par_iter())
            .map(convert_one)
            .collect()
    } else {
        table.entries.iter().zip(&formats).map(convert_one).collect()
    };

    progress(&ConversionProgress::new(ConversionPhase::Complete, total, total));

    let report = ConversionReport {
        header: table.header,
        archive_len: table.archive_len,
        outcomes,
        integrity,
    };
    tracing::info!(
        "Converted {} of {} entries ({} skipped, {} failed)",
        report.success_count(),
        total,
        report.skipped_count(),
        report.failed_count()
    );
    Ok(report)
}

/// Read an archive from disk and convert every entry
///
/// # Errors
/// Returns an error if the file cannot be read, the options are invalid or
/// the archive header is corrupt.
pub fn convert_archive_file<P: AsRef<Path>>(
    path: P,
    options: &ConversionOptions,
) -> Result<ConversionReport> {
    let path = path.as_ref();
    tracing::debug!("Reading archive {}", path.display());
    let data = std::fs::read(path)?;
    convert_archive(&data, options)
}

/// Convert a single extracted asset
#[must_use]
pub fn convert_asset(asset: &ExtractedAsset, options: &ConversionOptions) -> ConversionResult {
    if let Some(variant) = ImageVariant::from_format(asset.format) {
        if !options.decode_images {
            return ConversionResult::Skipped(SkipReason::Disabled);
        }
        return match decode_image(asset.data, variant) {
            Ok(image) => ConversionResult::Success(ConvertedAsset::Image(image)),
            Err(e) => {
                tracing::warn!("Failed to decode image {}: {}", asset.name, e);
                ConversionResult::Failed(e.into())
            }
        };
    }

    if *asset.format == AssetFormat::Music {
        if !options.decode_music {
            return ConversionResult::Skipped(SkipReason::Disabled);
        }
        return match transcode(asset.data, &options.xmi) {
            Ok(music) => match music.first_error() {
                Some(e) if music.all_failed() => {
                    tracing::warn!("Every song of {} failed: {}", asset.name, e);
                    ConversionResult::Failed(e.clone().into())
                }
                Some(e) => {
                    tracing::warn!(
                        "{} of {} songs in {} failed, first: {}",
                        music.failed_count(),
                        music.songs.len(),
                        asset.name,
                        e
                    );
                    ConversionResult::Success(ConvertedAsset::Music(music))
                }
                None => ConversionResult::Success(ConvertedAsset::Music(music)),
            },
            Err(e) => {
                tracing::warn!("Failed to transcode {}: {}", asset.name, e);
                ConversionResult::Failed(e.into())
            }
        };
    }

    tracing::debug!("No codec for {} ({})", asset.name, asset.format.as_str());
    ConversionResult::Skipped(SkipReason::NoCodec)
}

fn convert_entry(
    data: &[u8],
    table: &ArchiveTable,
    entry: &FileTableEntry,
    format: &AssetFormat,
    options: &ConversionOptions,
) -> EntryOutcome {
    let mut checksum = None;
    let result = if let Some(diagnostic) = table.diagnostic_for(entry.index) {
        ConversionResult::Skipped(diagnostic.kind.into())
    } else {
        match extract_entry(data, entry, format) {
            Ok(asset) => {
                if options.compute_checksums {
                    checksum = Some(asset.md5_hex());
                }
                convert_asset(&asset, options)
            }
            Err(e) => ConversionResult::Failed(e),
        }
    };

    EntryOutcome {
        index: entry.index,
        name: entry.name.clone(),
        offset: entry.offset,
        length: entry.length,
        format: format.clone(),
        checksum,
        result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, HeaderCorruption, ImageDecodeError};
    use crate::formats::pcx::{Palette, PixelBuffer, Rgb, encode_image};
    use crate::gxl::{DiagnosticKind, GxlWriter};
    use std::sync::Mutex;

    fn image_bytes() -> Vec<u8> {
        let pixels = PixelBuffer {
            width: 2,
            height: 2,
            bytes_per_scanline: 0,
            indices: vec![0, 1, 1, 0],
        };
        let palette = Palette {
            colors: vec![Rgb::new(0, 0, 0), Rgb::new(255, 255, 255)],
        };
        encode_image(ImageVariant::Colors256, &pixels, &palette).unwrap()
    }

    fn archive() -> Vec<u8> {
        GxlWriter::new()
            .with_file("TITLE.PC8", image_bytes())
            .with_file("BROKEN.PC8", vec![0x0A, 0x05])
            .with_file("README.TXT", b"hello".to_vec())
            .to_bytes()
            .unwrap()
    }

    #[test]
    fn test_outcomes_in_table_order() {
        let report = convert_archive(&archive(), &ConversionOptions::full()).unwrap();
        let names: Vec<_> = report.outcomes.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["TITLE.PC8", "BROKEN.PC8", "README.TXT"]);

        assert!(report.outcomes[0].result.is_success());
        assert!(matches!(
            report.outcomes[1].result,
            ConversionResult::Failed(Error::ImageDecode(ImageDecodeError::InvalidHeader { .. }))
        ));
        assert_eq!(
            report.outcomes[2].result.skip_reason(),
            Some(SkipReason::NoCodec)
        );
        assert_eq!(
            report.outcomes[2].checksum.as_deref(),
            Some("5d41402abc4b2a76b9719d911017c592")
        );
        assert_eq!(
            (report.success_count(), report.skipped_count(), report.failed_count()),
            (1, 1, 1)
        );
    }

    #[test]
    fn test_disabled_codecs_skip() {
        let options = ConversionOptions::new().with_checksums(false);
        let report = convert_archive(&archive(), &options).unwrap();
        assert_eq!(
            report.outcome("title.pc8").unwrap().result.skip_reason(),
            Some(SkipReason::Disabled)
        );
        assert!(report.outcomes.iter().all(|o| o.checksum.is_none()));
    }

    #[test]
    fn test_diagnosed_rows_skip() {
        let mut data = archive();
        data[crate::gxl::HEADER_SIZE] = 1;
        let report = convert_archive(&data, &ConversionOptions::full()).unwrap();
        assert_eq!(
            report.outcomes[0].result.skip_reason(),
            Some(SkipReason::Diagnostic(DiagnosticKind::UnsupportedPacking { method: 1 }))
        );
        assert_eq!(report.outcomes[0].checksum, None);
    }

    #[test]
    fn test_corrupt_header_aborts() {
        let mut data = archive();
        data[0] = 0;
        assert!(matches!(
            convert_archive(&data, &ConversionOptions::full()),
            Err(Error::CorruptHeader(HeaderCorruption::BadSignature { .. }))
        ));
    }

    #[test]
    fn test_progress_reports_every_entry() {
        let seen = Mutex::new(Vec::new());
        let callback = |p: &ConversionProgress| {
            seen.lock().unwrap().push((p.phase, p.current_entry.clone()));
        };
        convert_archive_with_progress(&archive(), &ConversionOptions::full(), &callback).unwrap();

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.first().map(|s| s.0), Some(ConversionPhase::ParsingTable));
        assert_eq!(seen.last().map(|s| s.0), Some(ConversionPhase::Complete));
        let converting = seen
            .iter()
            .filter(|s| s.0 == ConversionPhase::Converting)
            .count();
        assert_eq!(converting, 3);
    }

    #[test]
    fn test_invalid_options_rejected() {
        let options = ConversionOptions::full().with_max_delay_continuations(0);
        assert!(matches!(
            convert_archive(&archive(), &options),
            Err(Error::InvalidOptions { .. })
        ));
    }
}
