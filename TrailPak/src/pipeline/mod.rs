//! SPDX-FileCopyrightText: 2025 `CyberDeco`
//!
//! SPDX-License-Identifier: MIT
//!
//! Whole-archive conversion
//!
//! Parses the table, runs the integrity analyzer and hands every row to the
//! matching codec. Each row produces exactly one [`EntryOutcome`]; a failing
//! entry never stops its siblings.

mod driver;
mod options;

pub use driver::{convert_archive, convert_archive_file, convert_archive_with_progress, convert_asset};
pub use options::ConversionOptions;

use crate::error::Error;
use crate::formats::pcx::IndexedImage;
use crate::formats::xmi::MusicAsset;
use crate::gxl::integrity::IntegrityReport;
use crate::gxl::{ArchiveHeader, AssetFormat, DiagnosticKind};

// ============================================================================
// Outcome Types
// ============================================================================

/// A decoded asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvertedAsset {
    Image(IndexedImage),
    Music(MusicAsset),
}

impl ConvertedAsset {
    #[must_use]
    pub fn as_image(&self) -> Option<&IndexedImage> {
        match self {
            Self::Image(image) => Some(image),
            Self::Music(_) => None,
        }
    }

    #[must_use]
    pub fn as_music(&self) -> Option<&MusicAsset> {
        match self {
            Self::Music(music) => Some(music),
            Self::Image(_) => None,
        }
    }
}

/// Why an entry was not converted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The table row itself is unusable
    Diagnostic(DiagnosticKind),
    /// No codec exists for the format
    NoCodec,
    /// The codec is switched off in the options
    Disabled,
}

impl SkipReason {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Diagnostic(kind) => kind.as_str(),
            Self::NoCodec => "no_codec",
            Self::Disabled => "disabled",
        }
    }
}

impl From<DiagnosticKind> for SkipReason {
    fn from(kind: DiagnosticKind) -> Self {
        Self::Diagnostic(kind)
    }
}

/// Result of converting one entry
#[derive(Debug)]
pub enum ConversionResult {
    Success(ConvertedAsset),
    Skipped(SkipReason),
    Failed(Error),
}

impl ConversionResult {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    #[must_use]
    pub fn asset(&self) -> Option<&ConvertedAsset> {
        match self {
            Self::Success(asset) => Some(asset),
            _ => None,
        }
    }

    #[must_use]
    pub fn skip_reason(&self) -> Option<SkipReason> {
        match self {
            Self::Skipped(reason) => Some(*reason),
            _ => None,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&Error> {
        match self {
            Self::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Outcome of one table row
#[derive(Debug)]
pub struct EntryOutcome {
    /// Row number in the table
    pub index: usize,
    pub name: String,
    pub offset: u64,
    pub length: u64,
    pub format: AssetFormat,
    /// MD5 of the payload, when checksums are enabled and the payload is readable
    pub checksum: Option<String>,
    pub result: ConversionResult,
}

/// Outcomes of a whole archive, in table order
#[derive(Debug)]
pub struct ConversionReport {
    pub header: ArchiveHeader,
    pub archive_len: u64,
    pub outcomes: Vec<EntryOutcome>,
    pub integrity: IntegrityReport,
}

impl ConversionReport {
    /// Number of converted entries
    #[must_use]
    pub fn success_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_success()).count()
    }

    /// Number of skipped entries
    #[must_use]
    pub fn skipped_count(&self) -> usize {
        self.skipped().count()
    }

    /// Number of failed entries
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.failures().count()
    }

    /// Converted entries with their assets
    pub fn successes(&self) -> impl Iterator<Item = (&EntryOutcome, &ConvertedAsset)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.asset().map(|asset| (o, asset)))
    }

    /// Skipped entries with the reason
    pub fn skipped(&self) -> impl Iterator<Item = (&EntryOutcome, SkipReason)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.skip_reason().map(|reason| (o, reason)))
    }

    /// Failed entries with their error
    pub fn failures(&self) -> impl Iterator<Item = (&EntryOutcome, &Error)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.error().map(|e| (o, e)))
    }

    /// Look up an outcome by entry name (case-insensitive)
    #[must_use]
    pub fn outcome(&self, name: &str) -> Option<&EntryOutcome> {
        self.outcomes
            .iter()
            .find(|o| o.name.eq_ignore_ascii_case(name))
    }
}

// ============================================================================
// Progress Types
// ============================================================================

/// Progress callback type for archive conversion
pub type ConversionProgressCallback<'a> = &'a (dyn Fn(&ConversionProgress) + Sync + Send);

/// Progress information during archive conversion
#[derive(Debug, Clone)]
pub struct ConversionProgress {
    /// Current operation phase
    pub phase: ConversionPhase,
    /// Current item number (1-indexed)
    pub current: usize,
    /// Total number of items
    pub total: usize,
    /// Entry being processed (if applicable)
    pub current_entry: Option<String>,
}

impl ConversionProgress {
    /// Create a new progress update
    #[must_use]
    pub fn new(phase: ConversionPhase, current: usize, total: usize) -> Self {
        Self {
            phase,
            current,
            total,
            current_entry: None,
        }
    }

    /// Create a progress update with an entry name
    #[must_use]
    pub fn with_entry(
        phase: ConversionPhase,
        current: usize,
        total: usize,
        entry: impl Into<String>,
    ) -> Self {
        Self {
            phase,
            current,
            total,
            current_entry: Some(entry.into()),
        }
    }

    /// Get the progress percentage (0.0 - 1.0)
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percentage(&self) -> f32 {
        if self.total == 0 {
            1.0
        } else {
            self.current as f32 / self.total as f32
        }
    }
}

/// Phase of archive conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionPhase {
    /// Reading the header and file table
    ParsingTable,
    /// Checking coverage of the archive bytes
    Analyzing,
    /// Decoding entries
    Converting,
    /// Operation complete
    Complete,
}

impl ConversionPhase {
    /// Get a human-readable description of this phase
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ParsingTable => "Parsing table",
            Self::Analyzing => "Analyzing",
            Self::Converting => "Converting",
            Self::Complete => "Complete",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_percentage() {
        assert!((ConversionProgress::new(ConversionPhase::Complete, 0, 0).percentage() - 1.0).abs() < f32::EPSILON);
        let progress = ConversionProgress::with_entry(ConversionPhase::Converting, 1, 4, "A.PC8");
        assert!((progress.percentage() - 0.25).abs() < f32::EPSILON);
        assert_eq!(progress.current_entry.as_deref(), Some("A.PC8"));
    }

    #[test]
    fn test_skip_reason_labels() {
        let reason = SkipReason::from(DiagnosticKind::UnsupportedPacking { method: 2 });
        assert_eq!(reason.as_str(), "unsupported_packing");
        assert_eq!(SkipReason::NoCodec.as_str(), "no_codec");
    }
}
