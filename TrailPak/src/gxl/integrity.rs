//! SPDX-FileCopyrightText: 2025 CyberDeco
//!
//! SPDX-License-Identifier: MIT
//!
//! Coverage analysis of a GXL archive
//!
//! Finds bytes that no table row accounts for, rows whose payloads overlap,
//! and rows that point into the header/table region. The report is purely
//! informational and never affects extraction.

use serde::Serialize;

use super::ArchiveTable;

/// Gaps smaller than this are not inspected for signatures
pub const MIN_SNIFF_GAP: u64 = 16;

/// Number of leading gap bytes inspected for a signature
const SNIFF_LENGTH: usize = 16;

/// Well-known file signature found at the start of a gap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GapSignature {
    Png,
    Gif,
    Bmp,
    Zip,
    Executable,
    Mp3,
    Riff,
    Jpeg,
    Pdf,
    /// Every inspected byte is printable ASCII, tab, CR or LF
    Text,
}

impl GapSignature {
    const MAGIC: &[(&[u8], GapSignature)] = &[
        (b"\x89PNG\r\n\x1a\n" as &[u8], Self::Png),
        (b"GIF8" as &[u8], Self::Gif),
        (b"BM" as &[u8], Self::Bmp),
        (b"PK\x03\x04" as &[u8], Self::Zip),
        (b"MZ" as &[u8], Self::Executable),
        (b"ID3" as &[u8], Self::Mp3),
        (b"RIFF" as &[u8], Self::Riff),
        (b"\xff\xd8\xff" as &[u8], Self::Jpeg),
        (b"%PDF" as &[u8], Self::Pdf),
    ];

    /// Identify a signature from the first bytes of a region
    #[must_use]
    pub fn identify(head: &[u8]) -> Option<Self> {
        if let Some((_, sig)) = Self::MAGIC.iter().find(|(magic, _)| head.starts_with(magic)) {
            return Some(*sig);
        }
        let printable = |b: &u8| (32..127).contains(b) || matches!(b, b'\t' | b'\n' | b'\r');
        (!head.is_empty() && head.iter().all(printable)).then_some(Self::Text)
    }

    /// Human readable description
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Png => "PNG image",
            Self::Gif => "GIF image",
            Self::Bmp => "BMP image",
            Self::Zip => "ZIP archive",
            Self::Executable => "EXE file",
            Self::Mp3 => "MP3 audio",
            Self::Riff => "WAV or AVI file",
            Self::Jpeg => "JPEG image",
            Self::Pdf => "PDF document",
            Self::Text => "Possible text file",
        }
    }
}

/// Byte range not covered by the header, the table or any entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Gap {
    /// First byte of the gap
    pub start: u64,
    /// One past the last byte of the gap
    pub end: u64,
    /// Entry ending right before the gap (`None` for the header/table region)
    pub after: Option<String>,
    /// Entry starting right after the gap (`None` at end of archive)
    pub before: Option<String>,
    /// Signature found at the start of the gap, if sniffed and recognised
    pub signature: Option<GapSignature>,
}

impl Gap {
    #[must_use]
    pub fn size(&self) -> u64 {
        self.end - self.start
    }
}

/// Two entries sharing bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Overlap {
    /// Earlier-starting entry index
    pub first: usize,
    /// Later-starting entry index
    pub second: usize,
    /// First shared byte
    pub start: u64,
    /// One past the last shared byte
    pub end: u64,
}

/// Coverage report for one archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    /// Total archive length
    pub archive_len: u64,
    /// End of the header/table region
    pub table_end: u64,
    /// Uncovered ranges, ascending
    pub gaps: Vec<Gap>,
    /// Overlapping entry pairs
    pub overlaps: Vec<Overlap>,
    /// Entries whose payload starts inside the header/table region
    pub table_collisions: Vec<usize>,
    /// Bytes covered by the header, the table or an entry
    pub accounted_bytes: u64,
    /// Bytes covered by nothing
    pub unaccounted_bytes: u64,
}

impl IntegrityReport {
    /// Returns true if every byte is accounted for and nothing overlaps
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.gaps.is_empty() && self.overlaps.is_empty() && self.table_collisions.is_empty()
    }

    /// Gaps that carry a recognised signature
    pub fn potential_hidden_files(&self) -> impl Iterator<Item = &Gap> {
        self.gaps.iter().filter(|gap| gap.signature.is_some())
    }
}

/// A clipped, non-empty entry range
struct Span<'a> {
    index: usize,
    name: &'a str,
    start: u64,
    end: u64,
}

/// Analyze table coverage without inspecting gap contents
#[must_use]
pub fn analyze(table: &ArchiveTable) -> IntegrityReport {
    let archive_len = table.archive_len;
    let table_end = table.header.table_end().min(archive_len);

    let mut spans: Vec<Span<'_>> = table
        .entries
        .iter()
        .filter_map(|entry| {
            let start = entry.offset.min(archive_len);
            let end = entry.end_saturating().min(archive_len);
            (end > start).then_some(Span {
                index: entry.index,
                name: &entry.name,
                start,
                end,
            })
        })
        .collect();
    spans.sort_by_key(|span| (span.start, span.end, span.index));

    let table_collisions: Vec<usize> = {
        let mut hits: Vec<usize> = spans
            .iter()
            .filter(|span| span.start < table_end)
            .map(|span| span.index)
            .collect();
        hits.sort_unstable();
        hits
    };

    let mut overlaps = Vec::new();
    for (i, a) in spans.iter().enumerate() {
        for b in spans[i + 1..].iter().take_while(|b| b.start < a.end) {
            overlaps.push(Overlap {
                first: a.index,
                second: b.index,
                start: b.start,
                end: a.end.min(b.end),
            });
        }
    }

    // Sweep: `covered` is the furthest byte reached so far
    let mut gaps = Vec::new();
    let mut covered = table_end;
    let mut last_name: Option<&str> = None;
    let mut accounted = table_end;
    for span in &spans {
        if span.start > covered {
            gaps.push(Gap {
                start: covered,
                end: span.start,
                after: last_name.map(str::to_string),
                before: Some(span.name.to_string()),
                signature: None,
            });
        }
        if span.end > covered {
            accounted += span.end - span.start.max(covered);
            covered = span.end;
            last_name = Some(span.name);
        }
    }
    if archive_len > covered {
        gaps.push(Gap {
            start: covered,
            end: archive_len,
            after: last_name.map(str::to_string),
            before: None,
            signature: None,
        });
    }

    let unaccounted: u64 = gaps.iter().map(Gap::size).sum();

    for overlap in &overlaps {
        tracing::warn!(
            "Entries {} and {} overlap at {}..{}",
            overlap.first,
            overlap.second,
            overlap.start,
            overlap.end
        );
    }
    for index in &table_collisions {
        tracing::warn!("Entry {} starts inside the header/table region", index);
    }
    tracing::debug!(
        "Integrity: {} gaps ({} bytes), {} overlaps",
        gaps.len(),
        unaccounted,
        overlaps.len()
    );

    IntegrityReport {
        archive_len,
        table_end,
        gaps,
        overlaps,
        table_collisions,
        accounted_bytes: accounted,
        unaccounted_bytes: unaccounted,
    }
}

/// Analyze coverage and sniff each large enough gap for a file signature
///
/// `data` must be the buffer the table was parsed from.
#[must_use]
pub fn analyze_with_data(table: &ArchiveTable, data: &[u8]) -> IntegrityReport {
    let mut report = analyze(table);
    for gap in &mut report.gaps {
        if gap.size() < MIN_SNIFF_GAP {
            continue;
        }
        let start = gap.start as usize;
        let end = (start + SNIFF_LENGTH).min(gap.end as usize).min(data.len());
        if start >= end {
            continue;
        }
        gap.signature = GapSignature::identify(&data[start..end]);
        if let Some(signature) = gap.signature {
            tracing::info!(
                "Possible hidden file at offset {} ({} bytes): {}",
                gap.start,
                gap.size(),
                signature.description()
            );
        }
    }
    report
}
