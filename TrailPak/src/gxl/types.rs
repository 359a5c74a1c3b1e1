//! Types for GXL archive handling
//!
//! SPDX-FileCopyrightText: 2025 `CyberDeco`
//!
//! SPDX-License-Identifier: MIT

use serde::Serialize;

/// Header of a GXL archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveHeader {
    /// Copyright banner text
    pub copyright: String,
    /// Library format version
    pub version: u16,
    /// Library label text
    pub label: String,
    /// Number of rows in the file table
    pub entry_count: u16,
    /// Offset of the file table from the start of the archive
    pub table_offset: u64,
}

impl ArchiveHeader {
    /// Offset one past the last table row
    #[must_use]
    pub fn table_end(&self) -> u64 {
        self.table_offset + u64::from(self.entry_count) * super::TABLE_ENTRY_SIZE as u64
    }
}

/// Entry in the file table describing a file in the archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileTableEntry {
    /// Row number in the table
    pub index: usize,
    /// `NAME.EXT` as stored (trailing padding removed)
    pub name: String,
    /// Offset of the data from the start of the archive
    pub offset: u64,
    /// Size of the data
    pub length: u64,
    /// Packing method byte (0 = stored)
    pub packing: u8,
    /// DOS date word
    pub dos_date: u16,
    /// DOS time word
    pub dos_time: u16,
}

impl FileTableEntry {
    /// Offset one past the last data byte
    #[must_use]
    pub fn end(&self) -> u64 {
        self.offset + self.length
    }

    /// Like [`Self::end`], but clamps instead of overflowing
    #[must_use]
    pub fn end_saturating(&self) -> u64 {
        self.offset.saturating_add(self.length)
    }

    /// Whether the whole payload lies inside an archive of `archive_len` bytes
    #[must_use]
    pub fn fits_within(&self, archive_len: u64) -> bool {
        self.offset
            .checked_add(self.length)
            .is_some_and(|end| end <= archive_len)
    }

    /// Uppercased extension without the dot, if any
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        self.name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_uppercase())
    }

    /// Decode the DOS date/time words as `(year, month, day, hour, minute, second)`
    #[must_use]
    pub fn timestamp(&self) -> (u16, u8, u8, u8, u8, u8) {
        let year = 1980 + (self.dos_date >> 9);
        let month = ((self.dos_date >> 5) & 0x0F) as u8;
        let day = (self.dos_date & 0x1F) as u8;
        let hour = (self.dos_time >> 11) as u8;
        let minute = ((self.dos_time >> 5) & 0x3F) as u8;
        let second = ((self.dos_time & 0x1F) * 2) as u8;
        (year, month, day, hour, minute, second)
    }
}

/// Why a table row cannot be extracted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind")]
pub enum DiagnosticKind {
    /// `offset + length` lies beyond the end of the archive
    TruncatedEntry {
        /// Claimed data offset
        offset: u64,
        /// Claimed data length
        length: u64,
        /// Actual archive length
        archive_len: u64,
    },
    /// The row uses a packing method this crate does not unpack
    UnsupportedPacking {
        /// The packing method byte
        method: u8,
    },
}

impl DiagnosticKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TruncatedEntry { .. } => "truncated_entry",
            Self::UnsupportedPacking { .. } => "unsupported_packing",
        }
    }
}

/// Non-fatal problem with a single table row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryDiagnostic {
    /// Row number in the table
    pub index: usize,
    /// Entry name
    pub name: String,
    /// What is wrong
    pub kind: DiagnosticKind,
}

/// Result of parsing a GXL archive table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveTable {
    /// Parsed header
    pub header: ArchiveHeader,
    /// Total archive length in bytes
    pub archive_len: u64,
    /// Every table row, in table order
    pub entries: Vec<FileTableEntry>,
    /// Rows that cannot be extracted, in table order
    pub diagnostics: Vec<EntryDiagnostic>,
}

impl ArchiveTable {
    /// Diagnostic for a row, if it has one
    #[must_use]
    pub fn diagnostic_for(&self, index: usize) -> Option<&EntryDiagnostic> {
        self.diagnostics.iter().find(|d| d.index == index)
    }

    /// Rows that can be extracted
    pub fn valid_entries(&self) -> impl Iterator<Item = &FileTableEntry> {
        self.entries
            .iter()
            .filter(|entry| self.diagnostic_for(entry.index).is_none())
    }

    /// Find an entry by name (case-insensitive)
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&FileTableEntry> {
        self.entries
            .iter()
            .find(|entry| entry.name.eq_ignore_ascii_case(name))
    }

    /// Returns true if every row can be extracted
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.diagnostics.is_empty()
    }
}
