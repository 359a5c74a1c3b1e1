//! SPDX-FileCopyrightText: 2025 CyberDeco
//!
//! SPDX-License-Identifier: MIT
//!
//! Borrowed access to GXL entry payloads

use serde::Serialize;

use super::{ArchiveTable, FileTableEntry};
use crate::error::{Error, Result};

/// Content format of an archive entry, inferred from its suffix
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum AssetFormat {
    /// 256-color indexed image (`.256`, `.PC8`)
    Image256,
    /// 16-color indexed image (`.16`, `.PC4`)
    Image16,
    /// XMIDI music (`.XMI`)
    Music,
    /// Raw sound data (`.SND`)
    Sound,
    /// Dialog/script text (`.CTR`, `.TXT`)
    Text,
    /// High-score style list (`.LST`)
    List,
    /// Animation (`.ANI`)
    Animation,
    /// Font (`.GFT`)
    Font,
    /// Game data blob (`.GBT`)
    GameData,
    /// Anything else, with the uppercased extension (empty if none)
    Other(String),
}

impl AssetFormat {
    /// Infer the format from an entry name
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        let ext = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_uppercase())
            .unwrap_or_default();

        match ext.as_str() {
            "256" | "PC8" => Self::Image256,
            "16" | "PC4" => Self::Image16,
            "XMI" => Self::Music,
            "SND" => Self::Sound,
            "CTR" | "TXT" => Self::Text,
            "LST" => Self::List,
            "ANI" => Self::Animation,
            "GFT" => Self::Font,
            "GBT" => Self::GameData,
            _ => Self::Other(ext),
        }
    }

    /// Short label used in logs and summaries
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Image256 => "image256",
            Self::Image16 => "image16",
            Self::Music => "music",
            Self::Sound => "sound",
            Self::Text => "text",
            Self::List => "list",
            Self::Animation => "animation",
            Self::Font => "font",
            Self::GameData => "game_data",
            Self::Other(_) => "other",
        }
    }

    /// Whether this crate has a decoder for the format
    #[must_use]
    pub fn has_codec(&self) -> bool {
        matches!(self, Self::Image256 | Self::Image16 | Self::Music)
    }
}

/// Entry payload borrowed from the archive buffer
#[derive(Debug, Clone, Copy)]
pub struct ExtractedAsset<'a> {
    /// Row number in the table
    pub index: usize,
    /// Entry name
    pub name: &'a str,
    /// Format inferred from the name
    pub format: &'a AssetFormat,
    /// Payload bytes
    pub data: &'a [u8],
}

impl ExtractedAsset<'_> {
    /// MD5 of the payload as lowercase hex
    #[must_use]
    pub fn md5_hex(&self) -> String {
        format!("{:x}", md5::compute(self.data))
    }
}

/// Borrow the payload bytes of an entry
pub(crate) fn slice_entry<'a>(data: &'a [u8], entry: &FileTableEntry) -> Result<&'a [u8]> {
    let archive_len = data.len() as u64;
    if !entry.fits_within(archive_len) {
        return Err(Error::EntryOutOfBounds {
            name: entry.name.clone(),
            offset: entry.offset,
            length: entry.length,
            archive_len,
        });
    }
    // fits_within guarantees both bounds are within usize range of `data`
    let start = entry.offset as usize;
    let end = start + entry.length as usize;
    Ok(&data[start..end])
}

/// Borrow one entry as an [`ExtractedAsset`]
///
/// `formats` must hold the format of each table row (see [`entry_formats`]).
///
/// # Errors
/// Returns [`Error::EntryOutOfBounds`] if the entry lies past the end of the archive.
pub fn extract_entry<'a>(
    data: &'a [u8],
    entry: &'a FileTableEntry,
    format: &'a AssetFormat,
) -> Result<ExtractedAsset<'a>> {
    let bytes = slice_entry(data, entry)?;
    Ok(ExtractedAsset {
        index: entry.index,
        name: &entry.name,
        format,
        data: bytes,
    })
}

/// Format of every table row, in table order
#[must_use]
pub fn entry_formats(table: &ArchiveTable) -> Vec<AssetFormat> {
    table
        .entries
        .iter()
        .map(|entry| AssetFormat::from_name(&entry.name))
        .collect()
}

/// Borrow every extractable entry, in table order
///
/// Rows carrying a diagnostic are left out.
#[must_use]
pub fn extract_all<'a>(
    data: &'a [u8],
    table: &'a ArchiveTable,
    formats: &'a [AssetFormat],
) -> Vec<ExtractedAsset<'a>> {
    table
        .entries
        .iter()
        .zip(formats)
        .filter(|(entry, _)| table.diagnostic_for(entry.index).is_none())
        .filter_map(|(entry, format)| match extract_entry(data, entry, format) {
            Ok(asset) => Some(asset),
            Err(e) => {
                tracing::warn!("Skipping {}: {}", entry.name, e);
                None
            }
        })
        .collect()
}
