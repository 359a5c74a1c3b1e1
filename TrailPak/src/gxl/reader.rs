//! SPDX-FileCopyrightText: 2025 CyberDeco
//!
//! SPDX-License-Identifier: MIT
//!
//! GXL archive table parser

use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt};

use super::{
    ArchiveHeader, ArchiveTable, COPYRIGHT_LENGTH, DiagnosticKind, EXTENSION_LENGTH,
    EntryDiagnostic, FileTableEntry, HEADER_SIZE, LABEL_LENGTH, NAME_LENGTH, PACKING_STORED,
    SIGNATURE, TABLE_ENTRY_SIZE,
};
use crate::error::{Error, HeaderCorruption, Result};

/// Parse the header and file table of a GXL archive held in memory.
///
/// Header fields are validated strictly: a short buffer, a bad signature or a
/// table that would run past the end of the buffer fail with
/// [`Error::CorruptHeader`]. Rows are read in a single pass; a row whose data
/// lies outside the buffer is kept and reported as a
/// [`DiagnosticKind::TruncatedEntry`] without stopping the parse.
///
/// # Errors
/// Returns [`Error::CorruptHeader`] if the header is inconsistent.
pub fn parse_archive(data: &[u8]) -> Result<ArchiveTable> {
    let archive_len = data.len() as u64;
    let header = read_header(data)?;

    let table_end = header.table_end();
    if table_end > archive_len {
        return Err(HeaderCorruption::TableOutOfBounds {
            table_end,
            archive_len,
        }
        .into());
    }

    let table_start = header.table_offset as usize;
    let mut entries = Vec::with_capacity(usize::from(header.entry_count));
    let mut diagnostics = Vec::new();

    for index in 0..usize::from(header.entry_count) {
        let row_start = table_start + index * TABLE_ENTRY_SIZE;
        let row = &data[row_start..row_start + TABLE_ENTRY_SIZE];
        let entry = parse_table_row(index, row)?;

        if let Some(kind) = check_entry(&entry, archive_len) {
            tracing::warn!(
                "Entry {} ({}) rejected: {}",
                entry.index,
                entry.name,
                kind.as_str()
            );
            diagnostics.push(EntryDiagnostic {
                index,
                name: entry.name.clone(),
                kind,
            });
        } else {
            tracing::debug!(
                "Entry {}: {} at offset {}, size {}",
                entry.index,
                entry.name,
                entry.offset,
                entry.length
            );
        }

        entries.push(entry);
    }

    tracing::info!(
        "Parsed GXL table: {} entries ({} rejected), {} bytes",
        entries.len(),
        diagnostics.len(),
        archive_len
    );

    Ok(ArchiveTable {
        header,
        archive_len,
        entries,
        diagnostics,
    })
}

/// Read the fixed 128-byte header
fn read_header(data: &[u8]) -> Result<ArchiveHeader> {
    if data.len() < HEADER_SIZE {
        return Err(HeaderCorruption::TooShort { len: data.len() }.into());
    }

    let mut cursor = Cursor::new(&data[..HEADER_SIZE]);

    let mut signature = [0u8; 2];
    cursor.read_exact(&mut signature)?;
    if signature != SIGNATURE {
        return Err(HeaderCorruption::BadSignature { found: signature }.into());
    }

    let mut copyright = [0u8; COPYRIGHT_LENGTH];
    cursor.read_exact(&mut copyright)?;
    let version = cursor.read_u16::<LittleEndian>()?;
    let mut label = [0u8; LABEL_LENGTH];
    cursor.read_exact(&mut label)?;
    let entry_count = cursor.read_u16::<LittleEndian>()?;

    Ok(ArchiveHeader {
        copyright: padded_text(&copyright),
        version,
        label: padded_text(&label),
        entry_count,
        table_offset: HEADER_SIZE as u64,
    })
}

/// Parse a single 26-byte table row
fn parse_table_row(index: usize, row: &[u8]) -> Result<FileTableEntry> {
    let mut cursor = Cursor::new(row);

    let packing = cursor.read_u8()?;
    let mut name_bytes = [0u8; NAME_LENGTH];
    cursor.read_exact(&mut name_bytes)?;
    let mut ext_bytes = [0u8; EXTENSION_LENGTH];
    cursor.read_exact(&mut ext_bytes)?;
    let offset = u64::from(cursor.read_u32::<LittleEndian>()?);
    let length = u64::from(cursor.read_u32::<LittleEndian>()?);
    let dos_date = cursor.read_u16::<LittleEndian>()?;
    let dos_time = cursor.read_u16::<LittleEndian>()?;

    let base = padded_text(&name_bytes);
    let ext = padded_text(&ext_bytes);
    let name = match ext.as_str() {
        "" | "." => base,
        ext if ext.starts_with('.') => format!("{base}{ext}"),
        ext => format!("{base}.{ext}"),
    };

    Ok(FileTableEntry {
        index,
        name,
        offset,
        length,
        packing,
        dos_date,
        dos_time,
    })
}

/// Row-level validation; `None` means the entry can be extracted
fn check_entry(entry: &FileTableEntry, archive_len: u64) -> Option<DiagnosticKind> {
    if !entry.fits_within(archive_len) {
        return Some(DiagnosticKind::TruncatedEntry {
            offset: entry.offset,
            length: entry.length,
            archive_len,
        });
    }
    if entry.packing != PACKING_STORED {
        return Some(DiagnosticKind::UnsupportedPacking {
            method: entry.packing,
        });
    }
    None
}

/// Text field padded with NULs and/or spaces
fn padded_text(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).trim_end().to_string()
}

/// GXL archive held in memory together with its parsed table
#[derive(Debug, Clone)]
pub struct GxlReader {
    data: Vec<u8>,
    table: ArchiveTable,
}

impl GxlReader {
    /// Read a GXL archive from disk
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the header is corrupt.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let mut reader = BufReader::new(file);
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::from_bytes(data)
    }

    /// Parse a GXL archive already loaded into memory
    ///
    /// # Errors
    /// Returns [`Error::CorruptHeader`] if the header is corrupt.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let table = parse_archive(&data)?;
        Ok(Self { data, table })
    }

    /// Raw archive bytes
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Parsed table
    #[must_use]
    pub fn table(&self) -> &ArchiveTable {
        &self.table
    }

    /// Parsed header
    #[must_use]
    pub fn header(&self) -> &ArchiveHeader {
        &self.table.header
    }

    /// Every table row, in table order
    #[must_use]
    pub fn entries(&self) -> &[FileTableEntry] {
        &self.table.entries
    }

    /// Names of every table row
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        self.table.entries.iter().map(|e| e.name.clone()).collect()
    }

    /// Borrow the payload of an entry
    ///
    /// # Errors
    /// Returns [`Error::EntryOutOfBounds`] if the entry lies past the end of the archive.
    pub fn entry_bytes(&self, entry: &FileTableEntry) -> Result<&[u8]> {
        super::extractor::slice_entry(&self.data, entry)
    }

    /// Borrow the payload of an entry by name (case-insensitive)
    ///
    /// # Errors
    /// Returns [`Error::EntryNotFound`] if no row has this name.
    pub fn read_file_bytes(&self, name: &str) -> Result<&[u8]> {
        let entry = self
            .table
            .find(name)
            .ok_or_else(|| Error::EntryNotFound(name.to_string()))?;
        self.entry_bytes(entry)
    }
}
