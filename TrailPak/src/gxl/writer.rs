//! GXL archive writer

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};

use super::{
    COPYRIGHT_LENGTH, EXTENSION_LENGTH, HEADER_SIZE, LABEL_LENGTH, NAME_LENGTH, PACKING_STORED,
    SIGNATURE, TABLE_ENTRY_SIZE,
};
use crate::error::{Error, Result};

/// Default copyright banner written into new archives
const DEFAULT_COPYRIGHT: &str = "Copyright (c) Genus Microprogramming, Inc. 1988-90";

/// File to be written to the archive
struct FileEntry {
    name: String,
    data: Vec<u8>,
}

/// GXL archive writer
///
/// Payloads are stored (never packed) in the order they were added, directly
/// after the table.
pub struct GxlWriter {
    files: Vec<FileEntry>,
    version: u16,
    copyright: String,
    label: String,
    dos_date: u16,
    dos_time: u16,
}

impl Default for GxlWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl GxlWriter {
    /// Create an empty writer
    #[must_use]
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            version: 100,
            copyright: DEFAULT_COPYRIGHT.to_string(),
            label: String::new(),
            dos_date: 0,
            dos_time: 0,
        }
    }

    /// Set the library version word
    #[must_use]
    pub fn with_version(mut self, version: u16) -> Self {
        self.version = version;
        self
    }

    /// Set the library label
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Set the DOS date and time words stamped on every row
    #[must_use]
    pub fn with_timestamp(mut self, dos_date: u16, dos_time: u16) -> Self {
        self.dos_date = dos_date;
        self.dos_time = dos_time;
        self
    }

    /// Add a file (`NAME.EXT`, 8.3)
    #[must_use]
    pub fn with_file(mut self, name: impl Into<String>, data: Vec<u8>) -> Self {
        self.files.push(FileEntry {
            name: name.into(),
            data,
        });
        self
    }

    /// Serialize the archive into memory
    ///
    /// # Errors
    /// Returns an error if a name does not fit the 8.3 layout or the archive is too large.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let count = u16::try_from(self.files.len())
            .map_err(|_| Error::TooManyEntries { count: self.files.len() })?;

        let data_size: usize = self.files.iter().map(|f| f.data.len()).sum();
        let table_size = self.files.len() * TABLE_ENTRY_SIZE;
        let mut out = Vec::with_capacity(HEADER_SIZE + table_size + data_size);

        // Header
        out.extend_from_slice(&SIGNATURE);
        out.extend_from_slice(&fixed_field(&self.copyright, COPYRIGHT_LENGTH));
        out.write_u16::<LittleEndian>(self.version)?;
        out.extend_from_slice(&fixed_field(&self.label, LABEL_LENGTH));
        out.write_u16::<LittleEndian>(count)?;
        out.resize(HEADER_SIZE, 0);

        // Table
        let mut offset = HEADER_SIZE + table_size;
        for file in &self.files {
            let (base, ext) = split_name(&file.name)?;
            let data_offset = u32::try_from(offset)
                .map_err(|_| Error::TooManyEntries { count: self.files.len() })?;

            out.write_u8(PACKING_STORED)?;
            out.extend_from_slice(&space_padded(base, NAME_LENGTH));
            out.extend_from_slice(&fixed_field(&ext, EXTENSION_LENGTH));
            out.write_u32::<LittleEndian>(data_offset)?;
            out.write_u32::<LittleEndian>(file.data.len() as u32)?;
            out.write_u16::<LittleEndian>(self.dos_date)?;
            out.write_u16::<LittleEndian>(self.dos_time)?;

            offset += file.data.len();
        }

        // Payloads
        for file in &self.files {
            out.extend_from_slice(&file.data);
        }

        tracing::debug!("Wrote GXL archive: {} entries, {} bytes", count, out.len());
        Ok(out)
    }

    /// Write the archive to disk
    ///
    /// # Errors
    /// Returns an error if serialization or writing fails.
    pub fn write(&self, output_path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.to_bytes()?;
        let mut output = BufWriter::new(File::create(output_path.as_ref())?);
        output.write_all(&bytes)?;
        output.flush()?;
        Ok(())
    }
}

/// Split `NAME.EXT` into an 8-char base and a `.EXT` extension field
fn split_name(name: &str) -> Result<(&str, String)> {
    let (base, ext) = match name.rsplit_once('.') {
        Some((base, ext)) => (base, format!(".{ext}")),
        None => (name, String::new()),
    };

    if base.is_empty()
        || base.len() > NAME_LENGTH
        || ext.len() > EXTENSION_LENGTH - 1
        || !name.is_ascii()
    {
        return Err(Error::InvalidEntryName(name.to_string()));
    }
    Ok((base, ext))
}

/// NUL-padded fixed-width field (truncated if longer)
fn fixed_field(text: &str, len: usize) -> Vec<u8> {
    let mut bytes = text.as_bytes().to_vec();
    bytes.resize(len, 0);
    bytes
}

/// Space-padded fixed-width field, as GXL stores base names
fn space_padded(text: &str, len: usize) -> Vec<u8> {
    let mut bytes = text.as_bytes().to_vec();
    bytes.resize(len, b' ');
    bytes
}
