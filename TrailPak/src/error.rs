//! Error types for `TrailPak`

use std::path::PathBuf;

use thiserror::Error;

/// The error type for `TrailPak` operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    // ==================== IO Errors ====================
    /// IO error from file operations.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ==================== GXL Archive Errors ====================
    /// The archive header is inconsistent. Fatal to the whole archive.
    #[error("corrupt GXL header: {0}")]
    CorruptHeader(#[from] HeaderCorruption),

    /// The requested entry was not found in the archive.
    #[error("entry not found in archive: {0}")]
    EntryNotFound(String),

    /// The entry claims bytes past the end of the archive.
    #[error("entry {name} ({offset}+{length}) extends past end of archive ({archive_len} bytes)")]
    EntryOutOfBounds {
        /// Entry name.
        name: String,
        /// Claimed data offset.
        offset: u64,
        /// Claimed data length.
        length: u64,
        /// Actual archive length.
        archive_len: u64,
    },

    /// The archive has more entries than the table format can describe.
    #[error("too many entries for a GXL table: {count}")]
    TooManyEntries {
        /// Number of entries requested.
        count: usize,
    },

    /// An entry name does not fit the 8.3 table layout.
    #[error("invalid entry name for GXL table: {0}")]
    InvalidEntryName(String),

    // ==================== Codec Errors ====================
    /// Image decoding failed. Fatal to that one asset only.
    #[error("image decode error: {0}")]
    ImageDecode(#[from] ImageDecodeError),

    /// Music decoding failed. Fatal to that one song only.
    #[error("music decode error: {0}")]
    MusicDecode(#[from] MusicDecodeError),

    /// An image cannot be encoded in the requested layout.
    #[error("cannot encode image: {message}")]
    ImageEncodeFailed {
        /// Description of the problem.
        message: String,
    },

    // ==================== Export Errors ====================
    /// Failed to create an image buffer from decoded pixels.
    #[error("failed to create image buffer")]
    ImageBufferFailed,

    /// Failed to encode PNG image.
    #[error("failed to encode PNG: {message}")]
    PngEncodeFailed {
        /// The encoding error message.
        message: String,
    },

    /// A sequence cannot be written as a Standard MIDI File.
    #[error("failed to encode MIDI: {message}")]
    MidiEncodeFailed {
        /// Description of the problem.
        message: String,
    },

    // ==================== Configuration Errors ====================
    /// JSON parsing or serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Conversion options are invalid.
    #[error("invalid options: {message}")]
    InvalidOptions {
        /// The validation error message.
        message: String,
    },

    /// Options file does not exist.
    #[error("options file not found: {path}")]
    OptionsNotFound {
        /// The missing path.
        path: PathBuf,
    },
}

/// Why an archive header was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeaderCorruption {
    /// The buffer is shorter than the fixed header.
    #[error("archive is {len} bytes, shorter than the 128-byte header")]
    TooShort {
        /// Actual buffer length.
        len: usize,
    },

    /// The leading signature does not match.
    #[error("invalid signature {found:02X?}, expected [01, CA]")]
    BadSignature {
        /// The two bytes found at offset 0.
        found: [u8; 2],
    },

    /// The entry count implies a table larger than the remaining buffer.
    #[error("file table ends at {table_end}, past end of archive ({archive_len} bytes)")]
    TableOutOfBounds {
        /// Where the table would end.
        table_end: u64,
        /// Actual archive length.
        archive_len: u64,
    },
}

/// Failure decoding one indexed-color image.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageDecodeError {
    /// The compressed stream ended before every scan line was produced.
    #[error("unexpected end of stream at offset {offset} (scan line {line})")]
    UnexpectedEndOfStream {
        /// Offset into the image stream.
        offset: usize,
        /// Scan line being decoded.
        line: usize,
    },

    /// A run is empty or longer than what remains of the scan line.
    #[error("invalid run length {run} at offset {offset} ({remaining} bytes left in scan line)")]
    InvalidRunLength {
        /// Offset of the control byte.
        offset: usize,
        /// Run length encoded by the control byte.
        run: usize,
        /// Bytes still missing from the current scan line.
        remaining: usize,
    },

    /// The 256-color palette marker was not found before the trailing palette.
    #[error("palette marker 0x0C not found at offset {expected_offset}")]
    PaletteMarkerNotFound {
        /// Where the marker should have been.
        expected_offset: usize,
        /// The byte found there, if the stream is long enough.
        found: Option<u8>,
    },

    /// A decoded pixel refers past the end of the palette.
    #[error("pixel ({x}, {y}) uses palette index {index}, palette has {palette_len} colors")]
    PaletteIndexOutOfRange {
        /// Pixel column.
        x: usize,
        /// Pixel row.
        y: usize,
        /// The offending index.
        index: u8,
        /// Number of palette entries.
        palette_len: usize,
    },

    /// The fixed header is missing or describes an impossible image.
    #[error("invalid image header: {reason}")]
    InvalidHeader {
        /// What is wrong with the header.
        reason: String,
    },

    /// The bit depth / plane combination is not valid for this variant.
    #[error("unsupported layout: {bits_per_pixel} bpp x {planes} planes")]
    UnsupportedLayout {
        /// Bits per pixel per plane.
        bits_per_pixel: u8,
        /// Number of color planes.
        planes: u8,
    },
}

/// Failure decoding a music container or one song in it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MusicDecodeError {
    /// A chunk does not fit its parent, or sits in the wrong container.
    #[error("malformed chunk nesting at offset {offset}: {reason}")]
    MalformedChunkNesting {
        /// Offset of the offending chunk header.
        offset: usize,
        /// What is wrong.
        reason: String,
    },

    /// A chunk tag outside the declared schema.
    #[error("unknown chunk tag {} at offset {offset}", fourcc(.tag))]
    UnknownChunkTag {
        /// The four tag bytes.
        tag: [u8; 4],
        /// Offset of the chunk header.
        offset: usize,
    },

    /// A delay or duration value exceeds the supported bound.
    #[error("delay overflow at event offset {offset}")]
    DelayOverflow {
        /// Offset into the event stream.
        offset: usize,
    },

    /// A chunk or event ended early.
    #[error("unexpected end of stream at offset {offset}")]
    UnexpectedEndOfStream {
        /// Offset where more bytes were needed.
        offset: usize,
    },

    /// A byte that cannot start or continue an event.
    #[error("invalid event byte 0x{byte:02X} at event offset {offset}")]
    InvalidEvent {
        /// Offset into the event stream.
        offset: usize,
        /// The offending byte.
        byte: u8,
    },

    /// A required chunk is absent.
    #[error("missing {tag} chunk")]
    MissingChunk {
        /// The tag that was expected.
        tag: &'static str,
    },

    /// The container declares or holds no songs.
    #[error("container holds no songs")]
    NoSongs,
}

fn fourcc(tag: &[u8; 4]) -> String {
    String::from_utf8_lossy(tag).into_owned()
}

/// A specialized Result type for `TrailPak` operations.
pub type Result<T> = std::result::Result<T, Error>;
