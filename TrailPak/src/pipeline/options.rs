//! Conversion options for archive processing
//!
//! Options can be built in code or loaded from JSON. Every field is optional
//! in JSON; missing fields take their [`Default`] value.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::formats::xmi::XmiOptions;

/// Options controlling which entries are decoded and how.
///
/// # Example
///
/// ```
/// use trailpak::pipeline::ConversionOptions;
///
/// // Decode everything (the default)
/// let options = ConversionOptions::full();
///
/// // Or configure individually
/// let options = ConversionOptions::new()
///     .with_decode_images(true)
///     .with_parallel(false);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversionOptions {
    /// Decode 16- and 256-color images
    pub decode_images: bool,

    /// Transcode XMIDI music
    pub decode_music: bool,

    /// Convert entries on the rayon thread pool
    pub parallel: bool,

    /// Record the MD5 of every extracted entry
    pub compute_checksums: bool,

    /// Inspect unaccounted gaps for file signatures
    pub sniff_gaps: bool,

    /// Music transcoder settings
    pub xmi: XmiOptions,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self::full()
    }
}

impl ConversionOptions {
    /// Create new options with all decoding disabled.
    ///
    /// Entries are still listed, checksummed and analyzed.
    #[must_use]
    pub fn new() -> Self {
        Self {
            decode_images: false,
            decode_music: false,
            parallel: true,
            compute_checksums: true,
            sniff_gaps: true,
            xmi: XmiOptions::default(),
        }
    }

    /// Create options with every codec enabled.
    #[must_use]
    pub fn full() -> Self {
        Self {
            decode_images: true,
            decode_music: true,
            ..Self::new()
        }
    }

    /// Set whether to decode images.
    #[must_use]
    pub fn with_decode_images(mut self, decode: bool) -> Self {
        self.decode_images = decode;
        self
    }

    /// Set whether to transcode music.
    #[must_use]
    pub fn with_decode_music(mut self, decode: bool) -> Self {
        self.decode_music = decode;
        self
    }

    /// Set whether to convert entries in parallel.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set whether to compute entry checksums.
    #[must_use]
    pub fn with_checksums(mut self, checksums: bool) -> Self {
        self.compute_checksums = checksums;
        self
    }

    /// Set whether to sniff gaps for file signatures.
    #[must_use]
    pub fn with_gap_sniffing(mut self, sniff: bool) -> Self {
        self.sniff_gaps = sniff;
        self
    }

    /// Set the cap on consecutive delay continuation bytes.
    #[must_use]
    pub fn with_max_delay_continuations(mut self, max: usize) -> Self {
        self.xmi.max_delay_continuations = max;
        self
    }

    /// Check that the options are usable.
    ///
    /// # Errors
    /// Returns [`Error::InvalidOptions`] if a limit is zero.
    pub fn validate(&self) -> Result<()> {
        if self.xmi.max_delay_continuations == 0 {
            return Err(Error::InvalidOptions {
                message: "xmi.max_delay_continuations must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Parse options from a JSON string.
    ///
    /// # Errors
    /// Returns an error if the JSON is malformed or the options are invalid.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Load options from a JSON file.
    ///
    /// # Errors
    /// Returns [`Error::OptionsNotFound`] if the file does not exist, or an
    /// error if it cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::OptionsNotFound {
                path: path.to_path_buf(),
            });
        }
        let mut json = String::new();
        BufReader::new(File::open(path)?).read_to_string(&mut json)?;
        Self::from_json_str(&json)
    }

    /// Serialize the options as pretty JSON.
    ///
    /// # Errors
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_json_is_default() {
        let options = ConversionOptions::from_json_str("{}").unwrap();
        assert_eq!(options, ConversionOptions::default());
        assert!(options.decode_images && options.decode_music);
    }

    #[test]
    fn test_partial_json() {
        let options = ConversionOptions::from_json_str(
            r#"{ "decode_music": false, "xmi": { "max_delay_continuations": 64 } }"#,
        )
        .unwrap();
        assert!(options.decode_images);
        assert!(!options.decode_music);
        assert_eq!(options.xmi.max_delay_continuations, 64);
    }

    #[test]
    fn test_json_roundtrip() {
        let options = ConversionOptions::new().with_parallel(false).with_checksums(false);
        let json = options.to_json().unwrap();
        assert_eq!(ConversionOptions::from_json_str(&json).unwrap(), options);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            ConversionOptions::from_json_str(r#"{ "xmi": { "max_delay_continuations": 0 } }"#),
            Err(Error::InvalidOptions { .. })
        ));
        assert!(matches!(
            ConversionOptions::from_json_str(r#"{ "parallel": "yes" }"#),
            Err(Error::JsonError(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        assert!(matches!(
            ConversionOptions::load(&path),
            Err(Error::OptionsNotFound { .. })
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("options.json");
        std::fs::write(&path, r#"{ "sniff_gaps": false }"#).unwrap();
        let options = ConversionOptions::load(&path).unwrap();
        assert!(!options.sniff_gaps);
    }
}
