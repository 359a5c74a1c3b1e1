//! Asset codecs
//!
//! - [`pcx`] - 16- and 256-color run-length encoded images
//! - [`xmi`] - XMIDI music containers

pub mod pcx;
pub mod xmi;

// Re-export the decoder entry points and their main types
pub use pcx::{ImageVariant, IndexedImage, Palette, PixelBuffer, decode_image, encode_image};
pub use xmi::{MusicAsset, MusicEvent, MusicSequence, XmiOptions, transcode};
