//! SPDX-FileCopyrightText: 2025 `CyberDeco`
//!
//! SPDX-License-Identifier: MIT
//!
//! Export of decoded assets to standard formats
//!
//! - Indexed images → RGBA / PNG
//! - Music sequences → Standard MIDI File (format 0)
//!
//! Everything is produced in memory; writing files is left to the caller.

mod pcx_png;
mod xmi_midi;

// Image exports
pub use pcx_png::{indexed_to_png_bytes, indexed_to_rgba, pcx_bytes_to_png_bytes};

// Music exports
pub use xmi_midi::{MidiExportOptions, sequence_to_midi_bytes};
