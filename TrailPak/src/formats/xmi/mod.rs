//! XMIDI (`.XMI`) music transcoding
//!
//! An XMIDI file is two IFF containers back to back: `FORM XDIR` declares the
//! song count, then `CAT XMID` holds one `FORM XMID` per song. Each song has
//! an optional timbre table (`TIMB`), an optional branch table (`RBRN`) and an
//! event stream (`EVNT`).
//!
//! The event stream differs from Standard MIDI in three ways: delays are sums
//! of 7-bit bytes, note-ons carry their own duration instead of a matching
//! note-off, and running status is not available. [`transcode`] turns every
//! song into absolute-tick events with explicit note-offs.
//!
//! SPDX-FileCopyrightText: 2025 `CyberDeco`
//!
//! SPDX-License-Identifier: MIT

mod chunk;
mod events;
mod reader;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::error::MusicDecodeError;

pub use reader::transcode;

/// Controller number used as bank select
pub const BANK_SELECT_CONTROLLER: u8 = 114;

/// Default cap on consecutive `0x7F` delay continuation bytes
pub const DEFAULT_MAX_DELAY_CONTINUATIONS: usize = 4096;

/// Ticks per second of the XMIDI clock
pub const TICKS_PER_SECOND: u32 = 120;

/// Transcoder settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct XmiOptions {
    /// Longest accepted run of `0x7F` continuation bytes in one delay
    pub max_delay_continuations: usize,
}

impl Default for XmiOptions {
    fn default() -> Self {
        Self {
            max_delay_continuations: DEFAULT_MAX_DELAY_CONTINUATIONS,
        }
    }
}

/// One decoded channel or system event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum MusicEvent {
    NoteOn {
        channel: u8,
        note: u8,
        velocity: u8,
        /// Ticks until the matching note-off
        duration_ticks: u32,
    },
    NoteOff {
        channel: u8,
        note: u8,
        velocity: u8,
        /// Generated from a note-on duration rather than read from the stream
        synthesized: bool,
    },
    KeyPressure {
        channel: u8,
        note: u8,
        pressure: u8,
    },
    ControllerChange {
        channel: u8,
        controller: u8,
        value: u8,
    },
    ProgramChange {
        channel: u8,
        patch: u8,
        /// Bank resolved from channel state or the declared timbres
        bank: u8,
    },
    ChannelPressure {
        channel: u8,
        pressure: u8,
    },
    PitchBend {
        channel: u8,
        /// 14-bit value, 0x2000 is centered
        value: u16,
    },
    Meta {
        kind: u8,
        data: Vec<u8>,
    },
    SysEx {
        /// `0xF0` or `0xF7`
        status: u8,
        data: Vec<u8>,
    },
}

impl MusicEvent {
    /// MIDI channel, for channel events
    #[must_use]
    pub fn channel(&self) -> Option<u8> {
        match self {
            Self::NoteOn { channel, .. }
            | Self::NoteOff { channel, .. }
            | Self::KeyPressure { channel, .. }
            | Self::ControllerChange { channel, .. }
            | Self::ProgramChange { channel, .. }
            | Self::ChannelPressure { channel, .. }
            | Self::PitchBend { channel, .. } => Some(*channel),
            Self::Meta { .. } | Self::SysEx { .. } => None,
        }
    }
}

/// Event placed on the song timeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimedEvent {
    /// Absolute tick
    pub tick: u64,
    /// Ticks since the previous event in the sequence
    pub delay_ticks: u64,
    pub event: MusicEvent,
}

/// Instrument reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Timbre {
    pub patch: u8,
    pub bank: u8,
}

/// Ordered set of instruments a song uses
///
/// Rows declared in the `TIMB` chunk come first, in declaration order;
/// instruments first selected by a program change are appended.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TimbreTable {
    entries: IndexSet<Timbre>,
    declared: usize,
}

impl TimbreTable {
    /// Table seeded with the declared rows
    #[must_use]
    pub fn from_declared(rows: impl IntoIterator<Item = Timbre>) -> Self {
        let entries: IndexSet<Timbre> = rows.into_iter().collect();
        let declared = entries.len();
        Self { entries, declared }
    }

    /// Add an instrument; returns its position in the table
    pub fn insert(&mut self, timbre: Timbre) -> usize {
        self.entries.insert_full(timbre).0
    }

    /// Bank of the first declared row using `patch`
    #[must_use]
    pub fn declared_bank(&self, patch: u8) -> Option<u8> {
        self.entries
            .iter()
            .take(self.declared)
            .find(|t| t.patch == patch)
            .map(|t| t.bank)
    }

    /// Number of rows that came from the `TIMB` chunk
    #[must_use]
    pub fn declared_len(&self) -> usize {
        self.declared
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Timbre> {
        self.entries.iter()
    }

    #[must_use]
    pub fn contains(&self, patch: u8, bank: u8) -> bool {
        self.entries.contains(&Timbre { patch, bank })
    }
}

/// Entry of the `RBRN` branch table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BranchPoint {
    pub id: u16,
    /// Byte offset into the event stream
    pub offset: u32,
}

/// One decoded song
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MusicSequence {
    /// Position of the song in the container
    pub song_index: usize,
    pub events: Vec<TimedEvent>,
    pub timbres: TimbreTable,
    pub branch_points: Vec<BranchPoint>,
    /// Tick of the last event, including synthesized note-offs
    pub total_ticks: u64,
}

impl MusicSequence {
    /// Number of note-on events
    #[must_use]
    pub fn note_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e.event, MusicEvent::NoteOn { .. }))
            .count()
    }
}

/// Result of decoding one song of a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SongOutcome {
    Decoded(MusicSequence),
    Failed {
        song_index: usize,
        error: MusicDecodeError,
    },
}

impl SongOutcome {
    #[must_use]
    pub fn sequence(&self) -> Option<&MusicSequence> {
        match self {
            Self::Decoded(sequence) => Some(sequence),
            Self::Failed { .. } => None,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&MusicDecodeError> {
        match self {
            Self::Decoded(_) => None,
            Self::Failed { error, .. } => Some(error),
        }
    }
}

/// Every song of one XMIDI container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MusicAsset {
    /// Song count declared in the `INFO` chunk
    pub declared_songs: u16,
    /// One outcome per `FORM XMID` found, in container order
    pub songs: Vec<SongOutcome>,
}

impl MusicAsset {
    /// Successfully decoded songs
    pub fn sequences(&self) -> impl Iterator<Item = &MusicSequence> {
        self.songs.iter().filter_map(SongOutcome::sequence)
    }

    /// Number of songs that failed
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.songs.iter().filter(|s| s.error().is_some()).count()
    }

    /// First song error, if any
    #[must_use]
    pub fn first_error(&self) -> Option<&MusicDecodeError> {
        self.songs.iter().find_map(SongOutcome::error)
    }

    /// Returns true if no song could be decoded
    #[must_use]
    pub fn all_failed(&self) -> bool {
        self.sequences().next().is_none()
    }
}
