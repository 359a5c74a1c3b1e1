//! Music sequence → Standard MIDI File (format 0)
//!
//! XMIDI runs at a fixed 120 ticks per second. With the default 60 PPQN and
//! 500 000 µs per quarter note, one source tick maps to one output tick.
//!
//! SPDX-FileCopyrightText: 2025 `CyberDeco`
//!
//! SPDX-License-Identifier: MIT

use byteorder::{BigEndian, WriteBytesExt};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::formats::xmi::{MusicEvent, MusicSequence, TICKS_PER_SECOND};

/// Largest delta time a Standard MIDI File can hold
const MAX_DELTA: u64 = 0x0FFF_FFFF;

/// Standard MIDI File export settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiExportOptions {
    /// Pulses per quarter note written to the header
    pub ppqn: u16,
    /// Tempo in microseconds per quarter note
    pub tempo: u32,
}

impl Default for MidiExportOptions {
    fn default() -> Self {
        Self {
            ppqn: 60,
            tempo: 500_000,
        }
    }
}

impl MidiExportOptions {
    fn validate(&self) -> Result<()> {
        if self.ppqn == 0 || self.ppqn > 0x7FFF {
            return Err(Error::InvalidOptions {
                message: format!("ppqn {} must be in 1..=32767", self.ppqn),
            });
        }
        if self.tempo == 0 || self.tempo > 0x00FF_FFFF {
            return Err(Error::InvalidOptions {
                message: format!("tempo {} does not fit 24 bits", self.tempo),
            });
        }
        Ok(())
    }

    /// Output tick for an absolute source tick
    fn scale(&self, tick: u64) -> u64 {
        let num = u128::from(tick) * u128::from(self.ppqn) * 1_000_000;
        let den = u128::from(self.tempo) * u128::from(TICKS_PER_SECOND);
        u64::try_from(num / den).unwrap_or(u64::MAX)
    }
}

/// Write one song as a format 0 Standard MIDI File
///
/// # Errors
/// Returns an error if the options are invalid or a delta time is too large
/// for the file format.
pub fn sequence_to_midi_bytes(
    sequence: &MusicSequence,
    options: &MidiExportOptions,
) -> Result<Vec<u8>> {
    options.validate()?;

    let mut track = Vec::new();
    // Tempo at tick 0
    write_vlq(&mut track, 0);
    track.extend_from_slice(&[0xFF, 0x51, 0x03]);
    track.extend_from_slice(&options.tempo.to_be_bytes()[1..]);

    let mut last_tick = 0u64;
    for timed in &sequence.events {
        let tick = options.scale(timed.tick);
        let delta = tick
            .checked_sub(last_tick)
            .ok_or_else(|| Error::MidiEncodeFailed {
                message: format!("event at tick {tick} comes before tick {last_tick}"),
            })?;
        if delta > MAX_DELTA {
            return Err(Error::MidiEncodeFailed {
                message: format!("delta of {delta} ticks at tick {tick} is too large"),
            });
        }
        last_tick = tick;
        write_vlq(&mut track, delta as u32);
        write_event(&mut track, &timed.event);
    }

    write_vlq(&mut track, 0);
    track.extend_from_slice(&[0xFF, 0x2F, 0x00]);

    let track_len = u32::try_from(track.len()).map_err(|_| Error::MidiEncodeFailed {
        message: format!("track of {} bytes is too large", track.len()),
    })?;

    let mut out = Vec::with_capacity(track.len() + 22);
    out.extend_from_slice(b"MThd");
    out.write_u32::<BigEndian>(6)?;
    out.write_u16::<BigEndian>(0)?; // format 0
    out.write_u16::<BigEndian>(1)?; // one track
    out.write_u16::<BigEndian>(options.ppqn)?;
    out.extend_from_slice(b"MTrk");
    out.write_u32::<BigEndian>(track_len)?;
    out.extend_from_slice(&track);

    Ok(out)
}

fn write_event(out: &mut Vec<u8>, event: &MusicEvent) {
    match *event {
        MusicEvent::NoteOn {
            channel,
            note,
            velocity,
            ..
        } => out.extend_from_slice(&[0x90 | channel, note, velocity]),
        MusicEvent::NoteOff {
            channel,
            note,
            velocity,
            ..
        } => out.extend_from_slice(&[0x80 | channel, note, velocity]),
        MusicEvent::KeyPressure {
            channel,
            note,
            pressure,
        } => out.extend_from_slice(&[0xA0 | channel, note, pressure]),
        MusicEvent::ControllerChange {
            channel,
            controller,
            value,
        } => out.extend_from_slice(&[0xB0 | channel, controller, value]),
        MusicEvent::ProgramChange { channel, patch, .. } => {
            out.extend_from_slice(&[0xC0 | channel, patch]);
        }
        MusicEvent::ChannelPressure { channel, pressure } => {
            out.extend_from_slice(&[0xD0 | channel, pressure]);
        }
        MusicEvent::PitchBend { channel, value } => out.extend_from_slice(&[
            0xE0 | channel,
            (value & 0x7F) as u8,
            ((value >> 7) & 0x7F) as u8,
        ]),
        MusicEvent::Meta { kind, ref data } => {
            out.extend_from_slice(&[0xFF, kind]);
            write_vlq(out, data.len() as u32);
            out.extend_from_slice(data);
        }
        MusicEvent::SysEx { status, ref data } => {
            out.push(status);
            write_vlq(out, data.len() as u32);
            out.extend_from_slice(data);
        }
    }
}

/// Standard MIDI variable-length quantity
fn write_vlq(out: &mut Vec<u8>, value: u32) {
    let mut groups = [0u8; 5];
    let mut count = 0;
    let mut rest = value;
    loop {
        groups[count] = (rest & 0x7F) as u8;
        count += 1;
        rest >>= 7;
        if rest == 0 {
            break;
        }
    }
    for i in (0..count).rev() {
        let continuation = if i > 0 { 0x80 } else { 0 };
        out.push(groups[i] | continuation);
    }
}
