//! XMIDI event stream decoder

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use super::{BANK_SELECT_CONTROLLER, MusicEvent, Timbre, TimbreTable, TimedEvent, XmiOptions};
use crate::error::MusicDecodeError;

/// Longest variable-length quantity accepted for durations and lengths
const MAX_VLQ_BYTES: usize = 4;

/// Meta event type ending the stream
const META_END_OF_TRACK: u8 = 0x2F;

/// Note-off waiting for its tick; ordered by (tick, insertion order)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct PendingNoteOff {
    tick: u64,
    seq: u64,
    channel: u8,
    note: u8,
}

/// Decoded event stream of one song
#[derive(Debug)]
pub(crate) struct DecodedEvents {
    pub events: Vec<TimedEvent>,
    pub total_ticks: u64,
}

/// Decode one `EVNT` body
///
/// `timbres` holds the declared rows; instruments selected by program changes
/// are added to it.
pub(crate) fn decode_events(
    data: &[u8],
    timbres: &mut TimbreTable,
    options: &XmiOptions,
) -> Result<DecodedEvents, MusicDecodeError> {
    EventDecoder::new(data, timbres, options).run()
}

struct EventDecoder<'a> {
    data: &'a [u8],
    pos: usize,
    /// Tick of the event being read
    tick: u64,
    /// Tick of the last emitted event
    emitted_tick: u64,
    pending: BinaryHeap<Reverse<PendingNoteOff>>,
    next_seq: u64,
    channel_banks: [Option<u8>; 16],
    timbres: &'a mut TimbreTable,
    max_continuations: usize,
    events: Vec<TimedEvent>,
}

impl<'a> EventDecoder<'a> {
    fn new(data: &'a [u8], timbres: &'a mut TimbreTable, options: &XmiOptions) -> Self {
        Self {
            data,
            pos: 0,
            tick: 0,
            emitted_tick: 0,
            pending: BinaryHeap::new(),
            next_seq: 0,
            channel_banks: [None; 16],
            timbres,
            max_continuations: options.max_delay_continuations,
            events: Vec::new(),
        }
    }

    fn run(mut self) -> Result<DecodedEvents, MusicDecodeError> {
        while self.pos < self.data.len() {
            // A byte with the high bit clear starts a delay; otherwise the delay is zero
            if self.data[self.pos] & 0x80 == 0 {
                let delay = self.read_delay()?;
                self.tick += delay;
                if self.pos >= self.data.len() {
                    break;
                }
            }

            let status_offset = self.pos;
            let status = self.data[self.pos];
            if status & 0x80 == 0 {
                return Err(MusicDecodeError::InvalidEvent {
                    offset: status_offset,
                    byte: status,
                });
            }
            self.pos += 1;

            self.flush_until(self.tick);
            if !self.read_event(status, status_offset)? {
                break;
            }
        }

        self.flush_until(u64::MAX);
        let total_ticks = self.emitted_tick.max(self.tick);
        tracing::debug!(
            "Decoded {} events over {} ticks",
            self.events.len(),
            total_ticks
        );

        Ok(DecodedEvents {
            events: self.events,
            total_ticks,
        })
    }

    /// Sum 7-bit delay bytes; `0x7F` continues, anything smaller ends the delay
    fn read_delay(&mut self) -> Result<u64, MusicDecodeError> {
        let start = self.pos;
        let mut total = 0u64;
        let mut continuations = 0usize;

        while let Some(&byte) = self.data.get(self.pos) {
            if byte & 0x80 != 0 {
                // Event follows a 0x7F continuation directly
                break;
            }
            self.pos += 1;
            total += u64::from(byte);
            if byte != 0x7F {
                break;
            }
            continuations += 1;
            if continuations > self.max_continuations {
                return Err(MusicDecodeError::DelayOverflow { offset: start });
            }
        }

        Ok(total)
    }

    /// Standard MIDI variable-length quantity
    fn read_vlq(&mut self) -> Result<u32, MusicDecodeError> {
        let start = self.pos;
        let mut value = 0u32;
        for _ in 0..MAX_VLQ_BYTES {
            let byte = self.read_byte()?;
            value = (value << 7) | u32::from(byte & 0x7F);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(MusicDecodeError::DelayOverflow { offset: start })
    }

    fn read_byte(&mut self) -> Result<u8, MusicDecodeError> {
        let byte = *self
            .data
            .get(self.pos)
            .ok_or(MusicDecodeError::UnexpectedEndOfStream { offset: self.pos })?;
        self.pos += 1;
        Ok(byte)
    }

    /// Data byte of a channel event (high bit clear)
    fn read_data(&mut self) -> Result<u8, MusicDecodeError> {
        let offset = self.pos;
        let byte = self.read_byte()?;
        if byte & 0x80 != 0 {
            return Err(MusicDecodeError::InvalidEvent { offset, byte });
        }
        Ok(byte)
    }

    fn read_payload(&mut self) -> Result<Vec<u8>, MusicDecodeError> {
        let len = self.read_vlq()? as usize;
        let end = self.pos + len;
        let payload = self
            .data
            .get(self.pos..end)
            .ok_or(MusicDecodeError::UnexpectedEndOfStream {
                offset: self.data.len(),
            })?
            .to_vec();
        self.pos = end;
        Ok(payload)
    }

    /// Read the event after `status`; returns false at end of track
    fn read_event(&mut self, status: u8, status_offset: usize) -> Result<bool, MusicDecodeError> {
        let channel = status & 0x0F;
        let event = match status & 0xF0 {
            0x80 => MusicEvent::NoteOff {
                channel,
                note: self.read_data()?,
                velocity: self.read_data()?,
                synthesized: false,
            },
            0x90 => {
                let note = self.read_data()?;
                let velocity = self.read_data()?;
                let duration_ticks = self.read_vlq()?;
                self.schedule_note_off(channel, note, duration_ticks);
                MusicEvent::NoteOn {
                    channel,
                    note,
                    velocity,
                    duration_ticks,
                }
            }
            0xA0 => MusicEvent::KeyPressure {
                channel,
                note: self.read_data()?,
                pressure: self.read_data()?,
            },
            0xB0 => {
                let controller = self.read_data()?;
                let value = self.read_data()?;
                if controller == BANK_SELECT_CONTROLLER {
                    self.channel_banks[usize::from(channel)] = Some(value);
                }
                MusicEvent::ControllerChange {
                    channel,
                    controller,
                    value,
                }
            }
            0xC0 => {
                let patch = self.read_data()?;
                let bank = self.channel_banks[usize::from(channel)]
                    .or_else(|| self.timbres.declared_bank(patch))
                    .unwrap_or(0);
                self.timbres.insert(Timbre { patch, bank });
                MusicEvent::ProgramChange {
                    channel,
                    patch,
                    bank,
                }
            }
            0xD0 => MusicEvent::ChannelPressure {
                channel,
                pressure: self.read_data()?,
            },
            0xE0 => {
                let lsb = self.read_data()?;
                let msb = self.read_data()?;
                MusicEvent::PitchBend {
                    channel,
                    value: u16::from(lsb) | (u16::from(msb) << 7),
                }
            }
            _ => match status {
                0xF0 | 0xF7 => MusicEvent::SysEx {
                    status,
                    data: self.read_payload()?,
                },
                0xFF => {
                    let kind = self.read_byte()?;
                    let data = self.read_payload()?;
                    if kind == META_END_OF_TRACK {
                        return Ok(false);
                    }
                    MusicEvent::Meta { kind, data }
                }
                byte => {
                    return Err(MusicDecodeError::InvalidEvent {
                        offset: status_offset,
                        byte,
                    });
                }
            },
        };

        self.emit(self.tick, event);
        Ok(true)
    }

    fn schedule_note_off(&mut self, channel: u8, note: u8, duration: u32) {
        let pending = PendingNoteOff {
            tick: self.tick + u64::from(duration),
            seq: self.next_seq,
            channel,
            note,
        };
        self.next_seq += 1;
        self.pending.push(Reverse(pending));
    }

    /// Emit every pending note-off due at or before `tick`
    fn flush_until(&mut self, tick: u64) {
        while let Some(Reverse(next)) = self.pending.peek().copied() {
            if next.tick > tick {
                break;
            }
            self.pending.pop();
            self.emit(
                next.tick,
                MusicEvent::NoteOff {
                    channel: next.channel,
                    note: next.note,
                    velocity: 0,
                    synthesized: true,
                },
            );
        }
    }

    fn emit(&mut self, tick: u64, event: MusicEvent) {
        self.events.push(TimedEvent {
            tick,
            delay_ticks: tick - self.emitted_tick,
            event,
        });
        self.emitted_tick = tick;
    }
}
