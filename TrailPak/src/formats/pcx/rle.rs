//! PCX run-length scan-line codec
//!
//! A byte with both top bits set is a repeat run of `byte & 0x3F` copies of
//! the following byte. Anything else is a single literal byte. Runs never
//! cross a scan-line boundary.

use crate::error::ImageDecodeError;

/// Control bits marking a repeat run
pub const RUN_FLAG: u8 = 0xC0;

/// Mask extracting the run length from a control byte
pub const RUN_MASK: u8 = 0x3F;

/// Longest run a single control byte can encode
pub const MAX_RUN: usize = RUN_MASK as usize;

/// Decode exactly `line.len()` bytes starting at `offset` in `data`
///
/// Returns the offset of the first byte after the scan line. `line_index` is
/// only used for error reporting.
///
/// # Errors
/// - [`ImageDecodeError::UnexpectedEndOfStream`] if `data` ends mid-line
/// - [`ImageDecodeError::InvalidRunLength`] for a zero-length run or a run
///   longer than what remains of the line
pub fn decode_scanline(
    data: &[u8],
    offset: usize,
    line: &mut [u8],
    line_index: usize,
) -> Result<usize, ImageDecodeError> {
    let mut pos = offset;
    let mut filled = 0;

    while filled < line.len() {
        let control = *data
            .get(pos)
            .ok_or(ImageDecodeError::UnexpectedEndOfStream {
                offset: pos,
                line: line_index,
            })?;

        if control & RUN_FLAG == RUN_FLAG {
            let run = usize::from(control & RUN_MASK);
            let remaining = line.len() - filled;
            if run == 0 || run > remaining {
                return Err(ImageDecodeError::InvalidRunLength {
                    offset: pos,
                    run,
                    remaining,
                });
            }
            let value = *data
                .get(pos + 1)
                .ok_or(ImageDecodeError::UnexpectedEndOfStream {
                    offset: pos + 1,
                    line: line_index,
                })?;
            line[filled..filled + run].fill(value);
            filled += run;
            pos += 2;
        } else {
            line[filled] = control;
            filled += 1;
            pos += 1;
        }
    }

    Ok(pos)
}

/// Encode one scan line
///
/// Repeats become runs of at most [`MAX_RUN`]; a lone byte is written as a
/// literal unless its top bits collide with the run flag.
#[must_use]
pub fn encode_scanline(line: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(line.len() + line.len() / 2);
    let mut i = 0;

    while i < line.len() {
        let value = line[i];
        let run = line[i..]
            .iter()
            .take(MAX_RUN)
            .take_while(|&&b| b == value)
            .count();

        if run == 1 && value & RUN_FLAG != RUN_FLAG {
            out.push(value);
        } else {
            out.push(RUN_FLAG | run as u8);
            out.push(value);
        }
        i += run;
    }

    out
}
