//! XMIDI container reader
//!
//! The `FORM XDIR` container is read in full first, then the rest of the
//! buffer is read as the `CAT XMID` song container.

use byteorder::{ByteOrder, LittleEndian};

use super::chunk::{Chunk, ChunkReader, ChunkTag, ContainerType, nesting};
use super::events::decode_events;
use super::{BranchPoint, MusicAsset, MusicSequence, SongOutcome, Timbre, TimbreTable, XmiOptions};
use crate::error::MusicDecodeError;

/// Size of one `RBRN` record
const BRANCH_RECORD_SIZE: usize = 6;

/// Decode every song of an XMIDI file
///
/// Container-level problems fail the whole asset. A problem inside one song
/// only fails that song; the remaining songs are still decoded.
///
/// # Errors
/// Returns a [`MusicDecodeError`] if the container structure is invalid or it
/// holds no songs.
pub fn transcode(data: &[u8], options: &XmiOptions) -> Result<MusicAsset, MusicDecodeError> {
    let mut top = ChunkReader::new(data, 0);

    let directory = expect_container(&mut top, ChunkTag::Form, ContainerType::Xdir, "FORM")?;
    let declared_songs = read_song_count(&directory)?;

    let catalog = expect_container(&mut top, ChunkTag::Cat, ContainerType::Xmid, "CAT ")?;
    if !top.is_at_end() {
        tracing::warn!(
            "Ignoring {} bytes after the song container",
            data.len() - top.position()
        );
    }

    if declared_songs == 0 {
        return Err(MusicDecodeError::NoSongs);
    }

    let mut songs = Vec::new();
    let mut children = catalog.children();
    while let Some(next) = children.next_chunk() {
        let song_index = songs.len();
        let outcome = next
            .and_then(|form| expect_song_form(&form).map(|()| form))
            .and_then(|form| decode_song(&form, song_index, options));

        match outcome {
            Ok(sequence) => songs.push(SongOutcome::Decoded(sequence)),
            Err(error) => {
                tracing::warn!("Song {} failed: {}", song_index, error);
                songs.push(SongOutcome::Failed { song_index, error });
            }
        }
    }

    if songs.is_empty() {
        return Err(MusicDecodeError::NoSongs);
    }
    if songs.len() != usize::from(declared_songs) {
        tracing::warn!(
            "Container declares {} songs but holds {}",
            declared_songs,
            songs.len()
        );
    }

    Ok(MusicAsset {
        declared_songs,
        songs,
    })
}

/// Read the next top-level chunk and check its tag and container type
fn expect_container<'a>(
    reader: &mut ChunkReader<'a>,
    tag: ChunkTag,
    container: ContainerType,
    name: &'static str,
) -> Result<Chunk<'a>, MusicDecodeError> {
    let offset = reader.position();
    let chunk = reader
        .next_chunk()
        .ok_or(MusicDecodeError::MissingChunk { tag: name })??;

    if chunk.tag != tag || chunk.container != Some(container) {
        return Err(nesting(
            offset,
            format!(
                "expected {} {:?}, found {} {:?}",
                tag.as_str(),
                container,
                chunk.tag.as_str(),
                chunk.container
            ),
        ));
    }
    Ok(chunk)
}

/// Song count from the `INFO` chunk of the directory
fn read_song_count(directory: &Chunk<'_>) -> Result<u16, MusicDecodeError> {
    let mut count = None;
    let mut children = directory.children();
    while let Some(chunk) = children.next_chunk() {
        let chunk = chunk?;
        match chunk.tag {
            ChunkTag::Info if count.is_none() => {
                if chunk.body.len() < 2 {
                    return Err(MusicDecodeError::UnexpectedEndOfStream {
                        offset: chunk.body_offset + chunk.body.len(),
                    });
                }
                count = Some(LittleEndian::read_u16(chunk.body));
            }
            other => {
                return Err(nesting(
                    chunk.offset,
                    format!("{} chunk not allowed in XDIR", other.as_str()),
                ));
            }
        }
    }
    count.ok_or(MusicDecodeError::MissingChunk { tag: "INFO" })
}

fn expect_song_form(chunk: &Chunk<'_>) -> Result<(), MusicDecodeError> {
    if chunk.tag == ChunkTag::Form && chunk.container == Some(ContainerType::Xmid) {
        Ok(())
    } else {
        Err(nesting(
            chunk.offset,
            format!("{} chunk in CAT is not a FORM XMID", chunk.tag.as_str()),
        ))
    }
}

/// Decode one `FORM XMID`
fn decode_song(
    form: &Chunk<'_>,
    song_index: usize,
    options: &XmiOptions,
) -> Result<MusicSequence, MusicDecodeError> {
    let mut timb: Option<Chunk<'_>> = None;
    let mut rbrn: Option<Chunk<'_>> = None;
    let mut evnt: Option<Chunk<'_>> = None;

    let mut children = form.children();
    while let Some(chunk) = children.next_chunk() {
        let chunk = chunk?;
        let slot = match chunk.tag {
            ChunkTag::Timb => &mut timb,
            ChunkTag::Rbrn => &mut rbrn,
            ChunkTag::Evnt => &mut evnt,
            other => {
                return Err(nesting(
                    chunk.offset,
                    format!("{} chunk not allowed in FORM XMID", other.as_str()),
                ));
            }
        };
        if slot.is_some() {
            return Err(nesting(
                chunk.offset,
                format!("duplicate {} chunk", chunk.tag.as_str()),
            ));
        }
        *slot = Some(chunk);
    }

    let evnt = evnt.ok_or(MusicDecodeError::MissingChunk { tag: "EVNT" })?;
    let mut timbres = match &timb {
        Some(chunk) => TimbreTable::from_declared(read_timbres(chunk)?),
        None => TimbreTable::default(),
    };
    let branch_points = match &rbrn {
        Some(chunk) => read_branch_points(chunk, evnt.body.len())?,
        None => Vec::new(),
    };

    let decoded = decode_events(evnt.body, &mut timbres, options)?;
    tracing::debug!(
        "Song {}: {} events, {} timbres, {} branch points",
        song_index,
        decoded.events.len(),
        timbres.len(),
        branch_points.len()
    );

    Ok(MusicSequence {
        song_index,
        events: decoded.events,
        timbres,
        branch_points,
        total_ticks: decoded.total_ticks,
    })
}

/// `TIMB`: u16 count, then (patch, bank) byte pairs
fn read_timbres(chunk: &Chunk<'_>) -> Result<Vec<Timbre>, MusicDecodeError> {
    let rows = counted_records(chunk, 2)?;
    Ok(rows
        .chunks_exact(2)
        .map(|row| Timbre {
            patch: row[0],
            bank: row[1],
        })
        .collect())
}

/// `RBRN`: u16 count, then (u16 id, u32 offset) records
///
/// Bodies made only of whole records, whose count prefix does not match,
/// are read as bare records.
fn read_branch_points(
    chunk: &Chunk<'_>,
    event_len: usize,
) -> Result<Vec<BranchPoint>, MusicDecodeError> {
    let body = chunk.body;
    let counted_len = (body.len() >= 2)
        .then(|| 2 + usize::from(LittleEndian::read_u16(body)) * BRANCH_RECORD_SIZE);
    let rows = if counted_len != Some(body.len()) && body.len() % BRANCH_RECORD_SIZE == 0 {
        tracing::debug!("RBRN at {} has no record count", chunk.offset);
        body
    } else {
        counted_records(chunk, BRANCH_RECORD_SIZE)?
    };
    let points: Vec<BranchPoint> = rows
        .chunks_exact(BRANCH_RECORD_SIZE)
        .map(|row| BranchPoint {
            id: LittleEndian::read_u16(&row[..2]),
            offset: LittleEndian::read_u32(&row[2..6]),
        })
        .collect();

    for point in points.iter().filter(|p| p.offset as usize > event_len) {
        tracing::warn!(
            "Branch point {} targets offset {} past the {}-byte event stream",
            point.id,
            point.offset,
            event_len
        );
    }
    Ok(points)
}

/// Records of a chunk laid out as a u16 count followed by fixed-size rows
fn counted_records<'a>(
    chunk: &Chunk<'a>,
    record_size: usize,
) -> Result<&'a [u8], MusicDecodeError> {
    let body = chunk.body;
    if body.len() < 2 {
        return Err(MusicDecodeError::UnexpectedEndOfStream {
            offset: chunk.body_offset + body.len(),
        });
    }
    let count = usize::from(LittleEndian::read_u16(body));
    let needed = 2 + count * record_size;
    if body.len() < needed {
        return Err(MusicDecodeError::UnexpectedEndOfStream {
            offset: chunk.body_offset + body.len(),
        });
    }
    Ok(&body[2..needed])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::xmi::MusicEvent;
    use pretty_assertions::assert_eq;

    fn chunk(tag: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = tag.to_vec();
        out.extend_from_slice(&(body.len() as u32).to_be_bytes());
        out.extend_from_slice(body);
        if body.len() % 2 == 1 {
            out.push(0);
        }
        out
    }

    fn container(tag: &[u8; 4], kind: &[u8; 4], children: &[Vec<u8>]) -> Vec<u8> {
        let mut body = kind.to_vec();
        for child in children {
            body.extend_from_slice(child);
        }
        chunk(tag, &body)
    }

    fn song(children: &[Vec<u8>]) -> Vec<u8> {
        container(b"FORM", b"XMID", children)
    }

    fn xmi(declared: u16, songs: &[Vec<u8>]) -> Vec<u8> {
        let mut data = container(b"FORM", b"XDIR", &[chunk(b"INFO", &declared.to_le_bytes())]);
        data.extend(container(b"CAT ", b"XMID", songs));
        data
    }

    const SIMPLE_EVENTS: &[u8] = &[0xC0, 0x05, 0x90, 0x3C, 0x40, 0x10, 0xFF, 0x2F, 0x00];

    #[test]
    fn test_transcode_single_song() {
        let data = xmi(
            1,
            &[song(&[
                chunk(b"TIMB", &[1, 0, 5, 3]),
                chunk(b"EVNT", SIMPLE_EVENTS),
            ])],
        );
        let asset = transcode(&data, &XmiOptions::default()).unwrap();

        assert_eq!(asset.declared_songs, 1);
        assert_eq!(asset.songs.len(), 1);
        let sequence = asset.songs[0].sequence().unwrap();
        assert_eq!(sequence.timbres.declared_len(), 1);
        assert_eq!(
            sequence.events[0].event,
            MusicEvent::ProgramChange {
                channel: 0,
                patch: 5,
                bank: 3
            }
        );
        assert_eq!(sequence.total_ticks, 16);
        assert_eq!(sequence.note_count(), 1);
    }

    #[test]
    fn test_failing_song_does_not_stop_siblings() {
        let good = song(&[chunk(b"EVNT", SIMPLE_EVENTS)]);
        let bad = song(&[chunk(b"TIMB", &[0, 0])]);
        let data = xmi(3, &[good.clone(), bad, good]);

        let asset = transcode(&data, &XmiOptions::default()).unwrap();
        assert_eq!(asset.songs.len(), 3);
        assert!(asset.songs[0].sequence().is_some());
        assert_eq!(
            asset.songs[1].error(),
            Some(&MusicDecodeError::MissingChunk { tag: "EVNT" })
        );
        assert_eq!(asset.songs[2].sequence().map(|s| s.song_index), Some(2));
    }

    #[test]
    fn test_unknown_tag_in_song() {
        let data = xmi(
            1,
            &[song(&[chunk(b"EVNT", SIMPLE_EVENTS), chunk(b"JUNK", &[])])],
        );
        let asset = transcode(&data, &XmiOptions::default()).unwrap();
        assert!(asset.all_failed());
        assert!(matches!(
            asset.first_error(),
            Some(MusicDecodeError::UnknownChunkTag { tag, .. }) if tag == b"JUNK"
        ));
    }

    #[test]
    fn test_duplicate_chunk_is_malformed() {
        let data = xmi(
            1,
            &[song(&[
                chunk(b"EVNT", SIMPLE_EVENTS),
                chunk(b"EVNT", SIMPLE_EVENTS),
            ])],
        );
        let asset = transcode(&data, &XmiOptions::default()).unwrap();
        assert!(matches!(
            asset.first_error(),
            Some(MusicDecodeError::MalformedChunkNesting { .. })
        ));
    }

    #[test]
    fn test_wrong_leading_container() {
        let data = container(b"CAT ", b"XMID", &[]);
        assert!(matches!(
            transcode(&data, &XmiOptions::default()),
            Err(MusicDecodeError::MalformedChunkNesting { offset: 0, .. })
        ));
    }

    #[test]
    fn test_missing_song_container() {
        let data = container(b"FORM", b"XDIR", &[chunk(b"INFO", &1u16.to_le_bytes())]);
        assert_eq!(
            transcode(&data, &XmiOptions::default()).unwrap_err(),
            MusicDecodeError::MissingChunk { tag: "CAT " }
        );
    }

    #[test]
    fn test_no_songs() {
        assert_eq!(
            transcode(&xmi(1, &[]), &XmiOptions::default()).unwrap_err(),
            MusicDecodeError::NoSongs
        );
        let one = song(&[chunk(b"EVNT", SIMPLE_EVENTS)]);
        assert_eq!(
            transcode(&xmi(0, &[one]), &XmiOptions::default()).unwrap_err(),
            MusicDecodeError::NoSongs
        );
    }

    #[test]
    fn test_branch_points_recorded() {
        let mut rbrn = 2u16.to_le_bytes().to_vec();
        rbrn.extend_from_slice(&1u16.to_le_bytes());
        rbrn.extend_from_slice(&4u32.to_le_bytes());
        rbrn.extend_from_slice(&2u16.to_le_bytes());
        rbrn.extend_from_slice(&500u32.to_le_bytes());
        let data = xmi(
            1,
            &[song(&[chunk(b"RBRN", &rbrn), chunk(b"EVNT", SIMPLE_EVENTS)])],
        );

        let asset = transcode(&data, &XmiOptions::default()).unwrap();
        let sequence = asset.songs[0].sequence().unwrap();
        assert_eq!(
            sequence.branch_points,
            vec![
                BranchPoint { id: 1, offset: 4 },
                BranchPoint { id: 2, offset: 500 }
            ]
        );
    }

    #[test]
    fn test_branch_points_without_count() {
        let mut rbrn = 7u16.to_le_bytes().to_vec();
        rbrn.extend_from_slice(&3u32.to_le_bytes());
        let data = xmi(
            1,
            &[song(&[chunk(b"RBRN", &rbrn), chunk(b"EVNT", SIMPLE_EVENTS)])],
        );

        let asset = transcode(&data, &XmiOptions::default()).unwrap();
        assert_eq!(
            asset.songs[0].sequence().unwrap().branch_points,
            vec![BranchPoint { id: 7, offset: 3 }]
        );
    }

    #[test]
    fn test_unknown_song_container_keeps_siblings() {
        let good = song(&[chunk(b"EVNT", SIMPLE_EVENTS)]);
        let odd = container(b"FORM", b"XXXX", &[chunk(b"EVNT", SIMPLE_EVENTS)]);
        let data = xmi(3, &[good.clone(), odd, good]);

        let asset = transcode(&data, &XmiOptions::default()).unwrap();
        assert_eq!(asset.songs.len(), 3);
        assert!(matches!(
            asset.songs[1].error(),
            Some(MusicDecodeError::UnknownChunkTag { tag, .. }) if tag == b"XXXX"
        ));
        assert_eq!(asset.songs[2].sequence().map(|s| s.song_index), Some(2));
    }

    #[test]
    fn test_unknown_chunk_in_catalog_keeps_siblings() {
        let good = song(&[chunk(b"EVNT", SIMPLE_EVENTS)]);
        let data = xmi(3, &[good.clone(), chunk(b"JUNK", &[1, 2, 3]), good]);

        let asset = transcode(&data, &XmiOptions::default()).unwrap();
        assert_eq!(asset.songs.len(), 3);
        assert_eq!(asset.failed_count(), 1);
        assert!(matches!(
            asset.songs[1].error(),
            Some(MusicDecodeError::UnknownChunkTag { tag, .. }) if tag == b"JUNK"
        ));
        assert!(asset.songs[2].sequence().is_some());
    }

    #[test]
    fn test_transcode_is_repeatable() {
        let data = xmi(
            2,
            &[
                song(&[chunk(b"TIMB", &[1, 0, 5, 3]), chunk(b"EVNT", SIMPLE_EVENTS)]),
                song(&[chunk(b"EVNT", &[0x64, 0x90, 0x3C, 0x40, 0x83, 0x60, 0xFF, 0x2F, 0x00])]),
            ],
        );
        let first = transcode(&data, &XmiOptions::default()).unwrap();
        let second = transcode(&data, &XmiOptions::default()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.sequences().count(), 2);
    }

    #[test]
    fn test_truncated_timbre_table() {
        let data = xmi(
            1,
            &[song(&[chunk(b"TIMB", &[3, 0, 1, 1]), chunk(b"EVNT", SIMPLE_EVENTS)])],
        );
        let asset = transcode(&data, &XmiOptions::default()).unwrap();
        assert!(matches!(
            asset.first_error(),
            Some(MusicDecodeError::UnexpectedEndOfStream { .. })
        ));
    }
}
