//! IFF chunk reader with a fixed tag schema

use byteorder::{BigEndian, ByteOrder};

use crate::error::MusicDecodeError;

/// Size of a chunk header (tag + big-endian size)
pub(crate) const CHUNK_HEADER_SIZE: usize = 8;

/// Every chunk tag an XMIDI file may contain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChunkTag {
    Form,
    Cat,
    Info,
    Timb,
    Rbrn,
    Evnt,
}

impl ChunkTag {
    fn from_bytes(tag: [u8; 4]) -> Option<Self> {
        match &tag {
            b"FORM" => Some(Self::Form),
            b"CAT " => Some(Self::Cat),
            b"INFO" => Some(Self::Info),
            b"TIMB" => Some(Self::Timb),
            b"RBRN" => Some(Self::Rbrn),
            b"EVNT" => Some(Self::Evnt),
            _ => None,
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Form => "FORM",
            Self::Cat => "CAT ",
            Self::Info => "INFO",
            Self::Timb => "TIMB",
            Self::Rbrn => "RBRN",
            Self::Evnt => "EVNT",
        }
    }

    /// Containers carry a 4-byte type before their children
    fn is_container(self) -> bool {
        matches!(self, Self::Form | Self::Cat)
    }
}

/// Container type of a `FORM` or `CAT ` chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ContainerType {
    Xdir,
    Xmid,
}

impl ContainerType {
    fn from_bytes(kind: [u8; 4]) -> Option<Self> {
        match &kind {
            b"XDIR" => Some(Self::Xdir),
            b"XMID" => Some(Self::Xmid),
            _ => None,
        }
    }
}

/// One chunk borrowed from the input buffer
#[derive(Debug, Clone, Copy)]
pub(crate) struct Chunk<'a> {
    pub tag: ChunkTag,
    /// Container type, for `FORM` and `CAT ` chunks
    pub container: Option<ContainerType>,
    /// Offset of the chunk header in the whole buffer
    pub offset: usize,
    /// Body (after the container type, for containers)
    pub body: &'a [u8],
    /// Offset of `body` in the whole buffer
    pub body_offset: usize,
}

impl<'a> Chunk<'a> {
    /// Reader over the children of a container chunk
    pub(crate) fn children(&self) -> ChunkReader<'a> {
        ChunkReader::new(self.body, self.body_offset)
    }
}

/// Sequential reader over sibling chunks
pub(crate) struct ChunkReader<'a> {
    data: &'a [u8],
    pos: usize,
    /// Offset of `data` in the whole buffer
    base: usize,
}

impl<'a> ChunkReader<'a> {
    pub(crate) fn new(data: &'a [u8], base: usize) -> Self {
        Self { data, pos: 0, base }
    }

    /// Offset of the next unread byte in the whole buffer
    pub(crate) fn position(&self) -> usize {
        self.base + self.pos
    }

    pub(crate) fn is_at_end(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Read the next chunk, or `None` at the end of the parent
    ///
    /// A chunk with a readable size is always stepped over, so an unknown
    /// tag or container type does not hide the siblings after it. Framing
    /// errors end the reader.
    pub(crate) fn next_chunk(&mut self) -> Option<Result<Chunk<'a>, MusicDecodeError>> {
        if self.is_at_end() {
            return None;
        }
        let offset = self.position();
        let remaining = &self.data[self.pos..];
        if remaining.len() < CHUNK_HEADER_SIZE {
            self.pos = self.data.len();
            return Some(Err(nesting(
                offset,
                format!("{} bytes left, chunk header needs 8", remaining.len()),
            )));
        }

        let mut raw_tag = [0u8; 4];
        raw_tag.copy_from_slice(&remaining[..4]);
        let size = BigEndian::read_u32(&remaining[4..8]) as usize;
        let available = remaining.len() - CHUNK_HEADER_SIZE;
        if size > available {
            self.pos = self.data.len();
            return Some(Err(nesting(
                offset,
                format!(
                    "{} chunk claims {size} bytes, parent has {available} left",
                    String::from_utf8_lossy(&raw_tag)
                ),
            )));
        }

        // Bodies are padded to even length; a missing final pad byte is tolerated
        let padded = size + (size & 1);
        self.pos = (self.pos + CHUNK_HEADER_SIZE + padded).min(self.data.len());

        let body = &remaining[CHUNK_HEADER_SIZE..CHUNK_HEADER_SIZE + size];
        Some(Self::parse_chunk(raw_tag, offset, body))
    }

    /// Check the tag and container type of a framed chunk
    fn parse_chunk(
        raw_tag: [u8; 4],
        offset: usize,
        body: &'a [u8],
    ) -> Result<Chunk<'a>, MusicDecodeError> {
        let tag = ChunkTag::from_bytes(raw_tag)
            .ok_or(MusicDecodeError::UnknownChunkTag { tag: raw_tag, offset })?;

        let mut body = body;
        let mut body_offset = offset + CHUNK_HEADER_SIZE;
        let mut container = None;

        if tag.is_container() {
            if body.len() < 4 {
                return Err(nesting(
                    offset,
                    format!("{} chunk too small for a container type", tag.as_str()),
                ));
            }
            let mut raw_kind = [0u8; 4];
            raw_kind.copy_from_slice(&body[..4]);
            container = Some(ContainerType::from_bytes(raw_kind).ok_or(
                MusicDecodeError::UnknownChunkTag {
                    tag: raw_kind,
                    offset: body_offset,
                },
            )?);
            body = &body[4..];
            body_offset += 4;
        }

        tracing::debug!("Chunk {} at {}, {} bytes", tag.as_str(), offset, body.len());

        Ok(Chunk {
            tag,
            container,
            offset,
            body,
            body_offset,
        })
    }
}

pub(crate) fn nesting(offset: usize, reason: String) -> MusicDecodeError {
    MusicDecodeError::MalformedChunkNesting { offset, reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(tag: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = tag.to_vec();
        out.extend_from_slice(&(body.len() as u32).to_be_bytes());
        out.extend_from_slice(body);
        if body.len() % 2 == 1 {
            out.push(0);
        }
        out
    }

    #[test]
    fn test_reads_siblings_with_padding() {
        let mut data = chunk(b"TIMB", &[1, 0, 5]);
        data.extend(chunk(b"EVNT", &[0xFF, 0x2F, 0x00, 0x00]));

        let mut reader = ChunkReader::new(&data, 100);
        let first = reader.next_chunk().unwrap().unwrap();
        assert_eq!(first.tag, ChunkTag::Timb);
        assert_eq!(first.body, &[1, 0, 5]);
        assert_eq!(first.body_offset, 108);

        let second = reader.next_chunk().unwrap().unwrap();
        assert_eq!(second.tag, ChunkTag::Evnt);
        assert_eq!(second.offset, 112);
        assert!(reader.next_chunk().is_none());
    }

    #[test]
    fn test_container_type() {
        let data = chunk(b"FORM", b"XMIDEVNT\0\0\0\0");
        let mut reader = ChunkReader::new(&data, 0);
        let form = reader.next_chunk().unwrap().unwrap();
        assert_eq!(form.container, Some(ContainerType::Xmid));

        let mut children = form.children();
        let evnt = children.next_chunk().unwrap().unwrap();
        assert_eq!(evnt.tag, ChunkTag::Evnt);
        assert!(evnt.body.is_empty());
    }

    #[test]
    fn test_unknown_tag() {
        let data = chunk(b"JUNK", &[0, 0]);
        let mut reader = ChunkReader::new(&data, 0);
        assert!(matches!(
            reader.next_chunk(),
            Some(Err(MusicDecodeError::UnknownChunkTag { tag, offset: 0 })) if &tag == b"JUNK"
        ));
        assert!(reader.next_chunk().is_none());
    }

    #[test]
    fn test_reading_continues_after_unknown_tags() {
        let mut data = chunk(b"JUNK", &[1, 2, 3]);
        data.extend(chunk(b"FORM", b"XXXXEVNT\0\0\0\0"));
        data.extend(chunk(b"EVNT", &[0xFF, 0x2F, 0x00]));
        let mut reader = ChunkReader::new(&data, 0);

        assert!(matches!(
            reader.next_chunk(),
            Some(Err(MusicDecodeError::UnknownChunkTag { tag, offset: 0 })) if &tag == b"JUNK"
        ));
        assert!(matches!(
            reader.next_chunk(),
            Some(Err(MusicDecodeError::UnknownChunkTag { tag, offset: 20 })) if &tag == b"XXXX"
        ));
        let evnt = reader.next_chunk().unwrap().unwrap();
        assert_eq!(evnt.tag, ChunkTag::Evnt);
        assert_eq!(evnt.offset, 32);
        assert!(reader.next_chunk().is_none());
    }

    #[test]
    fn test_child_past_parent() {
        let mut data = b"EVNT".to_vec();
        data.extend_from_slice(&100u32.to_be_bytes());
        data.extend_from_slice(&[0; 10]);
        let mut reader = ChunkReader::new(&data, 0);
        assert!(matches!(
            reader.next_chunk(),
            Some(Err(MusicDecodeError::MalformedChunkNesting { offset: 0, .. }))
        ));
        assert!(reader.next_chunk().is_none());
    }
}
