use crate::crc::Crc32;

pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Animation control chunk: num_frames (u32 BE) then num_plays (u32 BE).
pub const ANIMATION_CONTROL: [u8; 4] = *b"acTL";

/// Location of one chunk inside a stream. Offsets are absolute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader {
    pub offset: usize,
    pub length: u32,
    pub tag: [u8; 4],
}

impl ChunkHeader {
    pub fn tag_offset(&self) -> usize {
        self.offset + 4
    }

    pub fn data_offset(&self) -> usize {
        self.offset + 8
    }

    /// Offset of the trailing checksum, `None` if it overflows `usize`.
    pub fn crc_offset(&self) -> Option<usize> {
        self.data_offset().checked_add(self.length as usize)
    }

    pub fn end(&self) -> Option<usize> {
        self.crc_offset()?.checked_add(4)
    }

    /// True when data and checksum both fit in a stream of `stream_len` bytes.
    pub fn fits_within(&self, stream_len: usize) -> bool {
        self.end().is_some_and(|end| end <= stream_len)
    }

    pub fn tag_str(&self) -> String {
        String::from_utf8_lossy(&self.tag).into_owned()
    }

    /// Checksum over tag and data as it currently sits in `bytes`.
    pub fn compute_crc(&self, bytes: &[u8]) -> Option<u32> {
        let crc_offset = self.crc_offset()?;
        let covered = bytes.get(self.tag_offset()..crc_offset)?;
        let mut crc = Crc32::new();
        crc.update(covered);
        Some(crc.finish())
    }

    pub fn stored_crc(&self, bytes: &[u8]) -> Option<u32> {
        read_u32_be(bytes, self.crc_offset()?)
    }

    pub fn crc_matches(&self, bytes: &[u8]) -> bool {
        match (self.compute_crc(bytes), self.stored_crc(bytes)) {
            (Some(computed), Some(stored)) => computed == stored,
            _ => false,
        }
    }
}

/// Walks chunk headers from offset 8 without decoding chunk data.
///
/// Headers are yielded as long as the 8-byte length/tag prefix is present; a
/// yielded chunk may still claim more data than the stream holds, which
/// callers check with [`ChunkHeader::fits_within`].
pub struct ChunkScanner<'a> {
    bytes: &'a [u8],
    cursor: Option<usize>,
}

impl<'a> ChunkScanner<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            cursor: Some(PNG_SIGNATURE.len()),
        }
    }
}

impl<'a> Iterator for ChunkScanner<'a> {
    type Item = ChunkHeader;

    fn next(&mut self) -> Option<Self::Item> {
        let offset = self.cursor?;
        if offset.checked_add(8)? > self.bytes.len() {
            self.cursor = None;
            return None;
        }
        let length = read_u32_be(self.bytes, offset)?;
        let mut tag = [0u8; 4];
        tag.copy_from_slice(&self.bytes[offset + 4..offset + 8]);
        let header = ChunkHeader {
            offset,
            length,
            tag,
        };
        self.cursor = header.end();
        Some(header)
    }
}

pub fn has_png_signature(bytes: &[u8]) -> bool {
    bytes.starts_with(&PNG_SIGNATURE)
}

pub fn read_u32_be(bytes: &[u8], offset: usize) -> Option<u32> {
    let end = offset.checked_add(4)?;
    let raw: [u8; 4] = bytes.get(offset..end)?.try_into().ok()?;
    Some(u32::from_be_bytes(raw))
}

pub fn write_u32_be(bytes: &mut [u8], offset: usize, value: u32) -> Option<()> {
    let end = offset.checked_add(4)?;
    bytes.get_mut(offset..end)?.copy_from_slice(&value.to_be_bytes());
    Some(())
}

/// Append a complete chunk (length, tag, data, checksum) to `out`.
pub fn push_chunk(out: &mut Vec<u8>, tag: [u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(&tag);
    out.extend_from_slice(data);
    let mut crc = Crc32::new();
    crc.update(&tag);
    crc.update(data);
    out.extend_from_slice(&crc.finish().to_be_bytes());
}
