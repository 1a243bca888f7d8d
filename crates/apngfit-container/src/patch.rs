use tracing::{debug, warn};

use crate::chunk::{read_u32_be, write_u32_be, ChunkScanner, ANIMATION_CONTROL};

const ANIMATION_CONTROL_MIN_LEN: u32 = 8;

/// What happened when the loop count was written into a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    Patched { frame_count: u32, previous_plays: u32 },
    /// No animation control chunk; the stream is returned untouched.
    ChunkMissing,
    /// The chunk is too short or runs past the end; the stream is returned untouched.
    Malformed,
}

impl PatchOutcome {
    pub fn is_patched(&self) -> bool {
        matches!(self, PatchOutcome::Patched { .. })
    }
}

/// Overwrite `num_plays` in the first `acTL` chunk and refresh its checksum.
///
/// Only the four play-count bytes and the four checksum bytes can change; the
/// stream length and every other byte stay as they were.
pub fn set_loop_count(mut bytes: Vec<u8>, loops: u32) -> (Vec<u8>, PatchOutcome) {
    let outcome = patch_in_place(&mut bytes, loops);
    (bytes, outcome)
}

pub fn patch_in_place(bytes: &mut [u8], loops: u32) -> PatchOutcome {
    let Some(header) = ChunkScanner::new(bytes).find(|h| h.tag == ANIMATION_CONTROL) else {
        debug!("no acTL chunk found; loop count left unset");
        return PatchOutcome::ChunkMissing;
    };

    if header.length < ANIMATION_CONTROL_MIN_LEN || !header.fits_within(bytes.len()) {
        warn!(
            "acTL chunk at offset {} is malformed (length {}, stream {} bytes); loop count left unset",
            header.offset,
            header.length,
            bytes.len()
        );
        return PatchOutcome::Malformed;
    }

    let data = header.data_offset();
    // fits_within guarantees every offset below is in range.
    let (Some(frame_count), Some(previous_plays), Some(crc_offset)) = (
        read_u32_be(bytes, data),
        read_u32_be(bytes, data + 4),
        header.crc_offset(),
    ) else {
        return PatchOutcome::Malformed;
    };

    if write_u32_be(bytes, data + 4, loops).is_none() {
        return PatchOutcome::Malformed;
    }
    let Some(crc) = header.compute_crc(bytes) else {
        return PatchOutcome::Malformed;
    };
    if write_u32_be(bytes, crc_offset, crc).is_none() {
        return PatchOutcome::Malformed;
    }

    debug!(
        "acTL patched: frames={} plays {} -> {}",
        frame_count, previous_plays, loops
    );
    PatchOutcome::Patched {
        frame_count,
        previous_plays,
    }
}

/// Read `(num_frames, num_plays)` from the first well-formed `acTL` chunk.
pub fn read_animation_control(bytes: &[u8]) -> Option<(u32, u32)> {
    let header = ChunkScanner::new(bytes).find(|h| h.tag == ANIMATION_CONTROL)?;
    if header.length < ANIMATION_CONTROL_MIN_LEN || !header.fits_within(bytes.len()) {
        return None;
    }
    let data = header.data_offset();
    Some((read_u32_be(bytes, data)?, read_u32_be(bytes, data + 4)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{push_chunk, ChunkHeader, PNG_SIGNATURE};

    fn actl_data(frames: u32, plays: u32) -> Vec<u8> {
        let mut data = frames.to_be_bytes().to_vec();
        data.extend_from_slice(&plays.to_be_bytes());
        data
    }

    fn synthetic_apng(frames: u32, plays: u32) -> Vec<u8> {
        let mut bytes = PNG_SIGNATURE.to_vec();
        push_chunk(&mut bytes, *b"IHDR", &[0, 0, 2, 88, 0, 0, 1, 144, 8, 3, 0, 0, 0]);
        push_chunk(&mut bytes, ANIMATION_CONTROL, &actl_data(frames, plays));
        push_chunk(&mut bytes, *b"IDAT", &[0x78, 0x9c, 0x03, 0x00]);
        push_chunk(&mut bytes, *b"IEND", &[]);
        bytes
    }

    #[test]
    fn patches_plays_and_checksum_only() {
        let original = synthetic_apng(10, 0);
        let (patched, outcome) = set_loop_count(original.clone(), 3);

        assert_eq!(
            outcome,
            PatchOutcome::Patched {
                frame_count: 10,
                previous_plays: 0
            }
        );
        assert_eq!(patched.len(), original.len());

        let actl = ChunkScanner::new(&original)
            .find(|h| h.tag == ANIMATION_CONTROL)
            .expect("acTL present");
        let plays = actl.data_offset() + 4..actl.data_offset() + 8;
        let crc_start = actl.crc_offset().unwrap();
        let crc = crc_start..crc_start + 4;
        for (idx, (a, b)) in original.iter().zip(&patched).enumerate() {
            if a != b {
                assert!(
                    plays.contains(&idx) || crc.contains(&idx),
                    "byte {idx} changed outside the acTL play count and checksum"
                );
            }
        }

        let before: Vec<(u32, [u8; 4])> = ChunkScanner::new(&original)
            .map(|h| (h.length, h.tag))
            .collect();
        let after: Vec<ChunkHeader> = ChunkScanner::new(&patched).collect();
        assert_eq!(
            before,
            after.iter().map(|h| (h.length, h.tag)).collect::<Vec<_>>()
        );
        assert!(after.iter().all(|h| h.crc_matches(&patched)));
        assert_eq!(read_animation_control(&patched), Some((10, 3)));
    }

    #[test]
    fn stream_without_actl_is_untouched() {
        let mut bytes = PNG_SIGNATURE.to_vec();
        push_chunk(&mut bytes, *b"IHDR", &[0u8; 13]);
        push_chunk(&mut bytes, *b"IEND", &[]);
        let (patched, outcome) = set_loop_count(bytes.clone(), 2);
        assert_eq!(outcome, PatchOutcome::ChunkMissing);
        assert_eq!(patched, bytes);
    }

    #[test]
    fn short_actl_is_untouched() {
        let mut bytes = PNG_SIGNATURE.to_vec();
        push_chunk(&mut bytes, ANIMATION_CONTROL, &[0, 0, 0, 4]);
        push_chunk(&mut bytes, *b"IEND", &[]);
        let (patched, outcome) = set_loop_count(bytes.clone(), 2);
        assert_eq!(outcome, PatchOutcome::Malformed);
        assert_eq!(patched, bytes);
    }

    #[test]
    fn truncated_actl_is_untouched() {
        let mut bytes = synthetic_apng(5, 0);
        let actl = ChunkScanner::new(&bytes)
            .find(|h| h.tag == ANIMATION_CONTROL)
            .unwrap();
        bytes.truncate(actl.data_offset() + 6);
        let (patched, outcome) = set_loop_count(bytes.clone(), 4);
        assert_eq!(outcome, PatchOutcome::Malformed);
        assert_eq!(patched, bytes);
    }

    #[test]
    fn repatching_is_stable() {
        let (once, _) = set_loop_count(synthetic_apng(7, 0), 2);
        let (twice, outcome) = set_loop_count(once.clone(), 2);
        assert_eq!(
            outcome,
            PatchOutcome::Patched {
                frame_count: 7,
                previous_plays: 2
            }
        );
        assert_eq!(once, twice);
    }
}
