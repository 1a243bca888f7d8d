//! Byte-level helpers for PNG-family chunk streams: CRC-32 checksums, chunk
//! scanning and the in-place animation loop-count patch.

pub mod chunk;
pub mod crc;
pub mod patch;

pub use chunk::{
    has_png_signature, push_chunk, ChunkHeader, ChunkScanner, ANIMATION_CONTROL, PNG_SIGNATURE,
};
pub use crc::{crc32, Crc32};
pub use patch::{patch_in_place, read_animation_control, set_loop_count, PatchOutcome};
