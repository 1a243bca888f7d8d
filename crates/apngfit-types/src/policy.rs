//! Fixed policy constants. These are not runtime-negotiable.

pub const CANVAS_WIDTH: u32 = 600;
pub const CANVAS_HEIGHT: u32 = 400;

pub const MIN_FRAMES: usize = 5;
pub const MAX_FRAMES: usize = 20;

pub const SIZE_LIMIT: usize = 300 * 1024;

pub const MIN_DELAY_MS: u32 = 10;
pub const MAX_DELAY_MS: u32 = 4000;

pub const MIN_LOOPS: u32 = 1;
pub const MAX_LOOPS: u32 = 4;

pub const MIN_DURATION_SEC: f32 = 1.0;
pub const MAX_DURATION_SEC: f32 = 4.0;

pub const MAX_FILES: usize = 20;
pub const MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

pub const SUPPORTED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

/// Every palette size the budgeted search may try, most colours first.
pub const PALETTE_CANDIDATES: [u16; 7] = [256, 128, 64, 32, 16, 8, 4];

/// Posterization bit depths, mildest first.
pub const POSTERIZE_DEPTHS: [u8; 3] = [6, 5, 4];

pub fn clamp_delay_ms(delay_ms: u32) -> u32 {
    delay_ms.clamp(MIN_DELAY_MS, MAX_DELAY_MS)
}

pub fn clamp_frame_count(count: usize) -> usize {
    count.clamp(MIN_FRAMES, MAX_FRAMES)
}

pub fn clamp_loops(loops: u32) -> u32 {
    loops.clamp(MIN_LOOPS, MAX_LOOPS)
}
