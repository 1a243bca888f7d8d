use std::time::Duration;

use apngfit_types::{
    config::ApngFitConfig,
    policy::{clamp_frame_count, clamp_loops, CANVAS_HEIGHT, CANVAS_WIDTH, MIN_FRAMES, SIZE_LIMIT},
    quality::QualityTier,
};

/// Immutable description of one artifact request.
#[derive(Debug, Clone)]
pub struct EncodeSettings {
    /// Requested sequence length before snapping to whole cycles.
    pub frame_count: usize,
    pub loops: u32,
    pub quality: QualityTier,
    pub min_palette: u16,
    pub posterize_limit: Option<u8>,
    pub size_limit: usize,
    /// Pause between encoder attempts; zero disables pacing.
    pub pacing: Duration,
    pub canvas_width: u32,
    pub canvas_height: u32,
}

impl Default for EncodeSettings {
    fn default() -> Self {
        Self {
            frame_count: MIN_FRAMES,
            loops: 1,
            quality: QualityTier::High,
            min_palette: 4,
            posterize_limit: Some(4),
            size_limit: SIZE_LIMIT,
            pacing: Duration::ZERO,
            canvas_width: CANVAS_WIDTH,
            canvas_height: CANVAS_HEIGHT,
        }
    }
}

impl EncodeSettings {
    pub fn from_config(config: &ApngFitConfig) -> Self {
        Self {
            frame_count: clamp_frame_count(config.timing.frame_count),
            loops: clamp_loops(config.timing.loops),
            quality: config.encode.quality,
            min_palette: config.encode.min_palette,
            posterize_limit: config.encode.posterize_limit,
            size_limit: config.encode.size_limit_bytes,
            pacing: Duration::from_millis(config.encode.pacing_ms),
            ..Self::default()
        }
    }
}
