use apngfit_types::{
    frame::{Frame, PixelBuffer},
    policy::{clamp_delay_ms, clamp_frame_count, MAX_FRAMES, MIN_FRAMES},
};

/// Length of the encoded sequence for `base_count` active frames and a requested count.
///
/// Prefers whole cycles of the base list; when no multiple fits in
/// `MIN_FRAMES..=MAX_FRAMES` the result is clamped and the last cycle is partial.
pub fn effective_target_count(base_count: usize, selected: usize) -> usize {
    let base = base_count.max(1);
    let selected = clamp_frame_count(selected);

    let mut target = base * selected.div_ceil(base);
    if target < MIN_FRAMES {
        target = base * MIN_FRAMES.div_ceil(base);
    }
    if target > MAX_FRAMES {
        let whole = MAX_FRAMES / base;
        target = if whole > 0 { base * whole } else { MAX_FRAMES };
    }
    clamp_frame_count(target)
}

/// Frame count to select right after a library of `n` frames was loaded.
pub fn default_frame_count(n: usize) -> usize {
    if (MIN_FRAMES..=MAX_FRAMES).contains(&n) {
        return n;
    }
    let base = n.max(1);
    let mut target = base * MIN_FRAMES.div_ceil(base);
    if target > MAX_FRAMES {
        let whole = MAX_FRAMES / base;
        target = if whole > 0 { base * whole } else { MIN_FRAMES };
    }
    clamp_frame_count(target)
}

/// Per-frame delay that spreads `duration_sec` evenly over `target` frames.
pub fn even_delay_ms(duration_sec: f32, target: usize) -> u32 {
    let ms = (duration_sec as f64 * 1000.0 / target.max(1) as f64).round();
    ms.max(0.0) as u32
}

/// Base frames repeated cyclically up to the target length.
#[derive(Debug, Clone, Default)]
pub struct FrameSequence {
    frames: Vec<Frame>,
}

impl FrameSequence {
    /// Entry `i` is `base[i % base.len()]`; an empty base gives an empty sequence.
    pub fn build(base: &[Frame], selected: usize) -> Self {
        if base.is_empty() {
            return Self::default();
        }
        let target = effective_target_count(base.len(), selected);
        let frames = (0..target)
            .map(|i| {
                let mut frame = base[i % base.len()].clone();
                frame.set_delay_ms(clamp_delay_ms(frame.delay_ms()));
                frame
            })
            .collect();
        Self { frames }
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn buffers(&self) -> Vec<PixelBuffer> {
        self.frames.iter().map(|f| f.pixels.clone()).collect()
    }

    pub fn delays_ms(&self) -> Vec<u32> {
        self.frames.iter().map(|f| f.delay_ms()).collect()
    }
}
