//! Container encoder abstraction and the default APNG implementation.

mod apng;
mod palette;

use async_trait::async_trait;
use apngfit_types::{frame::PixelBuffer, ApngFitError, Result};

pub use apng::ApngEncoder;
pub use palette::{pack_indices, SharedPalette};

/// One encoder invocation: frames, matching delays and the palette cap.
#[derive(Debug, Clone)]
pub struct EncodeRequest {
    frames: Vec<PixelBuffer>,
    delays_ms: Vec<u32>,
    width: u32,
    height: u32,
    palette_size: u16,
}

impl EncodeRequest {
    pub fn new(
        frames: Vec<PixelBuffer>,
        delays_ms: Vec<u32>,
        width: u32,
        height: u32,
        palette_size: u16,
    ) -> Result<Self> {
        if frames.is_empty() {
            return Err(ApngFitError::EmptyInput);
        }
        if frames.len() != delays_ms.len() {
            return Err(encoder_error(format!(
                "{} frames but {} delays",
                frames.len(),
                delays_ms.len()
            )));
        }
        if !(1..=256).contains(&palette_size) {
            return Err(encoder_error(format!(
                "palette size {palette_size} outside 1..=256"
            )));
        }
        if let Some(bad) = frames
            .iter()
            .position(|f| f.width() != width || f.height() != height)
        {
            return Err(encoder_error(format!(
                "frame {bad} is {}x{}, canvas is {width}x{height}",
                frames[bad].width(),
                frames[bad].height()
            )));
        }
        Ok(Self {
            frames,
            delays_ms,
            width,
            height,
            palette_size,
        })
    }

    pub fn frames(&self) -> &[PixelBuffer] {
        &self.frames
    }

    pub fn delays_ms(&self) -> &[u32] {
        &self.delays_ms
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn palette_size(&self) -> u16 {
        self.palette_size
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

/// Turns pixel buffers into an animated container byte stream.
///
/// Implementations must emit an `acTL` chunk so the loop count can be patched
/// afterwards; they are not asked for the loop count themselves.
#[async_trait]
pub trait ContainerEncoder: Send + Sync {
    async fn encode(&self, request: &EncodeRequest) -> Result<Vec<u8>>;
}

pub fn encoder_error(message: impl Into<String>) -> ApngFitError {
    ApngFitError::Encoder(message.into())
}
