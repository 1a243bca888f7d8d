use std::{fmt, sync::Arc};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{policy::clamp_delay_ms, ApngFitError, Result};

/// Immutable RGBA pixel buffer, row-major, one byte per channel.
///
/// The bytes are shared, so cloning a buffer (or a frame that holds it) never
/// copies pixel data. Transformations build a new buffer instead.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Arc<[u8]>,
}

impl PixelBuffer {
    pub const CHANNELS: usize = 4;

    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        let expected = Self::byte_len(width, height);
        if data.len() != expected {
            return Err(ApngFitError::Raster(format!(
                "pixel buffer for {width}x{height} must hold {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data: data.into(),
        })
    }

    pub fn transparent(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0u8; Self::byte_len(width, height)].into(),
        }
    }

    pub fn byte_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * Self::CHANNELS
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn pixel_count(&self) -> usize {
        self.data.len() / Self::CHANNELS
    }

    /// True when both buffers share the same backing allocation.
    pub fn shares_storage(&self, other: &PixelBuffer) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// A rasterized source image with its display delay.
#[derive(Debug, Clone)]
pub struct Frame {
    pub id: Uuid,
    pub name: String,
    pub pixels: PixelBuffer,
    delay_ms: u32,
    pub created_at: DateTime<Utc>,
}

impl Frame {
    pub fn new(name: impl Into<String>, pixels: PixelBuffer, delay_ms: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            pixels,
            delay_ms: clamp_delay_ms(delay_ms),
            created_at: Utc::now(),
        }
    }

    /// Derive a frame carrying new pixels; identity, name and delay are kept.
    pub fn with_pixels(&self, pixels: PixelBuffer) -> Self {
        Self {
            id: self.id,
            name: self.name.clone(),
            pixels,
            delay_ms: self.delay_ms,
            created_at: Utc::now(),
        }
    }

    pub fn delay_ms(&self) -> u32 {
        self.delay_ms
    }

    pub fn set_delay_ms(&mut self, delay_ms: u32) {
        self.delay_ms = clamp_delay_ms(delay_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_length() {
        assert!(PixelBuffer::from_rgba(2, 2, vec![0; 15]).is_err());
        let buffer = PixelBuffer::from_rgba(2, 2, vec![7; 16]).expect("valid buffer");
        assert_eq!(buffer.pixel_count(), 4);
    }

    #[test]
    fn derived_frame_keeps_identity() {
        let frame = Frame::new("a.png", PixelBuffer::transparent(1, 1), 500);
        let derived = frame.with_pixels(PixelBuffer::from_rgba(1, 1, vec![1, 2, 3, 4]).unwrap());
        assert_eq!(derived.id, frame.id);
        assert_eq!(derived.delay_ms(), 500);
        assert!(!derived.pixels.shares_storage(&frame.pixels));
    }

    #[test]
    fn delay_is_clamped() {
        let mut frame = Frame::new("a.png", PixelBuffer::transparent(1, 1), 1);
        assert_eq!(frame.delay_ms(), 10);
        frame.set_delay_ms(10_000);
        assert_eq!(frame.delay_ms(), 4000);
    }
}
