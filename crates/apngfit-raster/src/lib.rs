//! Rasterization of source images onto the fixed animation canvas.

use async_trait::async_trait;
use image::{imageops, imageops::FilterType, RgbaImage};
use tracing::debug;

use apngfit_types::{frame::PixelBuffer, quality::AspectMode, ApngFitError, Result};

#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// Decode `source` and draw it onto a transparent `width`x`height` RGBA canvas.
    async fn rasterize(
        &self,
        source: &[u8],
        width: u32,
        height: u32,
        aspect: AspectMode,
    ) -> Result<PixelBuffer>;
}

/// Where a scaled source lands on the canvas. Offsets may be negative when cropping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

pub fn placement(
    src_width: u32,
    src_height: u32,
    canvas_width: u32,
    canvas_height: u32,
    aspect: AspectMode,
) -> Placement {
    if aspect == AspectMode::Stretch || src_width == 0 || src_height == 0 {
        return Placement {
            x: 0,
            y: 0,
            width: canvas_width,
            height: canvas_height,
        };
    }
    let sx = canvas_width as f64 / src_width as f64;
    let sy = canvas_height as f64 / src_height as f64;
    let scale = match aspect {
        AspectMode::Fit => sx.min(sy),
        _ => sx.max(sy),
    };
    let width = (src_width as f64 * scale).round().max(1.0) as u32;
    let height = (src_height as f64 * scale).round().max(1.0) as u32;
    Placement {
        x: ((canvas_width as f64 - width as f64) / 2.0).floor() as i64,
        y: ((canvas_height as f64 - height as f64) / 2.0).floor() as i64,
        width,
        height,
    }
}

/// Rasterizer built on the `image` crate with Lanczos3 resampling.
#[derive(Debug, Clone, Copy)]
pub struct ImageRasterizer {
    filter: FilterType,
}

impl ImageRasterizer {
    pub fn new() -> Self {
        Self {
            filter: FilterType::Lanczos3,
        }
    }

    fn rasterize_blocking(
        &self,
        source: &[u8],
        width: u32,
        height: u32,
        aspect: AspectMode,
    ) -> Result<PixelBuffer> {
        let decoded = image::load_from_memory(source)
            .map_err(|err| raster_error(format!("image decoding failed: {err}")))?
            .to_rgba8();
        let (src_width, src_height) = decoded.dimensions();
        let place = placement(src_width, src_height, width, height, aspect);
        debug!(
            "Rasterizing {}x{} source with {:?} -> {:?}",
            src_width, src_height, aspect, place
        );

        let scaled = imageops::resize(&decoded, place.width, place.height, self.filter);
        let mut canvas = RgbaImage::new(width, height);
        imageops::replace(&mut canvas, &scaled, place.x, place.y);
        PixelBuffer::from_rgba(width, height, canvas.into_raw())
    }
}

impl Default for ImageRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Rasterizer for ImageRasterizer {
    async fn rasterize(
        &self,
        source: &[u8],
        width: u32,
        height: u32,
        aspect: AspectMode,
    ) -> Result<PixelBuffer> {
        let rasterizer = *self;
        let source = source.to_vec();
        tokio::task::spawn_blocking(move || {
            rasterizer.rasterize_blocking(&source, width, height, aspect)
        })
        .await
        .map_err(|err| raster_error(format!("raster task failed: {err}")))?
    }
}

pub fn raster_error(message: impl Into<String>) -> ApngFitError {
    ApngFitError::Raster(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageOutputFormat, Rgba};
    use std::io::Cursor;

    fn png_bytes(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba(color));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut out, ImageOutputFormat::Png)
            .expect("encode png");
        out.into_inner()
    }

    #[test]
    fn crop_fills_and_centers() {
        let place = placement(1200, 400, 600, 400, AspectMode::Crop);
        assert_eq!(
            place,
            Placement {
                x: -300,
                y: 0,
                width: 1200,
                height: 400
            }
        );
    }

    #[test]
    fn fit_letterboxes() {
        let place = placement(1200, 400, 600, 400, AspectMode::Fit);
        assert_eq!(
            place,
            Placement {
                x: 0,
                y: 100,
                width: 600,
                height: 200
            }
        );
    }

    #[test]
    fn stretch_covers_canvas() {
        let place = placement(10, 999, 600, 400, AspectMode::Stretch);
        assert_eq!((place.x, place.y, place.width, place.height), (0, 0, 600, 400));
    }

    #[tokio::test]
    async fn fit_leaves_transparent_bars() {
        let source = png_bytes(40, 10, [200, 10, 10, 255]);
        let buffer = ImageRasterizer::new()
            .rasterize(&source, 20, 20, AspectMode::Fit)
            .await
            .expect("rasterize");
        assert_eq!(buffer.as_bytes().len(), 20 * 20 * 4);
        // Top-left pixel is in the letterbox bar, centre pixel is painted.
        assert_eq!(&buffer.as_bytes()[0..4], &[0, 0, 0, 0]);
        let centre = ((10 * 20 + 10) * 4) as usize;
        assert_eq!(buffer.as_bytes()[centre + 3], 255);
    }

    #[tokio::test]
    async fn rejects_garbage_input() {
        let result = ImageRasterizer::new()
            .rasterize(b"not an image", 10, 10, AspectMode::Crop)
            .await;
        assert!(matches!(result, Err(ApngFitError::Raster(_))));
    }
}
