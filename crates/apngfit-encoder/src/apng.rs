use async_trait::async_trait;
use png::{BitDepth, ColorType, Compression};
use tracing::debug;

use apngfit_types::Result;

use crate::{encoder_error, palette::pack_indices, ContainerEncoder, EncodeRequest, SharedPalette};

/// Indexed-colour APNG writer backed by the `png` crate.
///
/// The `acTL` chunk is written with `num_plays = 0`; the loop count is patched
/// into the finished stream by the caller.
#[derive(Debug, Clone, Copy)]
pub struct ApngEncoder {
    /// NeuQuant sampling factor: 1 samples every pixel, 30 is fastest.
    sample_factor: i32,
    compression: Compression,
}

impl ApngEncoder {
    pub fn new() -> Self {
        Self {
            sample_factor: 10,
            compression: Compression::Best,
        }
    }

    fn encode_blocking(&self, request: &EncodeRequest) -> Result<Vec<u8>> {
        let palette =
            SharedPalette::learn(request.frames(), request.palette_size(), self.sample_factor);
        let bits = palette.bits_per_index();
        let depth = match bits {
            1 => BitDepth::One,
            2 => BitDepth::Two,
            4 => BitDepth::Four,
            _ => BitDepth::Eight,
        };

        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, request.width(), request.height());
            encoder.set_color(ColorType::Indexed);
            encoder.set_depth(depth);
            encoder.set_compression(self.compression);
            encoder.set_palette(palette.rgb());
            if let Some(alpha) = palette.alpha() {
                encoder.set_trns(alpha);
            }
            encoder
                .set_animated(request.frame_count() as u32, 0)
                .map_err(png_error)?;

            let mut writer = encoder.write_header().map_err(png_error)?;
            let mut cached: Vec<(usize, Vec<u8>)> = Vec::new();
            for (idx, (frame, delay_ms)) in request
                .frames()
                .iter()
                .zip(request.delays_ms())
                .enumerate()
            {
                let delay = u16::try_from(*delay_ms).unwrap_or(u16::MAX);
                writer.set_frame_delay(delay, 1000).map_err(png_error)?;

                let reused = cached
                    .iter()
                    .find(|(source, _)| request.frames()[*source].shares_storage(frame))
                    .map(|(_, data)| data.clone());
                let data = match reused {
                    Some(data) => data,
                    None => {
                        let packed =
                            pack_indices(&palette.index_frame(frame), request.width(), bits);
                        cached.push((idx, packed.clone()));
                        packed
                    }
                };
                writer.write_image_data(&data).map_err(png_error)?;
            }
            writer.finish().map_err(png_error)?;
        }

        debug!(
            "APNG encoded: {} frames, {} colours, {}-bit indices, {} bytes",
            request.frame_count(),
            palette.len(),
            bits,
            out.len()
        );
        Ok(out)
    }
}

impl Default for ApngEncoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContainerEncoder for ApngEncoder {
    async fn encode(&self, request: &EncodeRequest) -> Result<Vec<u8>> {
        let encoder = *self;
        let request = request.clone();
        tokio::task::spawn_blocking(move || encoder.encode_blocking(&request))
            .await
            .map_err(|err| encoder_error(format!("encoder task failed: {err}")))?
    }
}

fn png_error(err: png::EncodingError) -> apngfit_types::ApngFitError {
    encoder_error(format!("png encoding failed: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use apngfit_container::{read_animation_control, ChunkScanner, PNG_SIGNATURE};
    use apngfit_types::frame::PixelBuffer;

    fn gradient(width: u32, height: u32, shift: u8) -> PixelBuffer {
        let mut data = Vec::new();
        for y in 0..height {
            for x in 0..width {
                let v = ((x * 255 / width.max(1)) as u8).wrapping_add(shift);
                data.extend_from_slice(&[v, (y * 20) as u8, 255 - v, 255]);
            }
        }
        PixelBuffer::from_rgba(width, height, data).unwrap()
    }

    #[tokio::test]
    async fn writes_animated_png_with_actl() {
        let a = gradient(12, 8, 0);
        let b = gradient(12, 8, 90);
        let request = EncodeRequest::new(
            vec![a.clone(), b, a],
            vec![100, 200, 100],
            12,
            8,
            16,
        )
        .unwrap();
        let bytes = ApngEncoder::new().encode(&request).await.expect("encode");

        assert!(bytes.starts_with(&PNG_SIGNATURE));
        assert_eq!(read_animation_control(&bytes), Some((3, 0)));
        let tags: Vec<String> = ChunkScanner::new(&bytes).map(|h| h.tag_str()).collect();
        assert_eq!(tags.first().map(String::as_str), Some("IHDR"));
        assert!(tags.iter().any(|t| t == "PLTE"));
        assert_eq!(tags.iter().filter(|t| *t == "fcTL").count(), 3);
        assert_eq!(tags.last().map(String::as_str), Some("IEND"));
        assert!(ChunkScanner::new(&bytes).all(|h| h.crc_matches(&bytes)));
    }

    #[tokio::test]
    async fn smaller_palette_is_not_larger() {
        let frames: Vec<PixelBuffer> = (0..4).map(|i| gradient(64, 32, i * 40)).collect();
        let delays = vec![100; frames.len()];
        let big = EncodeRequest::new(frames.clone(), delays.clone(), 64, 32, 256).unwrap();
        let small = EncodeRequest::new(frames, delays, 64, 32, 4).unwrap();
        let encoder = ApngEncoder::new();
        let big_bytes = encoder.encode(&big).await.unwrap();
        let small_bytes = encoder.encode(&small).await.unwrap();
        assert!(small_bytes.len() <= big_bytes.len());
    }
}
