use color_quant::NeuQuant;

use apngfit_types::frame::PixelBuffer;

/// NeuQuant needs enough samples to run its learning cycles.
const MIN_TRAINING_PIXELS: usize = 4096;

/// One colour table learned across every distinct frame of an animation.
pub struct SharedPalette {
    quant: NeuQuant,
    size: usize,
}

impl SharedPalette {
    /// Learn a palette of `size` colours. Buffers that share storage are sampled once.
    pub fn learn(frames: &[PixelBuffer], size: u16, sample_factor: i32) -> Self {
        let size = usize::from(size.clamp(1, 256));
        let training = training_pixels(frames);
        let sample_factor = if training.len() / PixelBuffer::CHANNELS < MIN_TRAINING_PIXELS * 2 {
            1
        } else {
            sample_factor.clamp(1, 30)
        };
        Self {
            quant: NeuQuant::new(sample_factor, size, &training),
            size,
        }
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Smallest PNG bit depth able to address every palette index.
    pub fn bits_per_index(&self) -> u8 {
        match self.size {
            0..=2 => 1,
            3..=4 => 2,
            5..=16 => 4,
            _ => 8,
        }
    }

    /// `PLTE` payload: RGB triples.
    pub fn rgb(&self) -> Vec<u8> {
        self.quant
            .color_map_rgba()
            .chunks_exact(4)
            .take(self.size)
            .flat_map(|c| [c[0], c[1], c[2]])
            .collect()
    }

    /// `tRNS` payload, trimmed after the last translucent entry; `None` when fully opaque.
    pub fn alpha(&self) -> Option<Vec<u8>> {
        let alphas: Vec<u8> = self
            .quant
            .color_map_rgba()
            .chunks_exact(4)
            .take(self.size)
            .map(|c| c[3])
            .collect();
        let last = alphas.iter().rposition(|&a| a != 255)?;
        Some(alphas[..=last].to_vec())
    }

    pub fn index_frame(&self, frame: &PixelBuffer) -> Vec<u8> {
        frame
            .as_bytes()
            .chunks_exact(PixelBuffer::CHANNELS)
            .map(|px| self.quant.index_of(px) as u8)
            .collect()
    }
}

fn training_pixels(frames: &[PixelBuffer]) -> Vec<u8> {
    let mut distinct: Vec<&PixelBuffer> = Vec::new();
    for frame in frames {
        if !distinct.iter().any(|seen| seen.shares_storage(frame)) {
            distinct.push(frame);
        }
    }
    let mut pixels: Vec<u8> = distinct
        .iter()
        .flat_map(|f| f.as_bytes().iter().copied())
        .collect();
    if pixels.is_empty() {
        pixels.extend_from_slice(&[0, 0, 0, 0]);
    }
    let min_bytes = MIN_TRAINING_PIXELS * PixelBuffer::CHANNELS;
    if pixels.len() < min_bytes {
        let seed = pixels.clone();
        while pixels.len() < min_bytes {
            pixels.extend_from_slice(&seed);
        }
    }
    pixels
}

/// Pack one index per pixel into PNG scanlines of `bits` bits per pixel, MSB first.
pub fn pack_indices(indices: &[u8], width: u32, bits: u8) -> Vec<u8> {
    let width = width as usize;
    if bits >= 8 || width == 0 {
        return indices.to_vec();
    }
    let bits = bits as usize;
    let per_byte = 8 / bits;
    let row_bytes = width.div_ceil(per_byte);
    let mask = (1u8 << bits) - 1;
    let mut packed = Vec::with_capacity(row_bytes * (indices.len() / width));
    for row in indices.chunks(width) {
        for group in row.chunks(per_byte) {
            let mut byte = 0u8;
            for (slot, &index) in group.iter().enumerate() {
                let shift = 8 - bits * (slot + 1);
                byte |= (index & mask) << shift;
            }
            packed.push(byte);
        }
    }
    packed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_tone(width: u32, height: u32) -> PixelBuffer {
        let mut data = Vec::new();
        for i in 0..(width * height) {
            if i % 2 == 0 {
                data.extend_from_slice(&[255, 0, 0, 255]);
            } else {
                data.extend_from_slice(&[0, 0, 255, 255]);
            }
        }
        PixelBuffer::from_rgba(width, height, data).unwrap()
    }

    #[test]
    fn packs_two_bit_rows_with_padding() {
        // 5 pixels per row at 2 bits -> 2 bytes per row.
        let packed = pack_indices(&[1, 2, 3, 0, 1, 3, 3, 3, 3, 3], 5, 2);
        assert_eq!(packed, vec![0b0110_1100, 0b0100_0000, 0xFF, 0b1100_0000]);
    }

    #[test]
    fn eight_bit_is_identity() {
        assert_eq!(pack_indices(&[9, 8, 7], 3, 8), vec![9, 8, 7]);
    }

    #[test]
    fn palette_depth_tracks_size() {
        let frame = two_tone(8, 8);
        assert_eq!(SharedPalette::learn(&[frame.clone()], 4, 10).bits_per_index(), 2);
        assert_eq!(SharedPalette::learn(&[frame.clone()], 16, 10).bits_per_index(), 4);
        let palette = SharedPalette::learn(&[frame], 256, 10);
        assert_eq!(palette.bits_per_index(), 8);
        assert_eq!(palette.rgb().len(), 256 * 3);
    }

    #[test]
    fn indices_stay_inside_palette() {
        let frame = two_tone(8, 8);
        let palette = SharedPalette::learn(&[frame.clone()], 8, 10);
        let indices = palette.index_frame(&frame);
        assert_eq!(indices.len(), 64);
        assert!(indices.iter().all(|&i| (i as usize) < palette.len()));
    }
}
