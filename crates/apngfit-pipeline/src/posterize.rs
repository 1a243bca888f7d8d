use apngfit_types::frame::PixelBuffer;

/// Level table for `bits` bits per channel: `round(round(v / step) * step)`.
fn level_table(bits: u8) -> [u8; 256] {
    let levels = (1u32 << bits.clamp(1, 8)) - 1;
    let step = 255.0 / levels as f64;
    let mut table = [0u8; 256];
    for (v, slot) in table.iter_mut().enumerate() {
        let snapped = ((v as f64 / step).round() * step).round();
        *slot = snapped.clamp(0.0, 255.0) as u8;
    }
    table
}

pub fn posterize_value(value: u8, bits: u8) -> u8 {
    level_table(bits)[value as usize]
}

/// Reduce R, G and B to `2^bits` levels; alpha passes through. The input is left untouched.
pub fn posterize(buffer: &PixelBuffer, bits: u8) -> PixelBuffer {
    let table = level_table(bits);
    posterize_with(&table, buffer)
}

fn posterize_with(table: &[u8; 256], buffer: &PixelBuffer) -> PixelBuffer {
    let data: Vec<u8> = buffer
        .as_bytes()
        .chunks_exact(PixelBuffer::CHANNELS)
        .flat_map(|px| [table[px[0] as usize], table[px[1] as usize], table[px[2] as usize], px[3]])
        .collect();
    // Same dimensions and length as the input, so construction cannot fail.
    PixelBuffer::from_rgba(buffer.width(), buffer.height(), data)
        .unwrap_or_else(|_| buffer.clone())
}

/// Posterize a whole sequence. Entries sharing a buffer keep sharing the result.
pub fn posterize_all(buffers: &[PixelBuffer], bits: u8) -> Vec<PixelBuffer> {
    let table = level_table(bits);
    let mut done: Vec<(PixelBuffer, PixelBuffer)> = Vec::new();
    buffers
        .iter()
        .map(|buffer| {
            if let Some((_, out)) = done.iter().find(|(src, _)| src.shares_storage(buffer)) {
                return out.clone();
            }
            let out = posterize_with(&table, buffer);
            done.push((buffer.clone(), out.clone()));
            out
        })
        .collect()
}
