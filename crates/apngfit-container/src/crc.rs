use std::sync::OnceLock;

const POLYNOMIAL: u32 = 0xEDB8_8320;

fn crc_table() -> &'static [u32; 256] {
    static CRC_TABLE: OnceLock<[u32; 256]> = OnceLock::new();
    CRC_TABLE.get_or_init(build_table)
}

fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    for (n, slot) in table.iter_mut().enumerate() {
        let mut c = n as u32;
        for _ in 0..8 {
            c = if c & 1 != 0 {
                POLYNOMIAL ^ (c >> 1)
            } else {
                c >> 1
            };
        }
        *slot = c;
    }
    table
}

/// Incremental reflected CRC-32, the checksum PNG uses for chunk trailers.
#[derive(Debug, Clone, Copy)]
pub struct Crc32 {
    state: u32,
}

impl Crc32 {
    pub fn new() -> Self {
        Self { state: 0xFFFF_FFFF }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        let table = crc_table();
        let mut c = self.state;
        for &byte in bytes {
            c = table[((c ^ byte as u32) & 0xFF) as usize] ^ (c >> 8);
        }
        self.state = c;
    }

    pub fn finish(self) -> u32 {
        self.state ^ 0xFFFF_FFFF
    }
}

impl Default for Crc32 {
    fn default() -> Self {
        Self::new()
    }
}

pub fn crc32(bytes: &[u8]) -> u32 {
    let mut crc = Crc32::new();
    crc.update(bytes);
    crc.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_png_iend_trailer() {
        assert_eq!(crc32(b"IEND"), 0xAE42_6082);
    }

    #[test]
    fn matches_reference_check_value() {
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
        assert_eq!(crc32(&[]), 0);
    }

    #[test]
    fn incremental_equals_one_shot() {
        let mut crc = Crc32::new();
        crc.update(b"acTL");
        crc.update(&[0, 0, 0, 10, 0, 0, 0, 3]);
        assert_eq!(crc.finish(), crc32(b"acTL\0\0\0\x0a\0\0\0\x03"));
    }
}
