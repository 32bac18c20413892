//! Tag body checksum.
//!
//! A reflected table-driven CRC over the custom polynomial `0xEB31D82E`,
//! seeded with `0xFFFFFFFF` and never inverted at the end. The 256-entry
//! table is the "obfuscation buffer".

use std::sync::OnceLock;

const POLYNOMIAL: u32 = 0xEB31_D82E;
pub const INITIAL: u32 = 0xFFFF_FFFF;

/// The 256-entry table driving [`checksum`].
pub fn obfuscation_buffer() -> &'static [u32; 256] {
    static TABLE: OnceLock<[u32; 256]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [0u32; 256];
        for (i, slot) in table.iter_mut().enumerate() {
            let mut crc = i as u32;
            for _ in 0..8 {
                crc = if crc & 1 != 0 {
                    (crc >> 1) ^ POLYNOMIAL
                } else {
                    crc >> 1
                };
            }
            *slot = crc;
        }
        table
    })
}

/// Continue a running checksum over `data`.
pub fn update(mut crc: u32, data: &[u8]) -> u32 {
    let table = obfuscation_buffer();
    for &b in data {
        crc = table[((crc ^ b as u32) & 0xFF) as usize] ^ (crc >> 8);
    }
    crc
}

/// Checksum of a complete tag body (every byte after the 64-byte header).
pub fn checksum(data: &[u8]) -> u32 {
    update(INITIAL, data)
}
