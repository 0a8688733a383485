//! FIT CRC-16
//!
//! The checksum used by the FIT format for both the optional header CRC and the trailing file
//! CRC. It is a nibble-driven CRC-16 (polynomial 0xA001) starting from zero.

const CRC_TABLE: [u16; 16] = [
    0x0000, 0xCC01, 0xD801, 0x1400, 0xF001, 0x3C00, 0x2800, 0xE401, 0xA001, 0x6C00, 0x7800,
    0xB401, 0x5000, 0x9C01, 0x8801, 0x4400,
];

/// Running FIT checksum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Crc16(u16);

impl Crc16 {
    pub const fn new() -> Self {
        Self(0)
    }

    /// Fold one byte into the checksum.
    pub fn update(&mut self, byte: u8) {
        let mut crc = self.0;
        let mut tmp = CRC_TABLE[(crc & 0xF) as usize];
        crc = (crc >> 4) & 0x0FFF;
        crc ^= tmp ^ CRC_TABLE[(byte & 0xF) as usize];
        tmp = CRC_TABLE[(crc & 0xF) as usize];
        crc = (crc >> 4) & 0x0FFF;
        self.0 = crc ^ tmp ^ CRC_TABLE[((byte >> 4) & 0xF) as usize];
    }

    pub fn update_slice(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.update(byte);
        }
    }

    pub fn value(&self) -> u16 {
        self.0
    }
}

/// Checksum of a complete byte slice.
pub fn compute(bytes: &[u8]) -> u16 {
    let mut crc = Crc16::new();
    crc.update_slice(bytes);
    crc.value()
}
