//! CRC32 for PSI sections, as specified by ITU-T H.222.0 / ISO/IEC 13818-1.
//!
//! Polynomial 0x04C11DB7, initial value 0xFFFFFFFF, no reflection, no final XOR.

use crc::{Crc, CRC_32_MPEG_2};

const MPEG2: Crc<u32> = Crc::<u32>::new(&CRC_32_MPEG_2);

/// MPEG-2 CRC32 calculator used for PSI sections.
#[derive(Debug, Clone, Copy, Default)]
pub struct Crc32Mpeg2;

impl Crc32Mpeg2 {
    pub fn new() -> Self {
        Self
    }

    /// Checksum of `data`.
    ///
    /// ```
    /// use tsflow::utils::Crc32Mpeg2;
    ///
    /// assert_eq!(Crc32Mpeg2::checksum(&[0x01, 0x01]), 0xD66FB816);
    /// ```
    pub fn checksum(data: &[u8]) -> u32 {
        MPEG2.checksum(data)
    }

    /// Whether `section` (CRC field included) verifies. A valid section
    /// run through the CRC including its trailing CRC yields zero.
    pub fn verify(section: &[u8]) -> bool {
        section.len() >= 4 && MPEG2.checksum(section) == 0
    }
}
