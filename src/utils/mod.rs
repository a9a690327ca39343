//! # Utility Functions and Types
//!
//! Bit-level writing and reading plus the MPEG-2 CRC used by PSI sections.
//!
//! ## Bit Operations
//!
//! ```rust
//! use tsflow::utils::{BitReader, BitWriter};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut writer = BitWriter::new();
//! writer.write_bits(0x47, 8);
//! writer.write_bits(0x100, 13);
//! writer.byte_align();
//! let bytes = writer.to_bytes();
//!
//! let mut reader = BitReader::new(&bytes);
//! assert_eq!(reader.read_bits(8)?, 0x47);
//! assert_eq!(reader.read_bits(13)?, 0x100);
//! # Ok(())
//! # }
//! ```
//!
//! ## CRC Calculation
//!
//! ```rust
//! use tsflow::utils::Crc32Mpeg2;
//!
//! let crc = Crc32Mpeg2::checksum(b"Hello, world!");
//! println!("CRC32: {:08x}", crc);
//! ```

/// Bitstream writing and reading
pub mod bits;

/// CRC calculation for PSI sections
pub mod crc;

pub use bits::{BitReader, BitWriter};
pub use crc::Crc32Mpeg2;
