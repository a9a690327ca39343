use crate::error::{Result, TsflowError};
use bitvec::prelude::*;
use bytes::Bytes;

/// A bit-level writer producing big-endian bitstreams.
///
/// Values are appended most-significant bit first and may straddle byte
/// boundaries. Every PSI, PES and adaptation-field header in the crate is
/// laid out through this type.
///
/// Example:
/// ```
/// use tsflow::utils::BitWriter;
///
/// let mut writer = BitWriter::new();
/// writer.write_bits(0b101, 3);
/// writer.write_bits(0b10011, 5);
/// assert_eq!(&writer.to_bytes()[..], &[0b10110011]);
/// ```
#[derive(Debug, Default, Clone)]
pub struct BitWriter {
    bits: BitVec<u8, Msb0>,
}

impl BitWriter {
    pub fn new() -> Self {
        Self {
            bits: BitVec::new(),
        }
    }

    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            bits: BitVec::with_capacity(bytes * 8),
        }
    }

    /// Appends the low `bit_count` bits of `value`.
    ///
    /// `bit_count` must lie in `1..=64`; higher bits of `value` are ignored.
    pub fn write_bits(&mut self, value: u64, bit_count: u32) {
        debug_assert!(
            (1..=64).contains(&bit_count),
            "bit count {} out of range",
            bit_count
        );
        let bit_count = bit_count.min(64) as usize;
        let view = value.view_bits::<Msb0>();
        self.bits.extend_from_bitslice(&view[64 - bit_count..]);
    }

    pub fn write_bit(&mut self, bit: bool) {
        self.bits.push(bit);
    }

    /// Appends whole bytes, which need not start on a byte boundary.
    pub fn write_bytes(&mut self, data: &[u8]) {
        self.bits.extend_from_bitslice(data.view_bits::<Msb0>());
    }

    /// Pads with zero bits up to the next byte boundary.
    pub fn byte_align(&mut self) {
        let pad = (8 - self.bits.len() % 8) % 8;
        let len = self.bits.len();
        self.bits.resize(len + pad, false);
    }

    pub fn bit_len(&self) -> usize {
        self.bits.len()
    }

    /// Number of bytes [`BitWriter::to_bytes`] would return.
    pub fn byte_len(&self) -> usize {
        self.bits.len().div_ceil(8)
    }

    pub fn is_aligned(&self) -> bool {
        self.bits.len() % 8 == 0
    }

    /// Returns the accumulated bytes and resets the writer.
    pub fn to_bytes(&mut self) -> Bytes {
        self.byte_align();
        let bits = std::mem::take(&mut self.bits);
        Bytes::from(bits.into_vec())
    }
}

/// A bit-level reader over a byte slice, the counterpart of [`BitWriter`].
pub struct BitReader<'a> {
    bits: &'a BitSlice<u8, Msb0>,
    position: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        BitReader {
            bits: data.view_bits::<Msb0>(),
            position: 0,
        }
    }

    pub fn read_bit(&mut self) -> Result<bool> {
        let bit = self
            .bits
            .get(self.position)
            .map(|bit| *bit)
            .ok_or_else(|| TsflowError::Parser("Reached end of data".into()))?;
        self.position += 1;
        Ok(bit)
    }

    /// Reads `n` bits (at most 64) as a big-endian number.
    pub fn read_bits(&mut self, n: u32) -> Result<u64> {
        if n > 64 {
            return Err(TsflowError::Parser("Too many bits requested".into()));
        }
        let n = n as usize;
        if n > self.available_bits() {
            return Err(TsflowError::Parser("Reached end of data".into()));
        }
        let value = if n == 0 {
            0
        } else {
            self.bits[self.position..self.position + n].load_be::<u64>()
        };
        self.position += n;
        Ok(value)
    }

    pub fn skip_bits(&mut self, n: u32) -> Result<()> {
        let n = n as usize;
        if n > self.available_bits() {
            return Err(TsflowError::Parser("Reached end of data".into()));
        }
        self.position += n;
        Ok(())
    }

    pub fn align_byte(&mut self) {
        self.position = self.position.div_ceil(8) * 8;
        self.position = self.position.min(self.bits.len());
    }

    pub fn available_bits(&self) -> usize {
        self.bits.len() - self.position
    }

    pub fn bit_position(&self) -> usize {
        self.position
    }
}
