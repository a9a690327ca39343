use crate::error::{Result, TsflowError};
use crate::utils::{BitReader, BitWriter};
use bytes::Bytes;

pub const ADTS_HEADER_SIZE: usize = 7;
pub const ADTS_SYNC_WORD: u16 = 0xFFF;
const ADTS_MAX_FRAME_LENGTH: usize = 0x1FFF;
const ADTS_VBR_FULLNESS: u16 = 0x7FF;

const SAMPLE_RATES: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

/// ADTS profile field (audio object type minus one).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileType {
    Main = 0,
    LC = 1,
    SSR = 2,
    LTP = 3,
}

impl From<u8> for ProfileType {
    fn from(value: u8) -> Self {
        match value & 0x03 {
            0 => ProfileType::Main,
            2 => ProfileType::SSR,
            3 => ProfileType::LTP,
            _ => ProfileType::LC,
        }
    }
}

/// Maps a sampling frequency onto its MPEG-4 sampling frequency index.
pub fn sample_rate_index(sample_rate: u32) -> Option<u8> {
    SAMPLE_RATES
        .iter()
        .position(|&rate| rate == sample_rate)
        .map(|index| index as u8)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ADTSHeader {
    pub mpeg2: bool,
    pub protection_absent: bool,
    pub profile: ProfileType,
    pub sample_rate_index: u8,
    pub channel_configuration: u8,
    /// Header plus raw payload, 13 bits.
    pub frame_length: u16,
    pub buffer_fullness: u16,
    pub number_of_raw_blocks: u8,
}

impl ADTSHeader {
    pub fn new(profile: ProfileType, sample_rate_index: u8, channel_configuration: u8) -> Self {
        Self {
            mpeg2: false,
            protection_absent: true,
            profile,
            sample_rate_index,
            channel_configuration,
            frame_length: ADTS_HEADER_SIZE as u16,
            buffer_fullness: ADTS_VBR_FULLNESS,
            number_of_raw_blocks: 0,
        }
    }

    /// Sets the frame length for a raw payload of `payload_len` bytes.
    pub fn with_payload_len(mut self, payload_len: usize) -> Result<Self> {
        let frame_length = payload_len + ADTS_HEADER_SIZE;
        if frame_length > ADTS_MAX_FRAME_LENGTH {
            return Err(TsflowError::Muxing(format!(
                "AAC frame of {} bytes does not fit an ADTS header",
                payload_len
            )));
        }
        self.frame_length = frame_length as u16;
        Ok(self)
    }

    pub fn sample_rate(&self) -> Option<u32> {
        SAMPLE_RATES.get(self.sample_rate_index as usize).copied()
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut writer = BitWriter::with_capacity(ADTS_HEADER_SIZE);
        writer.write_bits(ADTS_SYNC_WORD as u64, 12);
        writer.write_bit(self.mpeg2);
        writer.write_bits(0, 2); // layer
        writer.write_bit(self.protection_absent);
        writer.write_bits(self.profile as u64, 2);
        writer.write_bits(self.sample_rate_index as u64, 4);
        writer.write_bit(false); // private bit
        writer.write_bits(self.channel_configuration as u64, 3);
        writer.write_bit(false); // original/copy
        writer.write_bit(false); // home
        writer.write_bit(false); // copyright id bit
        writer.write_bit(false); // copyright id start
        writer.write_bits(self.frame_length as u64, 13);
        writer.write_bits(self.buffer_fullness as u64, 11);
        writer.write_bits(self.number_of_raw_blocks as u64, 2);
        writer.to_bytes()
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < ADTS_HEADER_SIZE {
            return Err(TsflowError::Parser("ADTS header too short".into()));
        }
        let mut reader = BitReader::new(data);
        if reader.read_bits(12)? as u16 != ADTS_SYNC_WORD {
            return Err(TsflowError::Parser("Invalid ADTS sync word".into()));
        }
        let mpeg2 = reader.read_bit()?;
        reader.skip_bits(2)?;
        let protection_absent = reader.read_bit()?;
        let profile = ProfileType::from(reader.read_bits(2)? as u8);
        let sample_rate_index = reader.read_bits(4)? as u8;
        reader.skip_bits(1)?;
        let channel_configuration = reader.read_bits(3)? as u8;
        reader.skip_bits(4)?;
        let frame_length = reader.read_bits(13)? as u16;
        let buffer_fullness = reader.read_bits(11)? as u16;
        let number_of_raw_blocks = reader.read_bits(2)? as u8;

        Ok(Self {
            mpeg2,
            protection_absent,
            profile,
            sample_rate_index,
            channel_configuration,
            frame_length,
            buffer_fullness,
            number_of_raw_blocks,
        })
    }
}

/// Whether `data` already begins with an ADTS sync word.
pub fn has_adts_header(data: &[u8]) -> bool {
    data.len() >= ADTS_HEADER_SIZE && data[0] == 0xFF && (data[1] & 0xF0) == 0xF0
}
