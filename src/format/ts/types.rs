use crate::error::{Result, TsflowError};
use crate::utils::BitWriter;
use bytes::{BufMut, Bytes, BytesMut};
use std::time::Duration;

// Stream IDs
pub const STREAM_ID_VIDEO: u8 = 0xe0;
pub const STREAM_ID_AUDIO: u8 = 0xc0;

// PIDs
pub const PID_PAT: u16 = 0x0000;
pub const PID_SDT: u16 = 0x0011;
pub const PID_PMT: u16 = 0x1000;
pub const PID_FIRST_PROGRAM: u16 = 0x0010;
pub const PID_FIRST_ELEMENTARY: u16 = 0x0100;
pub const PID_DEDICATED_PCR: u16 = 0x1ffe;
pub const PID_NULL: u16 = 0x1fff;
pub const PID_MAX: u16 = 0x1fff;

// Table IDs
pub const TABLE_ID_PAT: u8 = 0x00;
pub const TABLE_ID_PMT: u8 = 0x02;
pub const TABLE_ID_SDT: u8 = 0x42;

// Elementary Stream Types
pub const STREAM_TYPE_H264: u8 = 0x1b;
pub const STREAM_TYPE_H265: u8 = 0x24;
pub const STREAM_TYPE_AAC: u8 = 0x0f;

// Descriptor tags
pub const DESCRIPTOR_REGISTRATION: u8 = 0x05;
pub const DESCRIPTOR_ISO_639_LANGUAGE: u8 = 0x0a;
pub const DESCRIPTOR_SERVICE: u8 = 0x48;

// Constants
pub const TS_SYNC_BYTE: u8 = 0x47;
pub const TS_PACKET_SIZE: usize = 188;
pub const TS_HEADER_SIZE: usize = 4;
pub const TS_PAYLOAD_SIZE: usize = TS_PACKET_SIZE - TS_HEADER_SIZE;
pub const PCR_FIELD_SIZE: usize = 6;
pub const PTS_HZ: u64 = 90_000;
pub const PCR_HZ: u64 = 27_000_000;
pub const PTS_MASK: u64 = (1 << 33) - 1;

/// The four-byte transport packet header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TSHeader {
    pub transport_error: bool,
    pub payload_unit_start: bool,
    pub transport_priority: bool,
    pub pid: u16,
    pub scrambling_control: u8,
    pub adaptation_field_exists: bool,
    pub contains_payload: bool,
    pub continuity_counter: u8,
}

impl Default for TSHeader {
    fn default() -> Self {
        Self {
            transport_error: false,
            payload_unit_start: false,
            transport_priority: false,
            pid: 0,
            scrambling_control: 0,
            adaptation_field_exists: false,
            contains_payload: true,
            continuity_counter: 0,
        }
    }
}

impl TSHeader {
    pub fn write_to(&self, writer: &mut BitWriter) {
        writer.write_bits(TS_SYNC_BYTE as u64, 8);
        writer.write_bit(self.transport_error);
        writer.write_bit(self.payload_unit_start);
        writer.write_bit(self.transport_priority);
        writer.write_bits(self.pid as u64, 13);
        writer.write_bits(self.scrambling_control as u64, 2);
        writer.write_bit(self.adaptation_field_exists);
        writer.write_bit(self.contains_payload);
        writer.write_bits(self.continuity_counter as u64, 4);
    }
}

/// Adaptation field contents the muxer emits.
///
/// `stuffing` counts the trailing 0xFF bytes after the optional fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdaptationField {
    pub discontinuity: bool,
    pub random_access: bool,
    pub es_priority: bool,
    /// Program clock reference in 27 MHz units.
    pub pcr: Option<u64>,
    pub stuffing: usize,
}

impl AdaptationField {
    /// Whether the field carries anything besides stuffing.
    pub fn has_flags(&self) -> bool {
        self.discontinuity || self.random_access || self.es_priority || self.pcr.is_some()
    }

    /// Bytes taken by the flags byte and optional fields, excluding the length byte and stuffing.
    pub fn content_len(&self) -> usize {
        if self.has_flags() {
            1 + if self.pcr.is_some() { PCR_FIELD_SIZE } else { 0 }
        } else {
            0
        }
    }

    /// Total encoded size including the length byte.
    pub fn encoded_len(&self) -> usize {
        1 + self.content_len() + self.stuffing
    }

    pub fn write_to(&self, writer: &mut BitWriter) -> Result<()> {
        let length = self.content_len() + self.stuffing;
        if length > TS_PAYLOAD_SIZE - 1 {
            return Err(TsflowError::Muxing(format!(
                "adaptation field of {} bytes exceeds a packet",
                length
            )));
        }
        writer.write_bits(length as u64, 8);
        if length == 0 {
            return Ok(());
        }

        // the flags byte is present whenever length > 0
        writer.write_bit(self.discontinuity);
        writer.write_bit(self.random_access);
        writer.write_bit(self.es_priority);
        writer.write_bit(self.pcr.is_some());
        writer.write_bits(0, 4); // OPCR, splicing point, private data, extension

        let mut written = 1;
        if let Some(pcr) = self.pcr {
            let (base, extension) = split_pcr(pcr);
            writer.write_bits(base, 33);
            writer.write_bits(0x3f, 6);
            writer.write_bits(extension, 9);
            written += PCR_FIELD_SIZE;
        }
        for _ in written..length {
            writer.write_bits(0xff, 8);
        }
        Ok(())
    }
}

/// One complete 188-byte transport packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TsPacket(Bytes);

impl TsPacket {
    pub fn from_bytes(data: Bytes) -> Result<Self> {
        if data.len() != TS_PACKET_SIZE {
            return Err(TsflowError::InvalidData(format!(
                "TS packet must be {} bytes, got {}",
                TS_PACKET_SIZE,
                data.len()
            )));
        }
        if data[0] != TS_SYNC_BYTE {
            return Err(TsflowError::InvalidData("Invalid sync byte".into()));
        }
        Ok(Self(data))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }

    pub fn pid(&self) -> u16 {
        (((self.0[1] & 0x1f) as u16) << 8) | self.0[2] as u16
    }

    pub fn payload_unit_start(&self) -> bool {
        self.0[1] & 0x40 != 0
    }

    pub fn has_adaptation_field(&self) -> bool {
        self.0[3] & 0x20 != 0
    }

    pub fn has_payload(&self) -> bool {
        self.0[3] & 0x10 != 0
    }

    pub fn continuity_counter(&self) -> u8 {
        self.0[3] & 0x0f
    }

    /// The payload bytes following the header and adaptation field.
    pub fn payload(&self) -> &[u8] {
        if !self.has_payload() {
            return &[];
        }
        let start = if self.has_adaptation_field() {
            TS_HEADER_SIZE + 1 + self.0[TS_HEADER_SIZE] as usize
        } else {
            TS_HEADER_SIZE
        };
        self.0.get(start..).unwrap_or(&[])
    }
}

impl AsRef<[u8]> for TsPacket {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Concatenates packets into one contiguous buffer for the endpoint.
pub fn concat_packets(packets: &[TsPacket]) -> Bytes {
    let mut buf = BytesMut::with_capacity(packets.len() * TS_PACKET_SIZE);
    for packet in packets {
        buf.put_slice(packet.as_bytes());
    }
    buf.freeze()
}

/// Splits a 27 MHz PCR into its 33-bit 90 kHz base and 9-bit extension.
pub fn split_pcr(pcr: u64) -> (u64, u64) {
    ((pcr / 300) & PTS_MASK, pcr % 300)
}

// Time conversion utilities
pub fn time_to_pts(time: Duration) -> u64 {
    (time.as_nanos() * PTS_HZ as u128 / 1_000_000_000) as u64
}

pub fn pts_to_time(pts: u64) -> Duration {
    Duration::from_nanos((pts as u128 * 1_000_000_000 / PTS_HZ as u128) as u64)
}

/// PCR (27 MHz) sample for a stream time, base aligned on the 90 kHz PTS clock.
pub fn time_to_pcr(time: Duration) -> u64 {
    time_to_pts(time) * 300
}

pub fn pcr_to_time(pcr: u64) -> Duration {
    Duration::from_nanos((pcr as u128 * 1_000_000_000 / PCR_HZ as u128) as u64)
}
