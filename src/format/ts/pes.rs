use super::psi::ElementaryStreamDescriptor;
use super::types::{time_to_pts, PTS_MASK};
use crate::av::{AccessUnit, MediaKind};
use crate::error::{Result, TsflowError};
use crate::utils::BitWriter;
use bytes::Bytes;
use std::time::Duration;

const PES_FIXED_HEADER_SIZE: usize = 9;
const TIMESTAMP_SIZE: usize = 5;

const PTS_PREFIX_ONLY: u64 = 0b0010;
const PTS_PREFIX_WITH_DTS: u64 = 0b0011;
const DTS_PREFIX: u64 = 0b0001;

/// Packetized Elementary Stream (PES) header.
///
/// Only the fields the muxer emits are modeled: the optional-header flags
/// byte always carries data_alignment, and the second flags byte carries
/// nothing but PTS/DTS presence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PESHeader {
    pub stream_id: u8,
    /// PES_packet_length; 0 means unbounded.
    pub packet_length: u16,
    pub data_alignment: bool,
    /// Presentation timestamp, 33 bits at 90 kHz.
    pub pts: Option<u64>,
    /// Decode timestamp, 33 bits at 90 kHz. Ignored without a PTS.
    pub dts: Option<u64>,
}

impl PESHeader {
    /// Creates a new PES header with a specific stream ID.
    ///
    /// # Arguments
    /// * `stream_id` - The stream_id for this PES header.
    pub fn new(stream_id: u8) -> Self {
        Self {
            stream_id,
            packet_length: 0,
            data_alignment: true,
            pts: None,
            dts: None,
        }
    }

    /// Sets the Presentation Time Stamp (PTS) for the PES header.
    ///
    /// # Arguments
    /// * `pts` - The PTS Duration to set.
    pub fn with_pts(mut self, pts: Duration) -> Self {
        self.pts = Some(time_to_pts(pts) & PTS_MASK);
        self
    }

    /// Sets the Decoding Time Stamp (DTS) for the PES header.
    ///
    /// # Arguments
    /// * `dts` - The DTS Duration to set.
    pub fn with_dts(mut self, dts: Duration) -> Self {
        self.dts = Some(time_to_pts(dts) & PTS_MASK);
        self
    }

    /// The two-bit PTS_DTS_flags value.
    pub fn pts_dts_flags(&self) -> u8 {
        match (self.pts, self.dts) {
            (Some(_), Some(_)) => 0b11,
            (Some(_), None) => 0b10,
            _ => 0b00,
        }
    }

    /// PES_header_data_length: bytes of optional fields after the length byte.
    pub fn header_data_len(&self) -> usize {
        match self.pts_dts_flags() {
            0b11 => 2 * TIMESTAMP_SIZE,
            0b10 => TIMESTAMP_SIZE,
            _ => 0,
        }
    }

    /// Size of the encoded header.
    pub fn encoded_len(&self) -> usize {
        PES_FIXED_HEADER_SIZE + self.header_data_len()
    }

    /// Writes the PES header.
    ///
    /// # Arguments
    /// * `writer` - The bit writer to encode into.
    pub fn write_to(&self, writer: &mut BitWriter) {
        writer.write_bits(0x000001, 24);
        writer.write_bits(self.stream_id as u64, 8);
        writer.write_bits(self.packet_length as u64, 16);

        writer.write_bits(0b10, 2);
        writer.write_bits(0, 2); // scrambling_control
        writer.write_bit(false); // priority
        writer.write_bit(self.data_alignment);
        writer.write_bit(false); // copyright
        writer.write_bit(false); // original_or_copy

        let flags = self.pts_dts_flags();
        writer.write_bits(flags as u64, 2);
        writer.write_bits(0, 6); // ESCR, ES_rate, trick mode, copy info, CRC, extension
        writer.write_bits(self.header_data_len() as u64, 8);

        match (flags, self.pts, self.dts) {
            (0b11, Some(pts), Some(dts)) => {
                write_timestamp(writer, PTS_PREFIX_WITH_DTS, pts);
                write_timestamp(writer, DTS_PREFIX, dts);
            }
            (0b10, Some(pts), _) => write_timestamp(writer, PTS_PREFIX_ONLY, pts),
            _ => {}
        }
    }
}

/// One access unit wrapped for transport, not yet sliced into TS packets.
#[derive(Debug, Clone)]
pub struct PESPacket {
    pub header: PESHeader,
    pub payload: Bytes,
}

impl PESPacket {
    /// Creates a new PES packet with the specified stream ID and payload data.
    ///
    /// # Arguments
    /// * `stream_id` - The stream identifier (e.g., video or audio)
    /// * `payload` - The actual packet payload data
    pub fn new(stream_id: u8, payload: impl Into<Bytes>) -> Self {
        Self {
            header: PESHeader::new(stream_id),
            payload: payload.into(),
        }
    }

    /// Wraps an already framed access unit payload for `stream`.
    ///
    /// Video packets use an unbounded length field. Audio packets carry the
    /// exact length and fail when it does not fit 16 bits. The DTS is only
    /// written when it differs from the PTS.
    pub fn for_access_unit(
        stream: &ElementaryStreamDescriptor,
        unit: &AccessUnit,
        payload: Bytes,
    ) -> Result<Self> {
        let mut packet = PESPacket::new(stream.stream_id, payload).with_pts(unit.pts);
        if let Some(dts) = unit.dts.filter(|dts| *dts != unit.pts) {
            packet = packet.with_dts(dts);
        }

        if stream.kind == MediaKind::Audio {
            let length = 3 + packet.header.header_data_len() + packet.payload.len();
            packet.header.packet_length = u16::try_from(length).map_err(|_| {
                TsflowError::Muxing(format!(
                    "audio PES payload of {} bytes does not fit the length field",
                    packet.payload.len()
                ))
            })?;
        }
        Ok(packet)
    }

    pub fn with_pts(mut self, pts: Duration) -> Self {
        self.header = self.header.with_pts(pts);
        self
    }

    pub fn with_dts(mut self, dts: Duration) -> Self {
        self.header = self.header.with_dts(dts);
        self
    }

    /// Encodes header and payload into one buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut writer = BitWriter::with_capacity(self.len());
        self.header.write_to(&mut writer);
        writer.write_bytes(&self.payload);
        writer.to_bytes()
    }

    /// Returns the total length of the PES packet in bytes.
    pub fn len(&self) -> usize {
        self.header.encoded_len() + self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Four-bit prefix, then the 33-bit timestamp split 3/15/15 with marker bits.
fn write_timestamp(writer: &mut BitWriter, prefix: u64, ts: u64) {
    let ts = ts & PTS_MASK;
    writer.write_bits(prefix, 4);
    writer.write_bits(ts >> 30, 3);
    writer.write_bit(true);
    writer.write_bits((ts >> 15) & 0x7fff, 15);
    writer.write_bit(true);
    writer.write_bits(ts & 0x7fff, 15);
    writer.write_bit(true);
}
