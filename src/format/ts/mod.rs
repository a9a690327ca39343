//! # MPEG Transport Stream (TS) muxing
//!
//! Turns timestamped access units into 188-byte transport packets for a
//! single program:
//!
//! - PAT/PMT (and optionally SDT) sections, versioned and reissued on an interval
//! - PES packetization with PTS/DTS
//! - TS slicing with continuity counters, PCR and stuffing adaptation fields
//! - a parser for reading the produced stream back
//!
//! ## Example Usage
//!
//! ```rust
//! use tsflow::av::{AccessUnit, AudioConfig, VideoConfig};
//! use tsflow::format::ts::{MuxerConfig, ServiceDescriptor, ServiceType, TsMuxer, TS_PACKET_SIZE};
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut muxer = TsMuxer::new(MuxerConfig::default());
//! muxer.register_service(
//!     ServiceDescriptor::new(0x4698, ServiceType::DigitalTv, "tsflow", "live"),
//!     vec![VideoConfig::default().into(), AudioConfig::default().into()],
//! )?;
//!
//! let unit = AccessUnit::video(vec![0u8; 4000], Duration::ZERO).with_key_flag(true);
//! let packets = muxer.mux(&unit)?;
//! assert!(packets.iter().all(|p| p.as_bytes().len() == TS_PACKET_SIZE));
//! # Ok(())
//! # }
//! ```

/// TS muxer orchestrating tables, PES and packet slicing
pub mod muxer;

/// Slicing of sections and PES packets into transport packets
pub mod packetizer;

/// Parsing of transport packets, PSI sections and PES headers
pub mod parser;

/// PES packet handling
pub mod pes;

/// PAT, PMT and SDT construction
pub mod psi;

/// Core TS types and constants
pub mod types;

pub use muxer::{interleave, MuxerConfig, MuxerState, StreamConfig, TsMuxer};
pub use packetizer::{PidState, UnitStart};
pub use parser::TSPacketParser;
pub use pes::{PESHeader, PESPacket};
pub use psi::{
    Descriptor, ElementaryStreamDescriptor, PsiSection, ServiceDescriptor, ServiceType,
    TableBuilder,
};
pub use types::{
    concat_packets, TSHeader, TsPacket, PID_DEDICATED_PCR, PID_PAT, PID_PMT, PID_SDT,
    STREAM_TYPE_AAC, STREAM_TYPE_H264, STREAM_TYPE_H265, TS_PACKET_SIZE,
};
