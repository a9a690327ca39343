#![doc(html_root_url = "https://docs.rs/tsflow/0.1.0")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(rustdoc::missing_crate_level_docs)]

//! # tsflow - live MPEG-TS muxing pipeline
//!
//! `tsflow` turns timestamped encoded audio and video access units into a
//! standards-conformant MPEG-2 Transport Stream and pushes it to a file or a
//! network peer.
//!
//! ## Features
//!
//! ### Transport Stream
//! - PAT/PMT (and optional SDT) generation with versioning and CRC32
//! - PES packetization with PTS/DTS
//! - 188-byte packet slicing with continuity counters, PCR and stuffing
//! - A parser to read produced streams back
//!
//! ### Codec framing
//! - H.264/H.265 access unit delimiters and in-band parameter sets
//! - AAC ADTS headers
//!
//! ### Pipeline
//! - Lifecycle state machine (configure, preview, stream, stop, release)
//! - Bounded producer queue with backpressure
//! - File, TCP and UDP endpoints
//! - Typed events for errors and connection changes
//!
//! ## Quick Start
//!
//! ```rust
//! use tsflow::av::{AccessUnit, AudioConfig};
//! use tsflow::format::ts::{MuxerConfig, ServiceDescriptor, ServiceType, TsMuxer};
//! use std::time::Duration;
//!
//! # fn main() -> tsflow::Result<()> {
//! let mut muxer = TsMuxer::new(MuxerConfig::default());
//! muxer.register_service(
//!     ServiceDescriptor::new(0x4698, ServiceType::DigitalRadio, "tsflow", "radio"),
//!     vec![AudioConfig::default().into()],
//! )?;
//!
//! let packets = muxer.mux(&AccessUnit::audio(vec![0u8; 200], Duration::ZERO))?;
//! assert_eq!(packets[0].pid(), 0x0000); // PAT first
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! - `av`: access units and encoder configurations
//! - `codec`: per-codec payload framing
//! - `format`: the MPEG-TS muxer and parser
//! - `endpoint`: file and network outputs
//! - `streamer`: the lifecycle and session pipeline
//! - `config`: settings from files and environment
//! - `error`: error types and the `Result` alias
//! - `utils`: bit writer/reader and CRC32

/// Access units and encoder configuration
pub mod av;

/// Codec-specific payload framing
pub mod codec;

/// Settings from defaults, files and environment
pub mod config;

/// Output endpoints
pub mod endpoint;

/// Error types and utilities
pub mod error;

/// Container formats (MPEG-TS)
pub mod format;

/// Lifecycle state machine and streaming sessions
pub mod streamer;

/// Common utilities and helper functions
pub mod utils;

pub use error::{ErrorKind, Result, TsflowError};
