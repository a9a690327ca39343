//! Container formats. Only MPEG-TS is produced.

pub mod ts;

pub use self::ts::{TsMuxer, TsPacket};
