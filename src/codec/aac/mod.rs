//! AAC framing for transport streams.
//!
//! Stream type 0x0F carries AAC in ADTS framing. Encoders usually emit raw
//! access units, so each one is given a header built from the audio config.

mod types;

pub use types::*;

use crate::av::AudioConfig;
use crate::error::{Result, TsflowError};
use bytes::{Bytes, BytesMut};

/// Prepends ADTS headers to raw AAC access units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdtsFramer {
    template: ADTSHeader,
}

impl AdtsFramer {
    pub fn new(config: &AudioConfig) -> Result<Self> {
        let index = sample_rate_index(config.sample_rate).ok_or_else(|| {
            TsflowError::Configuration(format!("unsupported AAC sample rate {}", config.sample_rate))
        })?;
        Ok(Self {
            template: ADTSHeader::new(ProfileType::LC, index, config.channels),
        })
    }

    /// Returns `data` framed with an ADTS header; already framed data is passed through.
    pub fn frame(&self, data: &Bytes) -> Result<Bytes> {
        if has_adts_header(data) {
            return Ok(data.clone());
        }
        let header = self.template.clone().with_payload_len(data.len())?;
        let mut framed = BytesMut::with_capacity(ADTS_HEADER_SIZE + data.len());
        framed.extend_from_slice(&header.to_bytes());
        framed.extend_from_slice(data);
        Ok(framed.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_adts_header_layout() {
        // AAC-LC, 44.1kHz, stereo, 200 byte payload
        let header = ADTSHeader::new(ProfileType::LC, 4, 2)
            .with_payload_len(200)
            .unwrap();
        assert_eq!(
            &header.to_bytes()[..],
            &[0xFF, 0xF1, 0x50, 0x80, 0x19, 0xFF, 0xFC]
        );
    }

    #[test]
    fn test_parse_adts_header() {
        let data = [0xFF, 0xF1, 0x50, 0x80, 0x43, 0x80, 0x00];
        let header = ADTSHeader::parse(&data).unwrap();
        assert_eq!(header.profile, ProfileType::LC);
        assert_eq!(header.sample_rate_index, 4);
        assert_eq!(header.sample_rate(), Some(44_100));
        assert_eq!(header.channel_configuration, 2);
        assert!(header.protection_absent);

        assert!(ADTSHeader::parse(&[0x00, 0x00, 0x50, 0x80, 0x43, 0x80, 0x00]).is_err());
    }

    #[test]
    fn test_framer_adds_header_once() {
        let framer = AdtsFramer::new(&AudioConfig::default().with_sample_rate(48_000)).unwrap();
        let raw = Bytes::from(vec![0x21u8; 100]);

        let framed = framer.frame(&raw).unwrap();
        assert_eq!(framed.len(), 107);
        let header = ADTSHeader::parse(&framed).unwrap();
        assert_eq!(header.frame_length, 107);
        assert_eq!(header.sample_rate(), Some(48_000));

        let again = framer.frame(&framed).unwrap();
        assert_eq!(again, framed);
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let framer = AdtsFramer::new(&AudioConfig::default()).unwrap();
        let err = framer.frame(&Bytes::from(vec![0u8; 9000])).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Muxing);
    }
}
