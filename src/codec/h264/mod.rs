//! # H.264/AVC framing
//!
//! Annex-B access units muxed into TS must start with an access unit
//! delimiter, and random access points must carry SPS/PPS in-band so a
//! receiver joining mid-stream can start decoding.

mod types;

pub use types::*;

use super::{first_nal_header, nal_headers};

/// Access unit delimiter NAL, primary_pic_type = 7 (any slice type).
pub const ACCESS_UNIT_DELIMITER: [u8; 6] = [0x00, 0x00, 0x00, 0x01, 0x09, 0xF0];

pub fn starts_with_aud(data: &[u8]) -> bool {
    first_nal_header(data)
        .map(|header| NALUnitType::from(header) == NALUnitType::AccessUnitDelimiter)
        .unwrap_or(false)
}

/// Whether the first NAL after any delimiter is a parameter set.
pub fn starts_with_parameter_set(data: &[u8]) -> bool {
    nal_headers(data)
        .map(NALUnitType::from)
        .find(|nal_type| *nal_type != NALUnitType::AccessUnitDelimiter)
        .map(|nal_type| nal_type.is_parameter_set())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nal_detection() {
        let idr = [0, 0, 0, 1, 0x09, 0xF0, 0, 0, 1, 0x67, 0x42, 0, 0, 1, 0x65, 0x88];
        assert!(starts_with_aud(&idr));
        assert!(starts_with_parameter_set(&idr));

        let non_idr = [0, 0, 0, 1, 0x41, 0x9A];
        assert!(!starts_with_aud(&non_idr));
        assert!(!starts_with_parameter_set(&non_idr));
    }
}
