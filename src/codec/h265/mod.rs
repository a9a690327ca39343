//! # H.265/HEVC framing
//!
//! Same rules as H.264 with the two-byte HEVC NAL header.

use super::{first_nal_header, nal_headers};

pub const NAL_VPS: u8 = 32;
pub const NAL_SPS: u8 = 33;
pub const NAL_PPS: u8 = 34;
pub const NAL_AUD: u8 = 35;

/// Access unit delimiter NAL, pic_type = 2 (I, P and B slices).
pub const ACCESS_UNIT_DELIMITER: [u8; 7] = [0x00, 0x00, 0x00, 0x01, 0x46, 0x01, 0x50];

pub fn nal_type(header: u8) -> u8 {
    (header >> 1) & 0x3F
}

pub fn starts_with_aud(data: &[u8]) -> bool {
    first_nal_header(data)
        .map(|header| nal_type(header) == NAL_AUD)
        .unwrap_or(false)
}

pub fn starts_with_parameter_set(data: &[u8]) -> bool {
    nal_headers(data)
        .map(nal_type)
        .find(|nal| *nal != NAL_AUD)
        .map(|nal| (NAL_VPS..=NAL_PPS).contains(&nal))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hevc_nal_detection() {
        let au = [0, 0, 0, 1, 0x40, 0x01, 0, 0, 1, 0x26, 0x01, 0xAF];
        assert!(!starts_with_aud(&au));
        assert!(starts_with_parameter_set(&au));
        assert!(starts_with_aud(&ACCESS_UNIT_DELIMITER));
    }
}
