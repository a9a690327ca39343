//! Codec-specific payload framing applied to access units before PES packetization.

pub mod aac;
pub mod h264;
pub mod h265;

use crate::av::{AccessUnit, AudioConfig, CodecType, VideoConfig};
use crate::error::{Result, TsflowError};
use aac::AdtsFramer;
use bytes::{Bytes, BytesMut};

/// Length of the Annex-B start code at the beginning of `data`, if any.
pub fn start_code_len(data: &[u8]) -> Option<usize> {
    if data.starts_with(&[0, 0, 1]) {
        Some(3)
    } else if data.starts_with(&[0, 0, 0, 1]) {
        Some(4)
    } else {
        None
    }
}

fn next_start_code(data: &[u8], from: usize) -> Option<usize> {
    let mut pos = from;
    while pos + 2 < data.len() {
        if data[pos] == 0 && data[pos + 1] == 0 && data[pos + 2] == 1 {
            return Some(if pos > from && data[pos - 1] == 0 { pos - 1 } else { pos });
        }
        pos += 1;
    }
    None
}

pub(crate) fn first_nal_header(data: &[u8]) -> Option<u8> {
    start_code_len(data).and_then(|len| data.get(len).copied())
}

/// First byte of every NAL unit in an Annex-B buffer.
pub(crate) fn nal_headers(data: &[u8]) -> impl Iterator<Item = u8> + '_ {
    let mut pos = 0;
    std::iter::from_fn(move || {
        while pos + 3 < data.len() {
            if data[pos] == 0 && data[pos + 1] == 0 && data[pos + 2] == 1 {
                let header = data[pos + 3];
                pos += 4;
                return Some(header);
            }
            pos += 1;
        }
        None
    })
}

struct AnnexB {
    delimiter: &'static [u8],
    starts_with_aud: fn(&[u8]) -> bool,
    starts_with_parameter_set: fn(&[u8]) -> bool,
}

const H264_RULES: AnnexB = AnnexB {
    delimiter: &h264::ACCESS_UNIT_DELIMITER,
    starts_with_aud: h264::starts_with_aud,
    starts_with_parameter_set: h264::starts_with_parameter_set,
};

const H265_RULES: AnnexB = AnnexB {
    delimiter: &h265::ACCESS_UNIT_DELIMITER,
    starts_with_aud: h265::starts_with_aud,
    starts_with_parameter_set: h265::starts_with_parameter_set,
};

impl AnnexB {
    fn frame(&self, data: &Bytes, is_key: bool, parameter_sets: Option<&Bytes>) -> Bytes {
        let Some(start) = start_code_len(data) else {
            return data.clone();
        };
        let has_aud = (self.starts_with_aud)(data);
        let parameter_sets =
            parameter_sets.filter(|_| is_key && !(self.starts_with_parameter_set)(data));
        if has_aud && parameter_sets.is_none() {
            return data.clone();
        }

        let extra = parameter_sets.map(|ps| ps.len()).unwrap_or(0) + self.delimiter.len();
        let mut framed = BytesMut::with_capacity(data.len() + extra);
        let body = if has_aud {
            // keep the encoder's delimiter in front
            let split = next_start_code(data, start).unwrap_or(data.len());
            framed.extend_from_slice(&data[..split]);
            &data[split..]
        } else {
            framed.extend_from_slice(self.delimiter);
            &data[..]
        };
        if let Some(ps) = parameter_sets {
            framed.extend_from_slice(ps);
        }
        framed.extend_from_slice(body);
        framed.freeze()
    }
}

/// Per-stream payload framing, chosen once at registration.
#[derive(Debug, Clone, PartialEq)]
pub enum Framer {
    H264 { parameter_sets: Option<Bytes> },
    H265 { parameter_sets: Option<Bytes> },
    Adts(AdtsFramer),
}

impl Framer {
    pub fn for_video(config: &VideoConfig) -> Result<Self> {
        let parameter_sets = config.extra_data.clone();
        match config.codec {
            CodecType::H264 => Ok(Framer::H264 { parameter_sets }),
            CodecType::H265 => Ok(Framer::H265 { parameter_sets }),
            other => Err(TsflowError::Configuration(format!(
                "{:?} video cannot be carried in a transport stream",
                other
            ))),
        }
    }

    pub fn for_audio(config: &AudioConfig) -> Result<Self> {
        match config.codec {
            CodecType::AAC => Ok(Framer::Adts(AdtsFramer::new(config)?)),
            other => Err(TsflowError::Configuration(format!(
                "{:?} audio cannot be carried in a transport stream",
                other
            ))),
        }
    }

    pub fn frame(&self, unit: &AccessUnit) -> Result<Bytes> {
        match self {
            Framer::H264 { parameter_sets } => {
                Ok(H264_RULES.frame(&unit.data, unit.is_key, parameter_sets.as_ref()))
            }
            Framer::H265 { parameter_sets } => {
                Ok(H265_RULES.frame(&unit.data, unit.is_key, parameter_sets.as_ref()))
            }
            Framer::Adts(framer) => framer.frame(&unit.data),
        }
    }
}
