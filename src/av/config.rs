use super::{CodecType, MediaKind};
use crate::codec::aac::sample_rate_index;
use crate::error::{Result, TsflowError};
use bytes::Bytes;

/// Audio encoder configuration, as handed to `Streamer::configure`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioConfig {
    pub codec: CodecType,
    pub sample_rate: u32,
    pub channels: u8,
    pub bitrate: u32,
    /// ISO 639-2 language code advertised in the PMT.
    pub language: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            codec: CodecType::AAC,
            sample_rate: 44_100,
            channels: 2,
            bitrate: 128_000,
            language: None,
        }
    }
}

impl AudioConfig {
    pub fn new(codec: CodecType) -> Self {
        Self {
            codec,
            ..Default::default()
        }
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_channels(mut self, channels: u8) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_bitrate(mut self, bitrate: u32) -> Self {
        self.bitrate = bitrate;
        self
    }

    pub fn with_language(mut self, language: &str) -> Self {
        self.language = Some(language.to_string());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.codec.kind() != MediaKind::Audio {
            return Err(TsflowError::Configuration(format!(
                "{:?} is not an audio codec",
                self.codec
            )));
        }
        if self.codec == CodecType::AAC && sample_rate_index(self.sample_rate).is_none() {
            return Err(TsflowError::Configuration(format!(
                "unsupported AAC sample rate {}",
                self.sample_rate
            )));
        }
        if !(1..=7).contains(&self.channels) {
            return Err(TsflowError::Configuration(format!(
                "unsupported channel count {}",
                self.channels
            )));
        }
        if let Some(language) = &self.language {
            if language.len() != 3 || !language.is_ascii() {
                return Err(TsflowError::Configuration(format!(
                    "language '{}' is not a three letter ISO 639 code",
                    language
                )));
            }
        }
        Ok(())
    }
}

/// Video encoder configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoConfig {
    pub codec: CodecType,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub bitrate: u32,
    /// Annex-B parameter sets (SPS/PPS, plus VPS for H.265).
    pub extra_data: Option<Bytes>,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            codec: CodecType::H264,
            width: 1280,
            height: 720,
            fps: 30,
            bitrate: 2_000_000,
            extra_data: None,
        }
    }
}

impl VideoConfig {
    pub fn new(codec: CodecType) -> Self {
        Self {
            codec,
            ..Default::default()
        }
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    pub fn with_bitrate(mut self, bitrate: u32) -> Self {
        self.bitrate = bitrate;
        self
    }

    pub fn with_extra_data(mut self, extra_data: impl Into<Bytes>) -> Self {
        self.extra_data = Some(extra_data.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.codec.kind() != MediaKind::Video {
            return Err(TsflowError::Configuration(format!(
                "{:?} is not a video codec",
                self.codec
            )));
        }
        if self.width == 0 || self.height == 0 {
            return Err(TsflowError::Configuration(format!(
                "invalid resolution {}x{}",
                self.width, self.height
            )));
        }
        if self.fps == 0 {
            return Err(TsflowError::Configuration("frame rate must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_validation() {
        assert!(AudioConfig::default().validate().is_ok());
        assert!(AudioConfig::default().with_sample_rate(44_000).validate().is_err());
        assert!(AudioConfig::default().with_channels(0).validate().is_err());
        assert!(AudioConfig::default().with_language("en").validate().is_err());
        assert!(AudioConfig::default().with_language("eng").validate().is_ok());
        assert!(AudioConfig::new(CodecType::H264).validate().is_err());
    }

    #[test]
    fn test_video_validation() {
        assert!(VideoConfig::default().validate().is_ok());
        assert!(VideoConfig::default().with_resolution(0, 720).validate().is_err());
        assert!(VideoConfig::default().with_fps(0).validate().is_err());
        assert!(VideoConfig::new(CodecType::AAC).validate().is_err());
    }
}
