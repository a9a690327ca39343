use super::MediaKind;
use bytes::Bytes;
use std::time::Duration;

/// One encoded audio frame or video access unit, as delivered by an encoder.
#[derive(Debug, Clone)]
pub struct AccessUnit {
    pub data: Bytes,
    /// Presentation timestamp on the stream timeline.
    pub pts: Duration,
    /// Decode timestamp, only meaningful for video with reordering.
    pub dts: Option<Duration>,
    pub kind: MediaKind,
    pub is_key: bool,
}

impl AccessUnit {
    pub fn new(kind: MediaKind, data: impl Into<Bytes>, pts: Duration) -> Self {
        Self {
            data: data.into(),
            pts,
            dts: None,
            kind,
            is_key: false,
        }
    }

    pub fn video(data: impl Into<Bytes>, pts: Duration) -> Self {
        Self::new(MediaKind::Video, data, pts)
    }

    pub fn audio(data: impl Into<Bytes>, pts: Duration) -> Self {
        Self::new(MediaKind::Audio, data, pts)
    }

    pub fn with_dts(mut self, dts: Duration) -> Self {
        self.dts = Some(dts);
        self
    }

    pub fn with_key_flag(mut self, is_key: bool) -> Self {
        self.is_key = is_key;
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
