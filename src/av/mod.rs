mod access_unit;
mod config;

pub use access_unit::*;
pub use config::*;

/// Codecs the pipeline knows about. Not all of them can be carried in TS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecType {
    H264,
    H265,
    AAC,
    OPUS,
}

impl CodecType {
    pub fn kind(&self) -> MediaKind {
        match self {
            CodecType::H264 | CodecType::H265 => MediaKind::Video,
            CodecType::AAC | CodecType::OPUS => MediaKind::Audio,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MediaKind {
    Audio,
    Video,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Audio => write!(f, "audio"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}
