use std::fmt;

/// Lifecycle state of a [`super::Streamer`].
///
/// Preview is tracked separately, so `Streaming` covers both streaming with
/// and without a running preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamerState {
    Idle,
    Configured,
    Previewing,
    Streaming,
    Error,
    Released,
}

impl StreamerState {
    /// Whether a streaming session may still own the muxer and endpoint.
    pub fn has_session(&self) -> bool {
        matches!(self, StreamerState::Streaming | StreamerState::Error)
    }
}

impl fmt::Display for StreamerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StreamerState::Idle => "idle",
            StreamerState::Configured => "configured",
            StreamerState::Previewing => "previewing",
            StreamerState::Streaming => "streaming",
            StreamerState::Error => "in error",
            StreamerState::Released => "released",
        };
        f.write_str(name)
    }
}
