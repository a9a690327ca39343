use crate::error::TsflowError;

/// Asynchronous notifications published by the pipeline.
///
/// Drained by the caller from the receiver returned by
/// [`super::Streamer::take_event_receiver`].
#[derive(Debug)]
pub enum StreamerEvent {
    /// A session failed. Published once per failure.
    Error(TsflowError),
    /// A connection-oriented endpoint was opened.
    ConnectionSucceeded(String),
    /// A connection-oriented endpoint failed while streaming.
    ConnectionLost(String),
}

impl StreamerEvent {
    pub fn is_error(&self) -> bool {
        matches!(self, StreamerEvent::Error(_))
    }
}
