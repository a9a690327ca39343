use crate::av::{AccessUnit, AudioConfig, VideoConfig};
use crate::error::{Result, TsflowError};
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Capture and encoder collaborator feeding the pipeline.
///
/// Encoded units are pushed into the [`AccessUnitSink`] handed over by
/// `start_encoding`, in non-decreasing PTS order per stream.
#[async_trait]
pub trait MediaSource: Send {
    async fn configure(
        &mut self,
        audio: Option<&AudioConfig>,
        video: Option<&VideoConfig>,
    ) -> Result<()>;

    async fn start_preview(&mut self) -> Result<()> {
        Ok(())
    }

    async fn stop_preview(&mut self) -> Result<()> {
        Ok(())
    }

    async fn start_encoding(&mut self, sink: AccessUnitSink) -> Result<()>;

    /// Stops producing units. The sink should be dropped.
    async fn stop_encoding(&mut self) -> Result<()>;

    async fn release(&mut self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug)]
pub(crate) enum SinkMessage {
    Unit(AccessUnit),
    Failed(TsflowError),
}

/// Producer side of the bounded access unit queue.
///
/// Sending waits while the queue is full, so a slow endpoint pushes back on
/// the encoders instead of units being dropped.
#[derive(Debug, Clone)]
pub struct AccessUnitSink {
    sender: mpsc::Sender<SinkMessage>,
}

impl AccessUnitSink {
    pub(crate) fn new(sender: mpsc::Sender<SinkMessage>) -> Self {
        Self { sender }
    }

    pub async fn send(&self, unit: AccessUnit) -> Result<()> {
        self.sender
            .send(SinkMessage::Unit(unit))
            .await
            .map_err(|_| TsflowError::SessionClosed)
    }

    /// Blocking variant for encoder threads outside the runtime.
    pub fn blocking_send(&self, unit: AccessUnit) -> Result<()> {
        self.sender
            .blocking_send(SinkMessage::Unit(unit))
            .map_err(|_| TsflowError::SessionClosed)
    }

    /// Forwards a capture or encoder failure, ending the session.
    pub async fn report_failure(&self, error: TsflowError) {
        // a closed session has nobody left to tell
        let _ = self.sender.send(SinkMessage::Failed(error)).await;
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Free slots left in the queue.
    pub fn capacity(&self) -> usize {
        self.sender.capacity()
    }
}
