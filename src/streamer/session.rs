//! The consumer side of one streaming session.
//!
//! A session task owns the muxer and the endpoint exclusively while it
//! runs, so all muxer state changes happen on one logical thread. Both are
//! handed back when the task ends.

use super::events::StreamerEvent;
use super::source::SinkMessage;
use super::state::StreamerState;
use crate::av::AccessUnit;
use crate::endpoint::Endpoint;
use crate::error::{ErrorKind, Result, TsflowError};
use crate::format::ts::{concat_packets, interleave, TsMuxer};
use log::{debug, error, trace, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;

/// What a finished session hands back to the streamer.
pub(crate) struct SessionParts {
    pub muxer: TsMuxer,
    pub endpoint: Box<dyn Endpoint>,
    pub failed: bool,
}

pub(crate) struct Session {
    pub muxer: TsMuxer,
    pub endpoint: Box<dyn Endpoint>,
    pub receiver: mpsc::Receiver<SinkMessage>,
    pub stop: oneshot::Receiver<()>,
    pub state: Arc<Mutex<StreamerState>>,
    pub events: mpsc::UnboundedSender<StreamerEvent>,
    pub batch_limit: usize,
    pub write_timeout: Duration,
    pub drain_timeout: Duration,
}

impl Session {
    pub(crate) async fn run(mut self) -> SessionParts {
        let result = match self.pump().await {
            Ok(()) => self.drain().await,
            Err(e) => Err(e),
        };
        let closed = self.close_endpoint().await;

        let failed = match (result, closed) {
            (Err(e), closed) => {
                if let Err(close_error) = closed {
                    warn!("Closing {} after failure: {}", self.endpoint.describe(), close_error);
                }
                self.fail(e);
                true
            }
            (Ok(()), Err(e)) => {
                self.fail(e);
                true
            }
            (Ok(()), Ok(())) => false,
        };

        self.muxer.end_session();
        SessionParts {
            muxer: self.muxer,
            endpoint: self.endpoint,
            failed,
        }
    }

    /// Muxes queued units until stopped or until something fails.
    async fn pump(&mut self) -> Result<()> {
        loop {
            tokio::select! {
                biased;
                _ = &mut self.stop => return Ok(()),
                message = self.receiver.recv() => match message {
                    Some(message) => {
                        let mut batch = vec![message];
                        while batch.len() < self.batch_limit {
                            match self.receiver.try_recv() {
                                Ok(message) => batch.push(message),
                                Err(_) => break,
                            }
                        }
                        self.process(batch).await?;
                    }
                    None => {
                        // every producer is gone, idle until told to stop
                        let _ = (&mut self.stop).await;
                        return Ok(());
                    }
                },
            }
        }
    }

    /// Flushes whatever is still queued, bounded by the drain timeout.
    async fn drain(&mut self) -> Result<()> {
        self.receiver.close();
        let mut pending = Vec::new();
        while let Ok(message) = self.receiver.try_recv() {
            pending.push(message);
        }
        if pending.is_empty() {
            return Ok(());
        }

        debug!("Draining {} queued unit(s)", pending.len());
        let drain_timeout = self.drain_timeout;
        match timeout(drain_timeout, self.process(pending)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Drain did not finish within {:?}, dropping the rest", drain_timeout);
                Ok(())
            }
        }
    }

    async fn process(&mut self, batch: Vec<SinkMessage>) -> Result<()> {
        let mut units = Vec::with_capacity(batch.len());
        let mut failure = None;
        for message in batch {
            match message {
                SinkMessage::Unit(unit) => units.push(unit),
                SinkMessage::Failed(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        interleave(&mut units);
        for unit in &units {
            self.write_unit(unit).await?;
        }
        match failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn write_unit(&mut self, unit: &AccessUnit) -> Result<()> {
        let packets = self.muxer.mux(unit)?;
        let data = concat_packets(&packets);
        trace!("Writing {} bytes for {} unit at {:?}", data.len(), unit.kind, unit.pts);

        match timeout(self.write_timeout, self.endpoint.write(data)).await {
            Ok(result) => result,
            Err(_) => Err(TsflowError::Timeout(format!(
                "write to {} took longer than {:?}",
                self.endpoint.describe(),
                self.write_timeout
            ))),
        }
    }

    async fn close_endpoint(&mut self) -> Result<()> {
        match timeout(self.write_timeout, self.endpoint.close()).await {
            Ok(result) => result,
            Err(_) => Err(TsflowError::Timeout(format!(
                "closing {} took longer than {:?}",
                self.endpoint.describe(),
                self.write_timeout
            ))),
        }
    }

    fn fail(&mut self, e: TsflowError) {
        let target = self.endpoint.describe();
        error!("Streaming to {} failed: {}", target, e);
        {
            let mut state = self.state.lock();
            if *state == StreamerState::Streaming {
                *state = StreamerState::Error;
            }
        }

        let lost = self.endpoint.is_connection_oriented() && e.kind() == ErrorKind::Io;
        let _ = self.events.send(StreamerEvent::Error(e.during("stream")));
        if lost {
            let _ = self.events.send(StreamerEvent::ConnectionLost(target));
        }
    }
}
