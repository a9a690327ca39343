//! # Streaming pipeline
//!
//! [`Streamer`] drives the lifecycle
//! `Idle → Configured → Previewing ⇄ Streaming → … → Released`
//! and owns the producer queue, the muxer and the endpoint.
//!
//! While streaming, a single spawned session task pulls access units from a
//! bounded queue, muxes them and writes the packets to the endpoint. Failures
//! inside the session move the state to `Error` and are published as
//! [`StreamerEvent`]s.
//!
//! ```rust,no_run
//! use tsflow::endpoint::FileEndpoint;
//! use tsflow::streamer::{Streamer, StreamerConfig};
//! # use tsflow::streamer::{AccessUnitSink, MediaSource};
//! # use tsflow::av::{AudioConfig, VideoConfig};
//! # struct Camera;
//! # #[async_trait::async_trait]
//! # impl MediaSource for Camera {
//! #     async fn configure(&mut self, _: Option<&AudioConfig>, _: Option<&VideoConfig>) -> tsflow::Result<()> { Ok(()) }
//! #     async fn start_encoding(&mut self, _: AccessUnitSink) -> tsflow::Result<()> { Ok(()) }
//! #     async fn stop_encoding(&mut self) -> tsflow::Result<()> { Ok(()) }
//! # }
//!
//! #[tokio::main]
//! async fn main() -> tsflow::Result<()> {
//!     let mut streamer = Streamer::new(
//!         StreamerConfig::default(),
//!         Box::new(Camera),
//!         Box::new(FileEndpoint::new("out.ts")),
//!     );
//!     streamer
//!         .configure(Some(AudioConfig::default()), Some(VideoConfig::default()))
//!         .await?;
//!     streamer.start_preview().await?;
//!     streamer.start_stream().await?;
//!     // ...
//!     streamer.stop_stream().await?;
//!     streamer.release().await
//! }
//! ```

mod events;
mod session;
mod source;
mod state;

pub use events::StreamerEvent;
pub use source::{AccessUnitSink, MediaSource};
pub use state::StreamerState;

use crate::av::{AudioConfig, VideoConfig};
use crate::endpoint::Endpoint;
use crate::error::{Result, TsflowError};
use crate::format::ts::{MuxerConfig, ServiceDescriptor, ServiceType, StreamConfig, TsMuxer};
use log::{error, info, warn};
use parking_lot::Mutex;
use session::{Session, SessionParts};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// Pipeline settings, usually derived from [`crate::config::Settings`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamerConfig {
    pub service: ServiceDescriptor,
    pub muxer: MuxerConfig,
    /// Capacity of the producer queue, in access units.
    pub queue_capacity: usize,
    /// Upper bound for one endpoint open, write or close.
    pub write_timeout: Duration,
    /// Upper bound for flushing queued units on stop.
    pub drain_timeout: Duration,
}

impl Default for StreamerConfig {
    fn default() -> Self {
        Self {
            service: ServiceDescriptor::new(0x4698, ServiceType::DigitalTv, "tsflow", "tsflow"),
            muxer: MuxerConfig::default(),
            queue_capacity: 64,
            write_timeout: Duration::from_secs(2),
            drain_timeout: Duration::from_millis(500),
        }
    }
}

struct SessionHandle {
    stop: oneshot::Sender<()>,
    task: JoinHandle<SessionParts>,
}

/// Lifecycle owner of one capture → mux → endpoint pipeline.
pub struct Streamer {
    config: StreamerConfig,
    source: Box<dyn MediaSource>,
    muxer: Option<TsMuxer>,
    endpoint: Option<Box<dyn Endpoint>>,
    state: Arc<Mutex<StreamerState>>,
    previewing: bool,
    session: Option<SessionHandle>,
    events: mpsc::UnboundedSender<StreamerEvent>,
    event_receiver: Option<mpsc::UnboundedReceiver<StreamerEvent>>,
}

impl Streamer {
    pub fn new(
        config: StreamerConfig,
        source: Box<dyn MediaSource>,
        endpoint: Box<dyn Endpoint>,
    ) -> Self {
        let (events, event_receiver) = mpsc::unbounded_channel();
        let muxer = TsMuxer::new(config.muxer.clone());
        Self {
            config,
            source,
            muxer: Some(muxer),
            endpoint: Some(endpoint),
            state: Arc::new(Mutex::new(StreamerState::Idle)),
            previewing: false,
            session: None,
            events,
            event_receiver: Some(event_receiver),
        }
    }

    pub fn state(&self) -> StreamerState {
        *self.state.lock()
    }

    pub fn is_previewing(&self) -> bool {
        self.previewing
    }

    /// The outbound event channel. Can be taken once.
    pub fn take_event_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<StreamerEvent>> {
        self.event_receiver.take()
    }

    /// The muxer, when no session currently owns it.
    pub fn muxer(&self) -> Option<&TsMuxer> {
        self.muxer.as_ref()
    }

    /// Configures the source and registers the service streams with the muxer.
    pub async fn configure(
        &mut self,
        audio: Option<AudioConfig>,
        video: Option<VideoConfig>,
    ) -> Result<()> {
        self.expect_state(
            "configure",
            &[StreamerState::Idle, StreamerState::Configured],
        )?;

        let mut streams: Vec<StreamConfig> = Vec::new();
        if let Some(video) = &video {
            streams.push(video.clone().into());
        }
        if let Some(audio) = &audio {
            streams.push(audio.clone().into());
        }

        let muxer = self.muxer.get_or_insert_with(|| TsMuxer::new(self.config.muxer.clone()));
        muxer
            .register_service(self.config.service.clone(), streams)
            .map_err(|e| e.during("configure"))?;
        self.source
            .configure(audio.as_ref(), video.as_ref())
            .await
            .map_err(|e| e.during("configure"))?;

        self.set_state(StreamerState::Configured);
        Ok(())
    }

    pub async fn start_preview(&mut self) -> Result<()> {
        self.expect_state("start preview", &[StreamerState::Configured])?;
        self.source
            .start_preview()
            .await
            .map_err(|e| e.during("start preview"))?;
        self.previewing = true;
        self.set_state(StreamerState::Previewing);
        Ok(())
    }

    /// Opens the endpoint and starts a streaming session.
    ///
    /// When the endpoint cannot be opened the error is returned and the
    /// state is left as it was.
    pub async fn start_stream(&mut self) -> Result<()> {
        let state = self.expect_state(
            "start stream",
            &[
                StreamerState::Configured,
                StreamerState::Previewing,
                StreamerState::Error,
            ],
        )?;
        if state == StreamerState::Error {
            self.teardown_session().await?;
        }

        let (Some(mut muxer), Some(mut endpoint)) = (self.muxer.take(), self.endpoint.take())
        else {
            return Err(TsflowError::Muxing("muxer or endpoint was lost".into()).during("start stream"));
        };

        let opened = match timeout(self.config.write_timeout, endpoint.open()).await {
            Ok(result) => result,
            Err(_) => Err(TsflowError::Timeout(format!(
                "opening {} took longer than {:?}",
                endpoint.describe(),
                self.config.write_timeout
            ))),
        };
        if let Err(e) = opened {
            error!("Could not open {}: {}", endpoint.describe(), e);
            self.muxer = Some(muxer);
            self.endpoint = Some(endpoint);
            return Err(e.during("start stream"));
        }

        let (sender, receiver) = mpsc::channel(self.config.queue_capacity.max(1));
        let started = match muxer.begin_session() {
            Ok(()) => self
                .source
                .start_encoding(AccessUnitSink::new(sender))
                .await
                .inspect_err(|_| muxer.end_session()),
            Err(e) => Err(e),
        };
        if let Err(e) = started {
            if let Err(close_error) = endpoint.close().await {
                warn!("Closing {}: {}", endpoint.describe(), close_error);
            }
            self.muxer = Some(muxer);
            self.endpoint = Some(endpoint);
            return Err(e.during("start stream"));
        }

        let target = endpoint.describe();
        let connection_oriented = endpoint.is_connection_oriented();
        let (stop, stop_receiver) = oneshot::channel();
        let session = Session {
            muxer,
            endpoint,
            receiver,
            stop: stop_receiver,
            state: self.state.clone(),
            events: self.events.clone(),
            batch_limit: self.config.queue_capacity.max(1),
            write_timeout: self.config.write_timeout,
            drain_timeout: self.config.drain_timeout,
        };

        // state first, so a failure inside the session is never overwritten
        self.set_state(StreamerState::Streaming);
        let task = tokio::spawn(session.run());
        self.session = Some(SessionHandle { stop, task });

        if connection_oriented {
            let _ = self
                .events
                .send(StreamerEvent::ConnectionSucceeded(target.clone()));
        }
        info!("Streaming to {}", target);
        Ok(())
    }

    /// Drains in-flight units, closes the endpoint and returns to
    /// `Previewing` or `Configured`.
    pub async fn stop_stream(&mut self) -> Result<()> {
        self.expect_state(
            "stop stream",
            &[StreamerState::Streaming, StreamerState::Error],
        )?;
        self.teardown_session().await?;
        self.set_state(self.resting_state());
        Ok(())
    }

    /// Stops the preview, stopping the stream first if one is running.
    pub async fn stop_preview(&mut self) -> Result<()> {
        let state = self.expect_state(
            "stop preview",
            &[
                StreamerState::Previewing,
                StreamerState::Streaming,
                StreamerState::Error,
            ],
        )?;
        if state.has_session() {
            self.teardown_session().await?;
        }
        if self.previewing {
            self.source
                .stop_preview()
                .await
                .map_err(|e| e.during("stop preview"))?;
            self.previewing = false;
        }
        self.set_state(StreamerState::Configured);
        Ok(())
    }

    /// Tears everything down. Terminal and idempotent; teardown failures
    /// are logged.
    pub async fn release(&mut self) -> Result<()> {
        let state = self.state();
        if state == StreamerState::Released {
            return Ok(());
        }

        if state.has_session() || self.session.is_some() {
            if let Err(e) = self.teardown_session().await {
                warn!("Releasing: {}", e);
            }
        }
        if self.previewing {
            if let Err(e) = self.source.stop_preview().await {
                warn!("Releasing: stop preview failed: {}", e);
            }
            self.previewing = false;
        }
        if let Err(e) = self.source.release().await {
            warn!("Releasing: source release failed: {}", e);
        }

        self.set_state(StreamerState::Released);
        Ok(())
    }

    /// Stops the encoder and reclaims the muxer and endpoint from the session.
    async fn teardown_session(&mut self) -> Result<()> {
        if let Err(e) = self.source.stop_encoding().await {
            warn!("Stopping the encoder failed: {}", e);
        }

        let Some(handle) = self.session.take() else {
            return Ok(());
        };
        // the session may already have ended on its own
        let _ = handle.stop.send(());
        match handle.task.await {
            Ok(parts) => {
                if parts.failed {
                    info!("Reclaimed a failed session");
                }
                self.muxer = Some(parts.muxer);
                self.endpoint = Some(parts.endpoint);
                Ok(())
            }
            Err(e) => {
                error!("Session task ended abnormally: {}", e);
                self.set_state(StreamerState::Error);
                Err(TsflowError::Muxing(format!("session task ended abnormally: {}", e))
                    .during("stop stream"))
            }
        }
    }

    fn resting_state(&self) -> StreamerState {
        if self.previewing {
            StreamerState::Previewing
        } else {
            StreamerState::Configured
        }
    }

    fn expect_state(
        &self,
        operation: &'static str,
        allowed: &[StreamerState],
    ) -> Result<StreamerState> {
        let state = self.state();
        if allowed.contains(&state) {
            Ok(state)
        } else {
            Err(TsflowError::InvalidState { operation, state })
        }
    }

    fn set_state(&self, next: StreamerState) {
        let mut state = self.state.lock();
        if *state != next {
            info!("Streamer {} -> {}", *state, next);
            *state = next;
        }
    }
}

impl Drop for Streamer {
    fn drop(&mut self) {
        if let Some(handle) = self.session.take() {
            // the session drains and closes the endpoint on its own
            let _ = handle.stop.send(());
        }
    }
}
