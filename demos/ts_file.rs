use async_trait::async_trait;
use std::time::Duration;
use tokio::task::JoinHandle;
use tsflow::av::{AccessUnit, AudioConfig, VideoConfig};
use tsflow::config;
use tsflow::endpoint::{Endpoint, EndpointConfig, FileEndpoint};
use tsflow::streamer::{AccessUnitSink, MediaSource, Streamer, StreamerEvent};

/// Produces 25 fps video and 44.1 kHz AAC-sized audio frames with
/// synthetic payloads.
#[derive(Default)]
struct SyntheticSource {
    producer: Option<JoinHandle<()>>,
}

#[async_trait]
impl MediaSource for SyntheticSource {
    async fn configure(
        &mut self,
        audio: Option<&AudioConfig>,
        video: Option<&VideoConfig>,
    ) -> tsflow::Result<()> {
        println!("Configured audio={:?} video={:?}", audio.map(|a| a.codec), video.map(|v| v.codec));
        Ok(())
    }

    async fn start_encoding(&mut self, sink: AccessUnitSink) -> tsflow::Result<()> {
        self.producer = Some(tokio::spawn(async move {
            let mut audio_pts = Duration::ZERO;
            // one frame per 40 ms of wall time, like a live encoder
            let mut ticker = tokio::time::interval(Duration::from_millis(40));
            for frame in 0..250u64 {
                ticker.tick().await;
                let pts = Duration::from_millis(frame * 40);
                let video = AccessUnit::video(vec![(frame & 0xff) as u8; 4000], pts)
                    .with_key_flag(frame % 50 == 0);
                if sink.send(video).await.is_err() {
                    return;
                }
                while audio_pts <= pts {
                    if sink.send(AccessUnit::audio(vec![0x21; 300], audio_pts)).await.is_err() {
                        return;
                    }
                    audio_pts += Duration::from_micros(23_220);
                }
            }
        }));
        Ok(())
    }

    async fn stop_encoding(&mut self) -> tsflow::Result<()> {
        if let Some(producer) = self.producer.take() {
            producer.abort();
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = config::settings();
    let endpoint: Box<dyn Endpoint> = match settings.endpoint_config()? {
        Some(endpoint) => endpoint.build(),
        None => Box::new(FileEndpoint::new("output.ts")),
    };
    if let Some(EndpointConfig::File { path }) = settings.endpoint_config()? {
        println!("Writing to {}", path.display());
    }

    let mut streamer = Streamer::new(
        settings.streamer_config(),
        Box::new(SyntheticSource::default()),
        endpoint,
    );
    let mut events = streamer
        .take_event_receiver()
        .ok_or("event receiver already taken")?;

    streamer
        .configure(Some(AudioConfig::default()), Some(VideoConfig::default()))
        .await?;
    streamer.start_preview().await?;
    streamer.start_stream().await?;
    println!("Streaming 10 seconds of synthetic media...");

    tokio::time::sleep(Duration::from_secs(10)).await;
    while let Ok(event) = events.try_recv() {
        match event {
            StreamerEvent::Error(e) => println!("Stream error: {}", e),
            other => println!("Event: {:?}", other),
        }
    }

    streamer.stop_stream().await?;
    streamer.release().await?;
    println!("Done, streamer {}", streamer.state());
    Ok(())
}
