use async_trait::async_trait;
use bytes::Bytes;
use echowave_session::{AudioCapture, CaptureError, LocalAudio, opus_track};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use webrtc::media::Sample;

/// One 20 ms Opus frame of silence.
const OPUS_SILENCE: &[u8] = &[0xf8, 0xff, 0xfe];
const FRAME: Duration = Duration::from_millis(20);

/// Capture source for terminals without a microphone: streams Opus
/// silence so peers still see a live audio track.
#[derive(Default)]
pub struct SilenceCapture {
    writer: Mutex<Option<JoinHandle<()>>>,
}

#[async_trait]
impl AudioCapture for SilenceCapture {
    async fn acquire(&self) -> Result<LocalAudio, CaptureError> {
        let track = opus_track("audio", "echowave");

        let writer_track = track.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(FRAME);
            loop {
                ticker.tick().await;
                let sample = Sample {
                    data: Bytes::from_static(OPUS_SILENCE),
                    duration: FRAME,
                    ..Default::default()
                };
                if let Err(e) = writer_track.write_sample(&sample).await {
                    warn!("Failed to write silence frame: {}", e);
                    break;
                }
            }
        });

        if let Some(previous) = self.writer.lock().await.replace(handle) {
            previous.abort();
        }
        Ok(track)
    }

    async fn release(&self, _audio: LocalAudio) {
        if let Some(handle) = self.writer.lock().await.take() {
            debug!("Stopping silence writer");
            handle.abort();
        }
    }
}
