use crate::transport::LocalAudio;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no microphone available")]
    NoDevice,

    #[error("microphone permission denied")]
    PermissionDenied,

    #[error("audio capture failed: {0}")]
    Other(String),
}

/// Source of the local microphone track.
///
/// Only the controller calls [`release`](Self::release), and only after every
/// link that referenced the track has been closed.
#[async_trait]
pub trait AudioCapture: Send + Sync {
    async fn acquire(&self) -> Result<LocalAudio, CaptureError>;

    async fn release(&self, audio: LocalAudio);
}
