use crate::signaling::SignalError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("signaling failed: {0}")]
    Signaling(#[from] SignalError),

    #[error("room error: {0}")]
    Room(String),

    #[error("signaling channel closed: {0}")]
    Closed(String),

    #[error("timed out waiting for the signaling server")]
    Timeout,
}
