use crate::transport::link_event::{LinkEventSink, LocalAudio};
use anyhow::Result;
use async_trait::async_trait;
use echowave_core::{IceCandidate, SessionDescription};
use std::sync::Arc;

/// One negotiated media connection to one remote participant.
#[async_trait]
pub trait MediaConnection: Send + Sync {
    async fn add_local_track(&self, track: LocalAudio) -> Result<()>;

    /// Create an offer and install it as the local description.
    async fn create_offer(&self) -> Result<SessionDescription>;

    /// Create an answer and install it as the local description.
    async fn create_answer(&self) -> Result<SessionDescription>;

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

/// Factory for media connections. Callbacks of the created connection
/// report through `sink`.
#[async_trait]
pub trait PeerConnector: Send + Sync {
    async fn connect(&self, sink: LinkEventSink) -> Result<Arc<dyn MediaConnection>>;
}
