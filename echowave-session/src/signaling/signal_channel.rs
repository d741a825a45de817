use async_trait::async_trait;
use echowave_core::{InboundSignal, OutboundSignal};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum SignalError {
    #[error("failed to reach signaling server: {0}")]
    Connect(String),

    #[error("signaling channel is not connected")]
    NotConnected,

    #[error("failed to encode signal: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Bidirectional message channel to the rendezvous server.
///
/// Inbound events arrive on the receiver returned by [`connect`](Self::connect)
/// in the order the server sent them. Transport loss is reported in-band as
/// [`InboundSignal::Disconnected`]; a closed receiver means the same thing.
/// Nothing is replayed after a reconnect.
#[async_trait]
pub trait SignalChannel: Send {
    async fn connect(&mut self) -> Result<mpsc::Receiver<InboundSignal>, SignalError>;

    async fn emit(&mut self, msg: OutboundSignal) -> Result<(), SignalError>;

    /// Drop the connection. Safe to call when not connected.
    async fn disconnect(&mut self);
}

/// Builds a fresh channel for every conversation attempt.
pub type ChannelFactory = Arc<dyn Fn() -> Box<dyn SignalChannel> + Send + Sync>;
