use crate::transport::RemoteAudio;
use echowave_core::{PeerId, RoomMode};

/// Lifecycle notifications raised by the orchestrator, in dispatch order.
#[derive(Debug)]
pub enum SessionEvent {
    /// The signaling channel is up and the join message was sent.
    Connected { mode: RoomMode },
    /// The server told us our own identity.
    SelfAssigned(PeerId),
    Matched { partner: PeerId, initiator: bool },
    PeerAdded(PeerId),
    PeerRemoved(PeerId),
    PeerAudioReady(PeerId, RemoteAudio),
    PeerCountChanged(usize),
    /// The server rejected the room; the session has been left.
    RoomError(String),
    /// The signaling channel failed; the session has been left.
    FatalSignalingError(String),
    /// The random-mode partner went away; the session has been left.
    PartnerLeft(PeerId),
}
