mod peer;
mod room;
mod signaling;
mod summary;

pub use peer::PeerId;
pub use room::{RoomCode, RoomMode};
pub use signaling::{
    IceCandidate, IceServerConfig, InboundSignal, OutboundSignal, SdpKind, SessionDescription,
    SignalData,
};
pub use summary::Summary;
