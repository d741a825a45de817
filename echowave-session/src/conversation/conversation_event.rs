use crate::conversation::controller::ConversationState;
use crate::transport::RemoteAudio;
use echowave_core::{PeerId, Summary};

/// Notifications for whatever renders the conversation.
#[derive(Debug)]
pub enum ConversationEvent {
    StateChanged(ConversationState),
    PeerAudioReady { peer_id: PeerId, audio: RemoteAudio },
    PeerCountChanged(usize),
    Error(String),
    SummaryReady(Summary),
}
