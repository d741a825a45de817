use echowave_core::{IceCandidate, PeerId, SessionDescription};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use webrtc::api::media_engine::MIME_TYPE_OPUS;
use webrtc::rtp_transceiver::rtp_codec::RTCRtpCodecCapability;
use webrtc::track::track_local::track_local_static_sample::TrackLocalStaticSample;
use webrtc::track::track_remote::TrackRemote;

/// Local capture track, shared read-only by every peer link.
pub type LocalAudio = Arc<TrackLocalStaticSample>;

/// Builds an Opus track that a capture source writes samples into.
pub fn opus_track(track_id: &str, stream_id: &str) -> LocalAudio {
    Arc::new(TrackLocalStaticSample::new(
        RTCRtpCodecCapability {
            mime_type: MIME_TYPE_OPUS.to_owned(),
            ..Default::default()
        },
        track_id.to_owned(),
        stream_id.to_owned(),
    ))
}

/// Audio received from a remote participant.
#[derive(Clone)]
pub struct RemoteAudio {
    pub track_id: String,
    pub stream_id: String,
    /// Underlying RTP track; absent for connections that do not carry real media.
    pub track: Option<Arc<TrackRemote>>,
}

impl fmt::Debug for RemoteAudio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteAudio")
            .field("track_id", &self.track_id)
            .field("stream_id", &self.stream_id)
            .finish()
    }
}

/// Connectivity state reported by the media transport of one link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl TransportState {
    /// States after which the link can no longer carry audio.
    /// `Disconnected` is not one of them: ICE may still recover.
    pub fn is_lost(self) -> bool {
        matches!(self, Self::Failed | Self::Closed)
    }
}

/// Identifies the session epoch and the exact link an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkTag {
    pub epoch: u64,
    pub serial: u64,
}

#[derive(Debug)]
pub enum LinkEventKind {
    CandidateGenerated(IceCandidate),
    StateChanged(TransportState),
    TrackReceived(RemoteAudio),
    OfferCreated(Result<SessionDescription, String>),
    AnswerCreated(Result<SessionDescription, String>),
}

/// Asynchronous fact about one link, re-entering the orchestrator's dispatch.
#[derive(Debug)]
pub struct LinkEvent {
    pub tag: LinkTag,
    pub peer_id: PeerId,
    pub kind: LinkEventKind,
}

/// Handle through which a connection and its callbacks report back.
#[derive(Clone)]
pub struct LinkEventSink {
    tag: LinkTag,
    peer_id: PeerId,
    tx: mpsc::UnboundedSender<LinkEvent>,
}

impl LinkEventSink {
    pub fn new(tag: LinkTag, peer_id: PeerId, tx: mpsc::UnboundedSender<LinkEvent>) -> Self {
        Self { tag, peer_id, tx }
    }

    pub fn tag(&self) -> LinkTag {
        self.tag
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.peer_id
    }

    pub fn emit(&self, kind: LinkEventKind) {
        // The orchestrator may already be gone; late events are simply dropped.
        let _ = self.tx.send(LinkEvent {
            tag: self.tag,
            peer_id: self.peer_id.clone(),
            kind,
        });
    }
}
