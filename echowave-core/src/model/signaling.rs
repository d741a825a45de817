use crate::model::peer::PeerId;
use crate::model::room::RoomCode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    pub username: Option<String>,
    pub credential: Option<String>,
}

impl IceServerConfig {
    pub fn stun(urls: Vec<String>) -> Self {
        Self {
            urls,
            username: None,
            credential: None,
        }
    }
}

/// One connectivity candidate, in the browser `RTCIceCandidateInit` shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(rename = "sdpMid", default)]
    pub sdp_mid: Option<String>,
    #[serde(rename = "sdpMLineIndex", default)]
    pub sdp_m_line_index: Option<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdpKind {
    Offer,
    Answer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

/// Body of a negotiation envelope exchanged between two peers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SignalData {
    Offer { sdp: String },
    Answer { sdp: String },
    Candidate { candidate: IceCandidate },
}

impl SignalData {
    pub fn kind(&self) -> &'static str {
        match self {
            SignalData::Offer { .. } => "offer",
            SignalData::Answer { .. } => "answer",
            SignalData::Candidate { .. } => "candidate",
        }
    }
}

impl From<SessionDescription> for SignalData {
    fn from(desc: SessionDescription) -> Self {
        match desc.kind {
            SdpKind::Offer => SignalData::Offer { sdp: desc.sdp },
            SdpKind::Answer => SignalData::Answer { sdp: desc.sdp },
        }
    }
}

/// Messages sent by the client to the rendezvous server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum OutboundSignal {
    JoinRoom { code: RoomCode },
    JoinRandom,
    CreateRoom,
    Signal { target: PeerId, data: SignalData },
}

/// Messages delivered by the rendezvous server, plus the two transport
/// conditions the channel reports in-band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum InboundSignal {
    Welcome {
        id: PeerId,
    },
    RoomMembers {
        members: Vec<PeerId>,
    },
    UserJoined {
        id: PeerId,
        #[serde(default)]
        count: usize,
    },
    UserLeft {
        id: PeerId,
        #[serde(default)]
        count: usize,
    },
    Matched {
        partner: PeerId,
        initiator: bool,
    },
    Signal {
        sender: PeerId,
        data: SignalData,
    },
    RoomCreated {
        code: RoomCode,
    },
    RoomError {
        message: String,
    },
    #[serde(rename = "connect_error")]
    ConnectError {
        reason: String,
    },
    Disconnected {
        reason: String,
    },
}

impl InboundSignal {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

impl OutboundSignal {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
