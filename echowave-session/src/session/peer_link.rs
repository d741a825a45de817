use crate::transport::{
    LinkEventKind, LinkEventSink, LinkTag, LocalAudio, MediaConnection, TransportState,
};
use anyhow::{Result, bail};
use echowave_core::{IceCandidate, PeerId, SdpKind, SessionDescription};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, warn};

/// Which side of the pair creates the offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Initiator,
    Responder,
}

/// Negotiation state of a [`PeerLink`].
///
/// `Connected` means the offer/answer exchange is complete; whether the media
/// transport is actually up is tracked separately by
/// [`PeerLink::is_transport_connected`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    New,
    HaveLocalOffer,
    HaveRemoteOffer,
    Connected,
    Closed,
    Failed,
}

impl LinkState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateOutcome {
    Applied,
    Queued,
}

/// One negotiated media connection to one remote participant.
pub struct PeerLink {
    role: Role,
    state: LinkState,
    sink: LinkEventSink,
    connection: Arc<dyn MediaConnection>,
    /// Remote candidates received before both descriptions were set.
    pending_candidates: VecDeque<IceCandidate>,
    /// Local candidates gathered before our description was sent.
    outbound_candidates: Vec<IceCandidate>,
    local_description_set: bool,
    remote_description_set: bool,
    transport_connected: bool,
    remote_audio_available: bool,
}

impl PeerLink {
    pub fn new(role: Role, sink: LinkEventSink, connection: Arc<dyn MediaConnection>) -> Self {
        Self {
            role,
            state: LinkState::New,
            sink,
            connection,
            pending_candidates: VecDeque::new(),
            outbound_candidates: Vec::new(),
            local_description_set: false,
            remote_description_set: false,
            transport_connected: false,
            remote_audio_available: false,
        }
    }

    pub fn peer_id(&self) -> &PeerId {
        self.sink.peer_id()
    }

    pub fn tag(&self) -> LinkTag {
        self.sink.tag()
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn pending_candidates(&self) -> usize {
        self.pending_candidates.len()
    }

    pub fn has_local_description(&self) -> bool {
        self.local_description_set
    }

    pub fn has_remote_description(&self) -> bool {
        self.remote_description_set
    }

    pub fn is_transport_connected(&self) -> bool {
        self.transport_connected
    }

    pub fn remote_audio_available(&self) -> bool {
        self.remote_audio_available
    }

    pub async fn attach_local_track(&self, track: LocalAudio) -> Result<()> {
        self.connection.add_local_track(track).await
    }

    /// Start offer creation. Completion arrives as [`LinkEventKind::OfferCreated`].
    pub fn create_offer(&mut self) -> Result<()> {
        if self.role != Role::Initiator || self.state != LinkState::New {
            bail!(
                "cannot create offer as {:?} in state {:?}",
                self.role,
                self.state
            );
        }

        let connection = self.connection.clone();
        let sink = self.sink.clone();
        tokio::spawn(async move {
            let result = connection
                .create_offer()
                .await
                .map_err(|e| format!("{e:#}"));
            sink.emit(LinkEventKind::OfferCreated(result));
        });
        Ok(())
    }

    /// Start answer creation. Completion arrives as [`LinkEventKind::AnswerCreated`].
    pub fn create_answer(&mut self) -> Result<()> {
        if self.state != LinkState::HaveRemoteOffer {
            bail!("cannot create answer in state {:?}", self.state);
        }

        let connection = self.connection.clone();
        let sink = self.sink.clone();
        tokio::spawn(async move {
            let result = connection
                .create_answer()
                .await
                .map_err(|e| format!("{e:#}"));
            sink.emit(LinkEventKind::AnswerCreated(result));
        });
        Ok(())
    }

    /// Record that our offer is installed locally. Returns local candidates
    /// held back until the offer went out.
    pub fn offer_created(&mut self) -> Vec<IceCandidate> {
        if self.state == LinkState::New {
            self.state = LinkState::HaveLocalOffer;
        }
        self.local_description_set = true;
        std::mem::take(&mut self.outbound_candidates)
    }

    /// Record that our answer is installed locally and replay queued remote
    /// candidates. Returns local candidates held back until the answer went out.
    pub async fn answer_created(&mut self) -> Result<Vec<IceCandidate>> {
        if self.state == LinkState::HaveRemoteOffer {
            self.state = LinkState::Connected;
        }
        self.local_description_set = true;
        self.flush_candidates().await?;
        Ok(std::mem::take(&mut self.outbound_candidates))
    }

    pub async fn set_remote_description(&mut self, desc: SessionDescription) -> Result<()> {
        match (desc.kind, self.role, self.state) {
            (SdpKind::Offer, Role::Responder, LinkState::New) => {
                self.connection.set_remote_description(desc).await?;
                self.remote_description_set = true;
                self.state = LinkState::HaveRemoteOffer;
            }
            (SdpKind::Answer, Role::Initiator, LinkState::HaveLocalOffer) => {
                self.connection.set_remote_description(desc).await?;
                self.remote_description_set = true;
                self.state = LinkState::Connected;
            }
            (kind, role, state) => {
                bail!("unexpected remote {:?} for {:?} in state {:?}", kind, role, state)
            }
        }

        self.flush_candidates().await?;
        Ok(())
    }

    /// Apply a remote candidate, or queue it until both descriptions are set.
    pub async fn add_candidate(&mut self, candidate: IceCandidate) -> Result<CandidateOutcome> {
        if self.state.is_terminal() {
            bail!("link is {:?}", self.state);
        }

        if self.local_description_set && self.remote_description_set {
            self.connection.add_ice_candidate(candidate).await?;
            return Ok(CandidateOutcome::Applied);
        }

        self.pending_candidates.push_back(candidate);
        Ok(CandidateOutcome::Queued)
    }

    /// Buffer candidates that arrived before this link existed. They keep
    /// their receipt order ahead of anything received later.
    pub fn adopt_candidates(&mut self, candidates: Vec<IceCandidate>) {
        for candidate in candidates.into_iter().rev() {
            self.pending_candidates.push_front(candidate);
        }
    }

    /// Hold back a local candidate until our description has been sent.
    /// Returns the candidate when it can go out immediately.
    pub fn outbound_candidate(&mut self, candidate: IceCandidate) -> Option<IceCandidate> {
        if self.local_description_set {
            return Some(candidate);
        }
        self.outbound_candidates.push(candidate);
        None
    }

    /// Replay queued remote candidates in receipt order once both
    /// descriptions are set. Each candidate is applied exactly once.
    pub async fn flush_candidates(&mut self) -> Result<usize> {
        if !(self.local_description_set && self.remote_description_set) {
            return Ok(0);
        }

        let mut applied = 0;
        while let Some(candidate) = self.pending_candidates.pop_front() {
            self.connection.add_ice_candidate(candidate).await?;
            applied += 1;
        }

        if applied > 0 {
            debug!("Flushed {} queued candidates for {}", applied, self.peer_id());
        }
        Ok(applied)
    }

    pub fn mark_transport(&mut self, state: TransportState) {
        match state {
            TransportState::Connected => self.transport_connected = true,
            TransportState::Disconnected => self.transport_connected = false,
            s if s.is_lost() => {
                self.transport_connected = false;
                if !self.state.is_terminal() {
                    self.state = LinkState::Failed;
                }
            }
            _ => {}
        }
    }

    pub fn mark_remote_audio(&mut self) {
        self.remote_audio_available = true;
    }

    /// Release the connection. Calling it again is a no-op.
    pub async fn close(&mut self) {
        if self.state == LinkState::Closed {
            return;
        }

        self.state = LinkState::Closed;
        self.transport_connected = false;
        self.pending_candidates.clear();
        self.outbound_candidates.clear();

        if let Err(e) = self.connection.close().await {
            warn!("Failed to close connection to {}: {:?}", self.peer_id(), e);
        }
    }
}
