use crate::session::error::SessionError;
use crate::session::membership::{
    MembershipProtocol, MembershipStrategy, MembershipView, Reconciliation, strategy_for,
};
use crate::session::peer_link::{CandidateOutcome, LinkState, PeerLink, Role};
use crate::session::session_event::SessionEvent;
use crate::signaling::SignalChannel;
use crate::transport::{
    LinkEvent, LinkEventKind, LinkEventSink, LinkTag, LocalAudio, PeerConnector,
};
use echowave_core::{
    IceCandidate, InboundSignal, OutboundSignal, PeerId, RoomCode, RoomMode, SessionDescription,
    SignalData,
};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

const CREATE_ROOM_TIMEOUT: Duration = Duration::from_secs(10);

/// One unit of work for [`SessionOrchestrator::dispatch`].
#[derive(Debug)]
pub enum SessionInput {
    Signal(InboundSignal),
    Link(LinkEvent),
    /// The inbound receiver was closed by the channel.
    ChannelClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Detached,
    Joining,
    Joined,
}

/// Owns every [`PeerLink`] of the current room and drives the
/// join/offer/answer/candidate protocol.
///
/// All inputs are handled serially through `&mut self`: inbound signals,
/// link events and the public operations. Offer and answer creation run in
/// spawned tasks and come back as link events stamped with a [`LinkTag`];
/// anything stamped with an old epoch or a replaced link is discarded.
pub struct SessionOrchestrator {
    channel: Box<dyn SignalChannel>,
    connector: Arc<dyn PeerConnector>,
    membership: Box<dyn MembershipStrategy>,
    links: HashMap<PeerId, PeerLink>,
    /// Candidates that arrived before any link for their sender existed.
    orphan_candidates: HashMap<PeerId, Vec<IceCandidate>>,
    local_audio: Option<LocalAudio>,
    phase: SessionPhase,
    mode: Option<RoomMode>,
    self_id: Option<PeerId>,
    epoch: u64,
    next_serial: u64,
    negotiations_in_flight: usize,
    inbound: Option<mpsc::Receiver<InboundSignal>>,
    link_tx: mpsc::UnboundedSender<LinkEvent>,
    link_rx: mpsc::UnboundedReceiver<LinkEvent>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl SessionOrchestrator {
    pub fn new(
        channel: Box<dyn SignalChannel>,
        connector: Arc<dyn PeerConnector>,
        protocol: MembershipProtocol,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (link_tx, link_rx) = mpsc::unbounded_channel();
        let (events, events_rx) = mpsc::unbounded_channel();

        let orchestrator = Self {
            channel,
            connector,
            membership: strategy_for(protocol),
            links: HashMap::new(),
            orphan_candidates: HashMap::new(),
            local_audio: None,
            phase: SessionPhase::Detached,
            mode: None,
            self_id: None,
            epoch: 0,
            next_serial: 0,
            negotiations_in_flight: 0,
            inbound: None,
            link_tx,
            link_rx,
            events,
        };

        (orchestrator, events_rx)
    }

    pub fn protocol(&self) -> MembershipProtocol {
        self.membership.protocol()
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn mode(&self) -> Option<&RoomMode> {
        self.mode.as_ref()
    }

    pub fn self_id(&self) -> Option<&PeerId> {
        self.self_id.as_ref()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn peer_count(&self) -> usize {
        self.links.len()
    }

    pub fn peer_ids(&self) -> Vec<PeerId> {
        let mut ids: Vec<PeerId> = self.links.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn link(&self, peer_id: &PeerId) -> Option<&PeerLink> {
        self.links.get(peer_id)
    }

    /// Track attached to every link created from now on.
    pub fn set_local_audio(&mut self, track: LocalAudio) {
        self.local_audio = Some(track);
    }

    /// Connect to the rendezvous server and join a room, or the random
    /// queue when `code` is `None`.
    ///
    /// A call while a session is already joining or joined is a no-op. On a
    /// connection failure the session is fully left before the error is
    /// returned.
    pub async fn join_room(&mut self, code: Option<RoomCode>) -> Result<(), SessionError> {
        if self.phase != SessionPhase::Detached {
            debug!("join_room ignored, session is {:?}", self.phase);
            return Ok(());
        }

        self.epoch += 1;
        self.phase = SessionPhase::Joining;
        let mode = RoomMode::from_code(code);
        info!("Joining {:?} (epoch {})", mode, self.epoch);

        match self.channel.connect().await {
            Ok(inbound) => self.inbound = Some(inbound),
            Err(e) => {
                self.fail_signaling(e.to_string()).await;
                return Err(e.into());
            }
        }

        let join = match &mode {
            RoomMode::Room(code) => OutboundSignal::JoinRoom { code: code.clone() },
            RoomMode::Random => OutboundSignal::JoinRandom,
        };
        if let Err(e) = self.channel.emit(join).await {
            self.fail_signaling(e.to_string()).await;
            return Err(e.into());
        }

        self.mode = Some(mode.clone());
        self.phase = SessionPhase::Joined;
        self.notify(SessionEvent::Connected { mode });
        Ok(())
    }

    /// Ask the server for a fresh room code on a short-lived connection.
    pub async fn create_room(&mut self) -> Result<RoomCode, SessionError> {
        if self.phase != SessionPhase::Detached {
            self.leave_room().await;
        }

        let mut inbound = self.channel.connect().await?;
        let result = match self.channel.emit(OutboundSignal::CreateRoom).await {
            Ok(()) => {
                tokio::time::timeout(CREATE_ROOM_TIMEOUT, async {
                    while let Some(signal) = inbound.recv().await {
                        match signal {
                            InboundSignal::RoomCreated { code } => return Ok(code),
                            InboundSignal::RoomError { message } => {
                                return Err(SessionError::Room(message));
                            }
                            InboundSignal::ConnectError { reason }
                            | InboundSignal::Disconnected { reason } => {
                                return Err(SessionError::Closed(reason));
                            }
                            other => debug!("Ignoring {:?} while creating a room", other),
                        }
                    }
                    Err(SessionError::Closed("channel closed".to_owned()))
                })
                .await
                .unwrap_or(Err(SessionError::Timeout))
            }
            Err(e) => Err(e.into()),
        };

        self.channel.disconnect().await;
        if let Ok(code) = &result {
            info!("Room created with code {}", code);
        }
        result
    }

    /// Close every link, drop the signaling channel and forget the room.
    /// Safe to call any number of times.
    pub async fn leave_room(&mut self) {
        let was_attached = self.phase != SessionPhase::Detached;
        let had_peers = !self.links.is_empty();

        // Anything still in flight belongs to the session being left.
        self.epoch += 1;

        let links: Vec<(PeerId, PeerLink)> = self.links.drain().collect();
        for (peer_id, mut link) in links {
            link.close().await;
            self.notify(SessionEvent::PeerRemoved(peer_id));
        }
        self.orphan_candidates.clear();
        self.membership.reset();

        self.inbound = None;
        self.channel.disconnect().await;
        self.mode = None;
        self.self_id = None;
        self.phase = SessionPhase::Detached;

        if had_peers {
            self.notify(SessionEvent::PeerCountChanged(0));
        }
        if was_attached {
            info!("Left session (epoch now {})", self.epoch);
        }
    }

    /// Wait for the next inbound signal or link event.
    ///
    /// Cancel safe: nothing is consumed unless this returns, so it can race
    /// other branches in `tokio::select!`. Inbound signals are served first
    /// when both are ready.
    pub async fn next_input(&mut self) -> SessionInput {
        tokio::select! {
            biased;

            signal = next_inbound(&mut self.inbound) => match signal {
                Some(signal) => SessionInput::Signal(signal),
                None => SessionInput::ChannelClosed,
            },
            Some(event) = self.link_rx.recv() => SessionInput::Link(event),
        }
    }

    /// Apply one input taken from [`next_input`](Self::next_input).
    ///
    /// Must run to completion: dropping it midway can lose the input or
    /// leave links half closed.
    pub async fn dispatch(&mut self, input: SessionInput) {
        match input {
            SessionInput::Signal(signal) => self.handle_signal_event(signal).await,
            SessionInput::Link(event) => self.handle_link_event(event).await,
            SessionInput::ChannelClosed => {
                self.inbound = None;
                self.handle_signal_event(InboundSignal::Disconnected {
                    reason: "signaling channel closed".to_owned(),
                })
                .await;
            }
        }
    }

    /// [`next_input`](Self::next_input) followed by [`dispatch`](Self::dispatch).
    /// Not cancel safe.
    pub async fn pump(&mut self) {
        let input = self.next_input().await;
        self.dispatch(input).await;
    }

    /// Process link events until no offer or answer creation is pending,
    /// then drain whatever else is already queued.
    pub async fn settle(&mut self) {
        while self.negotiations_in_flight > 0 {
            match self.link_rx.recv().await {
                Some(event) => self.handle_link_event(event).await,
                None => break,
            }
        }
        while let Ok(event) = self.link_rx.try_recv() {
            self.handle_link_event(event).await;
        }
    }

    pub async fn handle_signal_event(&mut self, signal: InboundSignal) {
        if self.phase == SessionPhase::Detached {
            debug!("Dropping {:?} received while detached", signal);
            return;
        }

        match signal {
            InboundSignal::Welcome { id } => {
                info!("Assigned peer id {}", id);
                // A link keyed by our own id can only come from membership
                // received before we knew who we are.
                self.remove_peer(&id).await;
                self.self_id = Some(id.clone());
                self.notify(SessionEvent::SelfAssigned(id));

                let known: BTreeSet<PeerId> = self.links.keys().cloned().collect();
                let view = MembershipView {
                    self_id: self.self_id.as_ref(),
                    known: &known,
                    mode: self.mode.as_ref(),
                };
                if let Some(plan) = self.membership.self_assigned(&view) {
                    self.apply_reconciliation(plan).await;
                }
            }
            InboundSignal::Signal { sender, data } => self.handle_negotiation(sender, data).await,
            InboundSignal::RoomError { message } => {
                warn!("Room error from server: {}", message);
                self.notify(SessionEvent::RoomError(message));
                self.leave_room().await;
            }
            InboundSignal::ConnectError { reason } | InboundSignal::Disconnected { reason } => {
                self.fail_signaling(reason).await;
            }
            InboundSignal::RoomCreated { code } => {
                debug!("Unexpected room-created {} during a session", code);
            }
            membership => self.apply_membership(membership).await,
        }
    }

    pub async fn handle_link_event(&mut self, event: LinkEvent) {
        let LinkEvent {
            tag,
            peer_id,
            kind,
        } = event;

        if matches!(
            kind,
            LinkEventKind::OfferCreated(_) | LinkEventKind::AnswerCreated(_)
        ) {
            self.negotiations_in_flight = self.negotiations_in_flight.saturating_sub(1);
        }

        if !self.is_live(&peer_id, tag) {
            debug!("Discarding stale {:?} for {} ({:?})", kind, peer_id, tag);
            return;
        }

        match kind {
            LinkEventKind::CandidateGenerated(candidate) => {
                let Some(link) = self.links.get_mut(&peer_id) else {
                    return;
                };
                if let Some(candidate) = link.outbound_candidate(candidate) {
                    self.send_signal(peer_id, SignalData::Candidate { candidate })
                        .await;
                }
            }

            LinkEventKind::StateChanged(state) => {
                let Some(link) = self.links.get_mut(&peer_id) else {
                    return;
                };
                link.mark_transport(state);
                if state.is_lost() {
                    warn!("Transport to {} lost ({:?})", peer_id, state);
                    self.peer_lost(&peer_id).await;
                }
            }

            LinkEventKind::TrackReceived(audio) => {
                let Some(link) = self.links.get_mut(&peer_id) else {
                    return;
                };
                link.mark_remote_audio();
                info!("Remote audio available from {}", peer_id);
                self.notify(SessionEvent::PeerAudioReady(peer_id, audio));
            }

            LinkEventKind::OfferCreated(Ok(desc)) => {
                let Some(link) = self.links.get_mut(&peer_id) else {
                    return;
                };
                let held = link.offer_created();
                debug!("Sending offer to {}", peer_id);
                self.send_signal(peer_id.clone(), desc.into()).await;
                self.send_candidates(&peer_id, held).await;
            }

            LinkEventKind::AnswerCreated(Ok(desc)) => {
                debug!("Sending answer to {}", peer_id);
                self.send_signal(peer_id.clone(), desc.into()).await;

                let Some(link) = self.links.get_mut(&peer_id) else {
                    return;
                };
                match link.answer_created().await {
                    Ok(held) => self.send_candidates(&peer_id, held).await,
                    Err(e) => {
                        warn!("Queued candidate rejected by {}: {:#}", peer_id, e);
                        self.remove_peer(&peer_id).await;
                    }
                }
            }

            LinkEventKind::OfferCreated(Err(e)) | LinkEventKind::AnswerCreated(Err(e)) => {
                error!("Negotiation with {} failed: {}", peer_id, e);
                self.remove_peer(&peer_id).await;
            }
        }
    }

    async fn apply_membership(&mut self, signal: InboundSignal) {
        if let InboundSignal::Matched { partner, initiator } = &signal {
            info!("Matched with {} (initiator: {})", partner, initiator);
            self.notify(SessionEvent::Matched {
                partner: partner.clone(),
                initiator: *initiator,
            });
        }

        let known: BTreeSet<PeerId> = self.links.keys().cloned().collect();
        let view = MembershipView {
            self_id: self.self_id.as_ref(),
            known: &known,
            mode: self.mode.as_ref(),
        };
        let Some(plan) = self.membership.reconcile(&signal, &view) else {
            debug!(
                "{:?} not applied by the {:?} protocol",
                signal,
                self.membership.protocol()
            );
            return;
        };

        self.apply_reconciliation(plan).await;
    }

    async fn apply_reconciliation(&mut self, plan: Reconciliation) {
        for peer_id in &plan.close {
            self.remove_peer(peer_id).await;
        }

        if plan.end_session {
            if let Some(partner) = plan.close.into_iter().next() {
                info!("Partner {} left, ending session", partner);
                self.notify(SessionEvent::PartnerLeft(partner));
            }
            self.leave_room().await;
            return;
        }

        for (peer_id, role) in plan.open {
            self.open_link(peer_id, role).await;
        }
    }

    async fn handle_negotiation(&mut self, sender: PeerId, data: SignalData) {
        if self.self_id.as_ref() == Some(&sender) {
            debug!("Ignoring {} echoed from ourselves", data.kind());
            return;
        }

        match data {
            SignalData::Offer { sdp } => self.handle_offer(sender, sdp).await,

            SignalData::Answer { sdp } => {
                let Some(link) = self.links.get_mut(&sender) else {
                    warn!("Answer from unknown peer {}", sender);
                    return;
                };
                if link.role() != Role::Initiator || link.state() != LinkState::HaveLocalOffer {
                    warn!(
                        "Ignoring answer from {}: {:?} link in state {:?}",
                        sender,
                        link.role(),
                        link.state()
                    );
                    return;
                }
                if let Err(e) = link
                    .set_remote_description(SessionDescription::answer(sdp))
                    .await
                {
                    warn!("Bad answer from {}: {:#}", sender, e);
                    self.remove_peer(&sender).await;
                }
            }

            SignalData::Candidate { candidate } => {
                let Some(link) = self.links.get_mut(&sender) else {
                    debug!("Buffering candidate from not-yet-known {}", sender);
                    self.orphan_candidates
                        .entry(sender)
                        .or_default()
                        .push(candidate);
                    return;
                };
                match link.add_candidate(candidate).await {
                    Ok(CandidateOutcome::Applied) => debug!("Applied candidate from {}", sender),
                    Ok(CandidateOutcome::Queued) => debug!("Queued candidate from {}", sender),
                    Err(e) => {
                        warn!("Bad candidate from {}: {:#}", sender, e);
                        self.remove_peer(&sender).await;
                    }
                }
            }
        }
    }

    async fn handle_offer(&mut self, sender: PeerId, sdp: String) {
        let needs_link = match self.links.get(&sender) {
            None => true,
            Some(link) if link.role() == Role::Responder && link.state() == LinkState::New => {
                false
            }
            Some(link)
                if link.role() == Role::Initiator
                    && matches!(link.state(), LinkState::New | LinkState::HaveLocalOffer) =>
            {
                if !self.yields_to(&sender) {
                    info!("Offer collision with {}, keeping our offer", sender);
                    return;
                }
                info!("Offer collision with {}, answering theirs", sender);
                true
            }
            Some(_) => true,
        };

        if needs_link && !self.open_link(sender.clone(), Role::Responder).await {
            return;
        }

        let Some(link) = self.links.get_mut(&sender) else {
            return;
        };
        let result = match link
            .set_remote_description(SessionDescription::offer(sdp))
            .await
        {
            Ok(()) => link.create_answer(),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => self.negotiations_in_flight += 1,
            Err(e) => {
                warn!("Bad offer from {}: {:#}", sender, e);
                self.remove_peer(&sender).await;
            }
        }
    }

    /// Polite side of an offer collision: the greater id gives way.
    fn yields_to(&self, other: &PeerId) -> bool {
        self.self_id.as_ref().is_none_or(|me| me > other)
    }

    /// Create a link for `peer_id`, replacing any existing one.
    async fn open_link(&mut self, peer_id: PeerId, role: Role) -> bool {
        if self.links.contains_key(&peer_id) {
            self.remove_peer(&peer_id).await;
        }

        self.next_serial += 1;
        let tag = LinkTag {
            epoch: self.epoch,
            serial: self.next_serial,
        };
        let sink = LinkEventSink::new(tag, peer_id.clone(), self.link_tx.clone());

        let connection = match self.connector.connect(sink.clone()).await {
            Ok(connection) => connection,
            Err(e) => {
                error!("Failed to create connection for {}: {:#}", peer_id, e);
                return false;
            }
        };

        let mut link = PeerLink::new(role, sink, connection);

        if let Some(track) = &self.local_audio {
            if let Err(e) = link.attach_local_track(track.clone()).await {
                error!("Failed to attach local audio for {}: {:#}", peer_id, e);
                link.close().await;
                return false;
            }
        }

        if let Some(early) = self.orphan_candidates.remove(&peer_id) {
            link.adopt_candidates(early);
        }

        if role == Role::Initiator {
            if let Err(e) = link.create_offer() {
                error!("Failed to start offer for {}: {:#}", peer_id, e);
                link.close().await;
                return false;
            }
            self.negotiations_in_flight += 1;
        }

        info!("Opened {:?} link to {}", role, peer_id);
        self.links.insert(peer_id.clone(), link);
        self.notify(SessionEvent::PeerAdded(peer_id));
        self.notify(SessionEvent::PeerCountChanged(self.links.len()));
        true
    }

    async fn remove_peer(&mut self, peer_id: &PeerId) -> bool {
        self.orphan_candidates.remove(peer_id);

        let Some(mut link) = self.links.remove(peer_id) else {
            return false;
        };
        link.close().await;

        info!("Removed link to {}", peer_id);
        self.notify(SessionEvent::PeerRemoved(peer_id.clone()));
        self.notify(SessionEvent::PeerCountChanged(self.links.len()));
        true
    }

    /// A link's transport failed: same bookkeeping as the peer leaving.
    async fn peer_lost(&mut self, peer_id: &PeerId) {
        self.remove_peer(peer_id).await;

        if self.mode.as_ref().is_some_and(RoomMode::is_random) {
            info!("Partner {} lost, ending session", peer_id);
            self.notify(SessionEvent::PartnerLeft(peer_id.clone()));
            self.leave_room().await;
        }
    }

    async fn fail_signaling(&mut self, reason: String) {
        error!("Signaling failure: {}", reason);
        self.notify(SessionEvent::FatalSignalingError(reason));
        self.leave_room().await;
    }

    fn is_live(&self, peer_id: &PeerId, tag: LinkTag) -> bool {
        tag.epoch == self.epoch
            && self
                .links
                .get(peer_id)
                .is_some_and(|link| link.tag() == tag)
    }

    async fn send_signal(&mut self, target: PeerId, data: SignalData) {
        let kind = data.kind();
        if let Err(e) = self
            .channel
            .emit(OutboundSignal::Signal { target, data })
            .await
        {
            warn!("Failed to send {}: {}", kind, e);
        }
    }

    async fn send_candidates(&mut self, peer_id: &PeerId, candidates: Vec<IceCandidate>) {
        for candidate in candidates {
            self.send_signal(peer_id.clone(), SignalData::Candidate { candidate })
                .await;
        }
    }

    fn notify(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }
}

async fn next_inbound(inbound: &mut Option<mpsc::Receiver<InboundSignal>>) -> Option<InboundSignal> {
    match inbound {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
