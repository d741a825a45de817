use crate::conversation::capture::{AudioCapture, CaptureError};
use crate::conversation::conversation_event::ConversationEvent;
use crate::conversation::summarizer::{Summarizer, summarize_transcript};
use crate::session::{
    SessionConfig, SessionError, SessionEvent, SessionInput, SessionOrchestrator,
};
use crate::signaling::ChannelFactory;
use crate::transport::{LocalAudio, PeerConnector};
use echowave_core::{RoomCode, Summary};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    Idle,
    Connecting,
    Talking,
    Summarizing,
    Finished,
}

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("a conversation is already {0:?}")]
    AlreadyActive(ConversationState),

    #[error("not talking (state is {0:?})")]
    NotTalking(ConversationState),

    #[error("nothing to cancel (state is {0:?})")]
    NotConnecting(ConversationState),

    #[error("could not access microphone: {0}")]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Collaborators the controller needs for each conversation attempt.
#[derive(Clone)]
pub struct ControllerDeps {
    pub channels: ChannelFactory,
    pub connector: Arc<dyn PeerConnector>,
    pub capture: Arc<dyn AudioCapture>,
    pub summarizer: Arc<dyn Summarizer>,
}

struct ActiveSession {
    orchestrator: SessionOrchestrator,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    audio: LocalAudio,
}

/// Outer state machine of one call: Idle → Connecting → Talking →
/// Summarizing → Finished.
///
/// Owns one [`SessionOrchestrator`] per attempt and the local capture track.
pub struct ConversationController {
    config: SessionConfig,
    deps: ControllerDeps,
    room: Option<RoomCode>,
    state: ConversationState,
    session: Option<ActiveSession>,
    transcript: String,
    summary: Option<Summary>,
    last_error: Option<String>,
    events: mpsc::UnboundedSender<ConversationEvent>,
}

impl ConversationController {
    pub fn new(
        config: SessionConfig,
        deps: ControllerDeps,
        room: Option<RoomCode>,
    ) -> (Self, mpsc::UnboundedReceiver<ConversationEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();

        let controller = Self {
            config,
            deps,
            room,
            state: ConversationState::Idle,
            session: None,
            transcript: String::new(),
            summary: None,
            last_error: None,
            events,
        };

        (controller, events_rx)
    }

    /// Like [`new`](Self::new), but a controller bound to a room code starts
    /// right away. A failed start is reported through events and
    /// [`last_error`](Self::last_error).
    pub async fn open(
        config: SessionConfig,
        deps: ControllerDeps,
        room: Option<RoomCode>,
    ) -> (Self, mpsc::UnboundedReceiver<ConversationEvent>) {
        let auto_start = room.is_some();
        let (mut controller, events_rx) = Self::new(config, deps, room);

        if auto_start {
            if let Err(e) = controller.start().await {
                warn!("Auto-start failed: {}", e);
            }
        }

        (controller, events_rx)
    }

    pub fn state(&self) -> ConversationState {
        self.state
    }

    pub fn room(&self) -> Option<&RoomCode> {
        self.room.as_ref()
    }

    pub fn summary(&self) -> Option<&Summary> {
        self.summary.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn peer_count(&self) -> usize {
        self.session
            .as_ref()
            .map_or(0, |session| session.orchestrator.peer_count())
    }

    pub fn orchestrator(&self) -> Option<&SessionOrchestrator> {
        self.session.as_ref().map(|session| &session.orchestrator)
    }

    /// Feed text from an external transcription source.
    pub fn append_transcript(&mut self, text: &str) {
        if !self.transcript.is_empty() {
            self.transcript.push('\n');
        }
        self.transcript.push_str(text);
    }

    /// Acquire the microphone and join the room (or the random queue).
    pub async fn start(&mut self) -> Result<(), ControllerError> {
        match self.state {
            ConversationState::Idle | ConversationState::Finished => {}
            state => return Err(ControllerError::AlreadyActive(state)),
        }

        self.summary = None;
        self.transcript.clear();
        self.last_error = None;
        self.set_state(ConversationState::Connecting);

        let audio = match self.deps.capture.acquire().await {
            Ok(audio) => audio,
            Err(e) => {
                self.report_error(format!("Could not access microphone: {e}"));
                self.set_state(ConversationState::Idle);
                return Err(e.into());
            }
        };

        let channel = (self.deps.channels)();
        let (mut orchestrator, events) = SessionOrchestrator::new(
            channel,
            self.deps.connector.clone(),
            self.config.membership,
        );
        orchestrator.set_local_audio(audio.clone());

        if let Err(e) = orchestrator.join_room(self.room.clone()).await {
            // The orchestrator has already left; no link references the track.
            self.deps.capture.release(audio).await;
            self.report_error(e.to_string());
            self.set_state(ConversationState::Idle);
            return Err(e.into());
        }

        self.session = Some(ActiveSession {
            orchestrator,
            events,
            audio,
        });
        self.drain_session_events().await;
        Ok(())
    }

    /// Wait for the next signaling or link input of the active session.
    /// Pends forever while no session is active.
    ///
    /// Cancel safe, so it can sit in a `tokio::select!` next to user input;
    /// hand the result to [`dispatch`](Self::dispatch) outside the select.
    pub async fn next_input(&mut self) -> SessionInput {
        match self.session.as_mut() {
            Some(session) => session.orchestrator.next_input().await,
            None => std::future::pending().await,
        }
    }

    /// Apply one input and the state changes it causes.
    pub async fn dispatch(&mut self, input: SessionInput) {
        let Some(session) = self.session.as_mut() else {
            debug!("Dropping {:?}, no active session", input);
            return;
        };

        session.orchestrator.dispatch(input).await;
        self.drain_session_events().await;
    }

    /// [`next_input`](Self::next_input) followed by [`dispatch`](Self::dispatch).
    /// Not cancel safe.
    pub async fn pump(&mut self) {
        let input = self.next_input().await;
        self.dispatch(input).await;
    }

    /// Let in-flight offer/answer creation complete and apply the results.
    pub async fn settle(&mut self) {
        if let Some(session) = self.session.as_mut() {
            session.orchestrator.settle().await;
        }
        self.drain_session_events().await;
    }

    /// End the call: leave the room, stop capture, then summarize.
    pub async fn stop_talking(&mut self) -> Result<Summary, ControllerError> {
        if self.state != ConversationState::Talking {
            return Err(ControllerError::NotTalking(self.state));
        }

        self.set_state(ConversationState::Summarizing);
        self.teardown().await;

        let summary = summarize_transcript(self.deps.summarizer.as_ref(), &self.transcript).await;
        self.summary = Some(summary.clone());
        self.emit(ConversationEvent::SummaryReady(summary.clone()));
        self.set_state(ConversationState::Finished);
        Ok(summary)
    }

    /// Abandon a call that is still connecting (e.g. waiting for a partner).
    pub async fn cancel(&mut self) -> Result<(), ControllerError> {
        if self.state != ConversationState::Connecting {
            return Err(ControllerError::NotConnecting(self.state));
        }

        self.teardown().await;
        self.set_state(ConversationState::Idle);
        Ok(())
    }

    /// Return from Finished to Idle.
    pub fn restart(&mut self) {
        if self.state != ConversationState::Finished {
            debug!("restart ignored in state {:?}", self.state);
            return;
        }
        self.summary = None;
        self.transcript.clear();
        self.set_state(ConversationState::Idle);
    }

    async fn drain_session_events(&mut self) {
        let mut pending = Vec::new();
        if let Some(session) = self.session.as_mut() {
            while let Ok(event) = session.events.try_recv() {
                pending.push(event);
            }
        }

        for event in pending {
            if self.session.is_none() {
                break;
            }
            self.apply_session_event(event).await;
        }
    }

    async fn apply_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Connected { mode } => {
                if !mode.is_random() || !self.config.require_partner {
                    self.set_state(ConversationState::Talking);
                } else {
                    info!("Waiting for a partner");
                }
            }
            SessionEvent::Matched { partner, .. } => {
                debug!("Matched with {}", partner);
                if self.state == ConversationState::Connecting {
                    self.set_state(ConversationState::Talking);
                }
            }
            SessionEvent::PeerAudioReady(peer_id, audio) => {
                self.emit(ConversationEvent::PeerAudioReady { peer_id, audio });
            }
            SessionEvent::PeerCountChanged(count) => {
                self.emit(ConversationEvent::PeerCountChanged(count));
            }
            SessionEvent::RoomError(message) => {
                self.abort(format!("Room error: {message}")).await;
            }
            SessionEvent::FatalSignalingError(reason) => {
                self.abort(format!("Lost connection to signaling server: {reason}"))
                    .await;
            }
            SessionEvent::PartnerLeft(partner) => {
                info!("Partner {} left the call", partner);
                if self.state == ConversationState::Talking {
                    if let Err(e) = self.stop_talking().await {
                        warn!("Failed to end call: {}", e);
                    }
                } else {
                    self.teardown().await;
                    self.set_state(ConversationState::Idle);
                }
            }
            SessionEvent::SelfAssigned(_)
            | SessionEvent::PeerAdded(_)
            | SessionEvent::PeerRemoved(_) => {}
        }
    }

    /// Failure path: the orchestrator has already left the room.
    async fn abort(&mut self, message: String) {
        self.teardown().await;
        self.report_error(message);
        self.set_state(ConversationState::Idle);
    }

    async fn teardown(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        session.orchestrator.leave_room().await;
        // Every link is closed now, so the capture handle can be stopped.
        self.deps.capture.release(session.audio).await;
    }

    fn set_state(&mut self, state: ConversationState) {
        if self.state == state {
            return;
        }
        info!("Conversation {:?} -> {:?}", self.state, state);
        self.state = state;
        self.emit(ConversationEvent::StateChanged(state));
    }

    fn report_error(&mut self, message: String) {
        warn!("{}", message);
        self.last_error = Some(message.clone());
        self.emit(ConversationEvent::Error(message));
    }

    fn emit(&self, event: ConversationEvent) {
        let _ = self.events.send(event);
    }
}
