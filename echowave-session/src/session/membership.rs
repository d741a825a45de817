use crate::session::peer_link::Role;
use echowave_core::{InboundSignal, PeerId, RoomMode};
use std::collections::BTreeSet;

/// Membership protocol spoken by the rendezvous server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MembershipProtocol {
    /// The server pushes the full member list (`room-members`).
    Snapshot,
    /// The server pushes `user-joined`/`user-left` and `matched`.
    #[default]
    Events,
}

/// What the orchestrator knows when a membership update arrives.
pub struct MembershipView<'a> {
    pub self_id: Option<&'a PeerId>,
    pub known: &'a BTreeSet<PeerId>,
    pub mode: Option<&'a RoomMode>,
}

impl MembershipView<'_> {
    fn is_self(&self, peer_id: &PeerId) -> bool {
        self.self_id == Some(peer_id)
    }

    fn is_random(&self) -> bool {
        self.mode.is_some_and(RoomMode::is_random)
    }
}

/// Link changes derived from one membership update. Closes are applied
/// before opens.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub close: Vec<PeerId>,
    pub open: Vec<(PeerId, Role)>,
    /// The whole session ends (random-mode partner left).
    pub end_session: bool,
}

pub trait MembershipStrategy: Send {
    fn protocol(&self) -> MembershipProtocol;

    /// Returns `None` for messages this protocol does not use, or does not
    /// apply yet.
    fn reconcile(
        &mut self,
        signal: &InboundSignal,
        view: &MembershipView<'_>,
    ) -> Option<Reconciliation>;

    /// Called once the server has told us our own id.
    fn self_assigned(&mut self, _view: &MembershipView<'_>) -> Option<Reconciliation> {
        None
    }

    /// Forget anything held for the session being left.
    fn reset(&mut self) {}
}

pub fn strategy_for(protocol: MembershipProtocol) -> Box<dyn MembershipStrategy> {
    match protocol {
        MembershipProtocol::Snapshot => Box::new(SnapshotMembership::default()),
        MembershipProtocol::Events => Box::new(EventMembership),
    }
}

/// Treats every `room-members` list as authoritative.
///
/// The list includes ourselves, so nothing is applied before our own id is
/// known: the latest list is held and reconciled on `welcome`.
#[derive(Default)]
pub struct SnapshotMembership {
    deferred: Option<Vec<PeerId>>,
}

impl SnapshotMembership {
    fn diff(members: &[PeerId], view: &MembershipView<'_>) -> Reconciliation {
        let target: BTreeSet<PeerId> = members
            .iter()
            .filter(|id| !view.is_self(id))
            .cloned()
            .collect();

        Reconciliation {
            close: view.known.difference(&target).cloned().collect(),
            open: target
                .difference(view.known)
                .map(|id| (id.clone(), Role::Initiator))
                .collect(),
            end_session: false,
        }
    }
}

impl MembershipStrategy for SnapshotMembership {
    fn protocol(&self) -> MembershipProtocol {
        MembershipProtocol::Snapshot
    }

    fn reconcile(
        &mut self,
        signal: &InboundSignal,
        view: &MembershipView<'_>,
    ) -> Option<Reconciliation> {
        let InboundSignal::RoomMembers { members } = signal else {
            return None;
        };

        if view.self_id.is_none() {
            self.deferred = Some(members.clone());
            return None;
        }
        Some(Self::diff(members, view))
    }

    fn self_assigned(&mut self, view: &MembershipView<'_>) -> Option<Reconciliation> {
        let members = self.deferred.take()?;
        Some(Self::diff(&members, view))
    }

    fn reset(&mut self) {
        self.deferred = None;
    }
}

/// Incremental join/leave events plus server-decided 1:1 pairing.
pub struct EventMembership;

impl MembershipStrategy for EventMembership {
    fn protocol(&self) -> MembershipProtocol {
        MembershipProtocol::Events
    }

    fn reconcile(
        &mut self,
        signal: &InboundSignal,
        view: &MembershipView<'_>,
    ) -> Option<Reconciliation> {
        let mut plan = Reconciliation::default();

        match signal {
            InboundSignal::UserJoined { id, .. } => {
                // Ids are never reused, so a repeated join for a live peer is noise.
                if !view.is_self(id) && !view.known.contains(id) {
                    plan.open.push((id.clone(), Role::Initiator));
                }
            }
            InboundSignal::UserLeft { id, .. } => {
                if view.known.contains(id) {
                    plan.close.push(id.clone());
                    plan.end_session = view.is_random();
                }
            }
            InboundSignal::Matched { partner, initiator } => {
                // Exactly one link in random mode: drop anything else first.
                plan.close.extend(view.known.iter().cloned());
                let role = if *initiator {
                    Role::Initiator
                } else {
                    Role::Responder
                };
                plan.open.push((partner.clone(), role));
            }
            _ => return None,
        }

        Some(plan)
    }
}
