use echowave_core::PeerId;
use echowave_session::{LinkState, MembershipProtocol, SessionEvent, SessionPhase};

use crate::utils::{
    MALFORMED, SessionHarness, answer_from, candidate_from, members, offer_from,
};

async fn room_with_two_peers() -> SessionHarness {
    let mut h = SessionHarness::joined(MembershipProtocol::Snapshot, Some("r1"), Some("me")).await;
    h.deliver(members(&["me", "a", "b"])).await;
    h.drain_events();
    h
}

#[tokio::test]
async fn test_malformed_answer_drops_only_that_peer() {
    let mut h = room_with_two_peers().await;

    h.deliver(answer_from("a", &format!("{MALFORMED}-sdp"))).await;

    assert_eq!(h.orchestrator.peer_ids(), vec![PeerId::from("b")]);
    assert_eq!(
        h.orchestrator.link(&PeerId::from("b")).unwrap().state(),
        LinkState::HaveLocalOffer
    );
    assert_eq!(h.orchestrator.phase(), SessionPhase::Joined);
    assert!(h.connector.connection_for("a").await.is_closed());

    let events = h.drain_events();
    assert!(matches!(&events[0], SessionEvent::PeerRemoved(id) if id.as_str() == "a"));
}

#[tokio::test]
async fn test_malformed_candidate_drops_only_that_peer() {
    let mut h = room_with_two_peers().await;
    h.deliver(answer_from("a", "answer-from-a")).await;
    h.deliver(answer_from("b", "answer-from-b")).await;

    h.deliver(candidate_from("a", MALFORMED)).await;
    h.deliver(candidate_from("b", "fine")).await;

    assert_eq!(h.orchestrator.peer_ids(), vec![PeerId::from("b")]);
    assert_eq!(
        h.connector.connection_for("b").await.applied_candidates().await,
        vec!["candidate:fine"]
    );
}

#[tokio::test]
async fn test_unexpected_answer_is_ignored() {
    let mut h = room_with_two_peers().await;
    h.deliver(answer_from("a", "answer-from-a")).await;

    h.deliver(answer_from("a", "second-answer")).await;
    h.deliver(answer_from("stranger", "answer")).await;

    let a = PeerId::from("a");
    assert_eq!(h.orchestrator.link(&a).unwrap().state(), LinkState::Connected);
    assert_eq!(
        h.connector.connection_for("a").await.remote_descriptions().await.len(),
        1
    );
    assert_eq!(h.orchestrator.peer_count(), 2);
}

#[tokio::test]
async fn test_malformed_offer_drops_only_that_peer() {
    let mut h = room_with_two_peers().await;

    h.deliver(offer_from("c", &format!("{MALFORMED}-sdp"))).await;

    assert_eq!(
        h.orchestrator.peer_ids(),
        vec![PeerId::from("a"), PeerId::from("b")]
    );
    assert!(h.connector.connection_for("c").await.is_closed());
    assert_eq!(h.signaling.answers_to("c").await, 0);
    for id in ["a", "b"] {
        assert_eq!(
            h.orchestrator.link(&PeerId::from(id)).unwrap().state(),
            LinkState::HaveLocalOffer
        );
        assert!(!h.connector.connection_for(id).await.is_closed());
    }

    let events = h.drain_events();
    assert!(
        events
            .iter()
            .any(|e| matches!(e, SessionEvent::PeerRemoved(id) if id.as_str() == "c"))
    );
}

#[tokio::test]
async fn test_malformed_queued_candidate_drops_only_that_peer() {
    let mut h = SessionHarness::joined(MembershipProtocol::Events, Some("r1"), Some("me")).await;
    h.deliver(offer_from("b", "offer-from-b")).await;

    // Arrives before any link to c exists and is replayed once our answer is out.
    h.deliver(candidate_from("c", MALFORMED)).await;
    h.deliver(offer_from("c", "offer-from-c")).await;

    assert_eq!(h.signaling.answers_to("c").await, 1);
    assert_eq!(h.orchestrator.peer_ids(), vec![PeerId::from("b")]);
    assert!(h.connector.connection_for("c").await.is_closed());

    let b = h.orchestrator.link(&PeerId::from("b")).unwrap();
    assert_eq!(b.state(), LinkState::Connected);
    assert!(!h.connector.connection_for("b").await.is_closed());
    h.deliver(candidate_from("b", "fine")).await;
    assert_eq!(
        h.connector.connection_for("b").await.applied_candidates().await,
        vec!["candidate:fine"]
    );
    assert_eq!(h.orchestrator.phase(), SessionPhase::Joined);
}
