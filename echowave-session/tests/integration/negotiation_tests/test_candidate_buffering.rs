use echowave_core::{InboundSignal, PeerId};
use echowave_session::MembershipProtocol;

use crate::utils::{SessionHarness, answer_from, candidate_from, offer_from};

#[tokio::test]
async fn test_early_candidates_replayed_in_order() {
    let mut h = SessionHarness::joined(MembershipProtocol::Events, Some("r1"), Some("me")).await;
    h.deliver(InboundSignal::UserJoined {
        id: PeerId::from("a"),
        count: 2,
    })
    .await;

    h.deliver(candidate_from("a", "c1")).await;
    h.deliver(candidate_from("a", "c2")).await;

    let a = PeerId::from("a");
    let connection = h.connector.connection_for("a").await;
    assert!(connection.applied_candidates().await.is_empty());
    assert_eq!(h.orchestrator.link(&a).unwrap().pending_candidates(), 2);

    h.deliver(answer_from("a", "answer-from-a")).await;
    h.deliver(candidate_from("a", "c3")).await;

    assert_eq!(
        connection.applied_candidates().await,
        vec!["candidate:c1", "candidate:c2", "candidate:c3"]
    );
    assert_eq!(h.orchestrator.link(&a).unwrap().pending_candidates(), 0);
}

#[tokio::test]
async fn test_orphan_candidates_adopted_by_new_link() {
    let mut h = SessionHarness::joined(MembershipProtocol::Events, Some("r1"), Some("me")).await;

    h.deliver(candidate_from("a", "o1")).await;
    h.deliver(candidate_from("a", "o2")).await;
    assert_eq!(h.orchestrator.peer_count(), 0);

    h.deliver(offer_from("a", "offer-from-a")).await;
    h.deliver(candidate_from("a", "c3")).await;

    assert_eq!(
        h.connector.connection_for("a").await.applied_candidates().await,
        vec!["candidate:o1", "candidate:o2", "candidate:c3"]
    );
}

#[tokio::test]
async fn test_orphans_forgotten_on_leave() {
    let mut h = SessionHarness::joined(MembershipProtocol::Events, Some("r1"), Some("me")).await;
    h.deliver(candidate_from("a", "old")).await;

    h.orchestrator.leave_room().await;
    h.orchestrator
        .join_room(Some("r1".into()))
        .await
        .unwrap();
    h.deliver(offer_from("a", "offer-from-a")).await;

    assert!(
        h.connector
            .connection_for("a")
            .await
            .applied_candidates()
            .await
            .is_empty()
    );
}
