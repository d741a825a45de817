use echowave_core::{InboundSignal, PeerId, SignalData};
use echowave_session::MembershipProtocol;

use crate::utils::{SessionHarness, candidate, candidates_in};

#[tokio::test]
async fn test_local_candidates_follow_offer() {
    let mut h = SessionHarness::new(MembershipProtocol::Events);
    h.connector.gather_during_offer(candidate("local1")).await;
    h.orchestrator.join_room(Some("r1".into())).await.unwrap();

    h.deliver(InboundSignal::UserJoined {
        id: PeerId::from("a"),
        count: 2,
    })
    .await;

    let signals = h.signaling.signals_to("a").await;
    assert_eq!(signals.len(), 2);
    assert!(matches!(&signals[0], SignalData::Offer { sdp } if sdp == "offer-for-a"));
    assert_eq!(candidates_in(&signals), vec!["candidate:local1"]);

    // Once the offer is out, new local candidates go straight through.
    h.connector
        .connection_for("a")
        .await
        .report(echowave_session::LinkEventKind::CandidateGenerated(candidate("local2")));
    h.orchestrator.settle().await;

    assert_eq!(
        candidates_in(&h.signaling.signals_to("a").await),
        vec!["candidate:local1", "candidate:local2"]
    );
}
