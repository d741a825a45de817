use echowave_core::{InboundSignal, PeerId, SessionDescription};
use echowave_session::{LinkState, MembershipProtocol, Role, SessionEvent};

use crate::utils::{SessionHarness, offer_from};

#[tokio::test]
async fn test_matched_responder_waits_for_offer() {
    let mut h = SessionHarness::joined(MembershipProtocol::Events, None, Some("me")).await;

    h.deliver(InboundSignal::Matched {
        partner: PeerId::from("x"),
        initiator: false,
    })
    .await;

    let x = PeerId::from("x");
    let link = h.orchestrator.link(&x).unwrap();
    assert_eq!(link.role(), Role::Responder);
    assert_eq!(link.state(), LinkState::New);
    assert!(h.signaling.signals_to("x").await.is_empty());

    assert!(h.drain_events().iter().any(|e| matches!(
        e,
        SessionEvent::Matched { partner, initiator: false } if partner.as_str() == "x"
    )));

    h.deliver(offer_from("x", "offer-from-x")).await;

    let link = h.orchestrator.link(&x).unwrap();
    assert_eq!(link.state(), LinkState::Connected);
    assert_eq!(h.signaling.answers_to("x").await, 1);
    assert_eq!(h.signaling.offers_to("x").await, 0);

    let connections = h.connector.connections_for("x").await;
    assert_eq!(connections.len(), 1, "the matched link answers the offer");
    assert_eq!(
        connections[0].remote_descriptions().await,
        vec![SessionDescription::offer("offer-from-x")]
    );
}
