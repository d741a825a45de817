use echowave_core::{InboundSignal, PeerId};
use echowave_session::{MembershipProtocol, SessionEvent, SessionPhase};

use crate::utils::SessionHarness;

#[tokio::test]
async fn test_dropped_connection_ends_session() {
    let mut h = SessionHarness::joined(MembershipProtocol::Events, Some("r1"), Some("me")).await;
    h.deliver(InboundSignal::UserJoined {
        id: PeerId::from("a"),
        count: 2,
    })
    .await;
    h.drain_events();

    h.signaling.drop_connection().await;
    h.orchestrator.pump().await;

    assert_eq!(h.orchestrator.phase(), SessionPhase::Detached);
    assert!(h.connector.connection_for("a").await.is_closed());
    let events = h.drain_events();
    assert!(matches!(&events[0], SessionEvent::FatalSignalingError(_)));
}

#[tokio::test]
async fn test_disconnected_event_ends_session() {
    let mut h = SessionHarness::joined(MembershipProtocol::Events, Some("r1"), Some("me")).await;

    h.signaling
        .push(InboundSignal::Disconnected {
            reason: "io error".to_string(),
        })
        .await;
    h.orchestrator.pump().await;

    assert_eq!(h.orchestrator.phase(), SessionPhase::Detached);
    assert!(h.drain_events().iter().any(
        |e| matches!(e, SessionEvent::FatalSignalingError(reason) if reason == "io error")
    ));
}

#[tokio::test]
async fn test_room_error_leaves_room() {
    let mut h = SessionHarness::joined(MembershipProtocol::Events, Some("full"), Some("me")).await;

    h.deliver(InboundSignal::RoomError {
        message: "Room is full".to_string(),
    })
    .await;

    assert_eq!(h.orchestrator.phase(), SessionPhase::Detached);
    assert!(!h.signaling.is_connected().await);
    assert!(h.drain_events().iter().any(
        |e| matches!(e, SessionEvent::RoomError(message) if message == "Room is full")
    ));
}
