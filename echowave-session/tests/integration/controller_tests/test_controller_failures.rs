use echowave_core::InboundSignal;
use echowave_session::{CaptureError, ControllerError, ConversationEvent, ConversationState};

use crate::utils::ControllerHarness;

#[tokio::test]
async fn test_capture_failure_returns_to_idle() {
    let mut h = ControllerHarness::new(Some("r1"));
    h.capture.deny();

    let result = h.controller.start().await;

    assert!(matches!(
        result,
        Err(ControllerError::Capture(CaptureError::PermissionDenied))
    ));
    assert_eq!(h.controller.state(), ConversationState::Idle);
    assert!(h.controller.last_error().is_some());
    assert_eq!(h.signaling.connects(), 0);
    assert!(
        h.drain_events()
            .iter()
            .any(|e| matches!(e, ConversationEvent::Error(_)))
    );
}

#[tokio::test]
async fn test_unreachable_server_releases_capture() {
    let mut h = ControllerHarness::new(Some("r1"));
    h.signaling.fail_connect(true);

    let result = h.controller.start().await;

    assert!(matches!(result, Err(ControllerError::Session(_))));
    assert_eq!(h.controller.state(), ConversationState::Idle);
    assert_eq!(h.capture.acquired(), 1);
    assert_eq!(h.capture.released(), 1);
}

#[tokio::test]
async fn test_lost_signaling_returns_to_idle() {
    let mut h = ControllerHarness::new(Some("r1"));
    h.controller.start().await.unwrap();

    h.signaling.drop_connection().await;
    h.controller.pump().await;

    assert_eq!(h.controller.state(), ConversationState::Idle);
    assert!(
        h.controller
            .last_error()
            .is_some_and(|e| e.starts_with("Lost connection"))
    );
    assert_eq!(h.capture.released(), 1);
    assert!(h.controller.summary().is_none());
}

#[tokio::test]
async fn test_room_error_returns_to_idle() {
    let mut h = ControllerHarness::new(Some("r1"));
    h.controller.start().await.unwrap();

    h.receive(InboundSignal::RoomError {
        message: "Room is full".to_string(),
    })
    .await;

    assert_eq!(h.controller.state(), ConversationState::Idle);
    assert_eq!(h.controller.last_error(), Some("Room error: Room is full"));
}

#[tokio::test]
async fn test_stop_requires_talking() {
    let mut h = ControllerHarness::new(None);

    let result = h.controller.stop_talking().await;

    assert!(matches!(
        result,
        Err(ControllerError::NotTalking(ConversationState::Idle))
    ));
}
