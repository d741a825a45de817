use async_trait::async_trait;
use echowave_core::{InboundSignal, OutboundSignal, PeerId, RoomCode, SignalData};
use echowave_session::{SignalChannel, SignalError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::{Mutex, mpsc};

/// Shared view of a [`MockSignalChannel`], kept by the test.
#[derive(Clone, Default)]
pub struct MockSignalHandle {
    /// Every message the orchestrator emitted, in order.
    emitted: Arc<Mutex<Vec<OutboundSignal>>>,
    /// Sender feeding the orchestrator while connected.
    inbound: Arc<Mutex<Option<mpsc::Sender<InboundSignal>>>>,
    connects: Arc<AtomicUsize>,
    disconnects: Arc<AtomicUsize>,
    fail_connect: Arc<AtomicBool>,
    /// Code returned in `room-created` when asked to create a room.
    room_to_create: Arc<Mutex<Option<RoomCode>>>,
}

/// Mock SignalChannel that records emitted messages and lets the test
/// inject inbound events.
pub struct MockSignalChannel {
    handle: MockSignalHandle,
}

impl MockSignalChannel {
    pub fn new() -> (Self, MockSignalHandle) {
        let handle = MockSignalHandle::default();
        (
            Self {
                handle: handle.clone(),
            },
            handle,
        )
    }
}

impl MockSignalHandle {
    /// Build a channel sharing this handle (one per conversation attempt).
    pub fn channel(&self) -> MockSignalChannel {
        MockSignalChannel {
            handle: self.clone(),
        }
    }

    pub fn fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub async fn create_room_reply(&self, code: &str) {
        *self.room_to_create.lock().await = Some(RoomCode::from(code));
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub async fn is_connected(&self) -> bool {
        self.inbound.lock().await.is_some()
    }

    /// Deliver an inbound event as if the server had sent it.
    pub async fn push(&self, signal: InboundSignal) {
        let sender = self
            .inbound
            .lock()
            .await
            .clone()
            .expect("mock channel is not connected");
        sender.send(signal).await.expect("receiver dropped");
    }

    /// Simulate the server connection dropping without a goodbye.
    pub async fn drop_connection(&self) {
        self.inbound.lock().await.take();
    }

    pub async fn emitted(&self) -> Vec<OutboundSignal> {
        self.emitted.lock().await.clone()
    }

    /// Negotiation payloads sent to `peer_id`, in order.
    pub async fn signals_to(&self, peer_id: &str) -> Vec<SignalData> {
        let target_id = PeerId::from(peer_id);
        self.emitted
            .lock()
            .await
            .iter()
            .filter_map(|msg| match msg {
                OutboundSignal::Signal { target, data } if *target == target_id => {
                    Some(data.clone())
                }
                _ => None,
            })
            .collect()
    }

    pub async fn offers_to(&self, peer_id: &str) -> usize {
        self.signals_to(peer_id)
            .await
            .iter()
            .filter(|data| matches!(data, SignalData::Offer { .. }))
            .count()
    }

    pub async fn answers_to(&self, peer_id: &str) -> usize {
        self.signals_to(peer_id)
            .await
            .iter()
            .filter(|data| matches!(data, SignalData::Answer { .. }))
            .count()
    }
}

#[async_trait]
impl SignalChannel for MockSignalChannel {
    async fn connect(&mut self) -> Result<mpsc::Receiver<InboundSignal>, SignalError> {
        self.handle.connects.fetch_add(1, Ordering::SeqCst);
        if self.handle.fail_connect.load(Ordering::SeqCst) {
            return Err(SignalError::Connect("connection refused".to_string()));
        }

        let (tx, rx) = mpsc::channel(64);
        *self.handle.inbound.lock().await = Some(tx);
        Ok(rx)
    }

    async fn emit(&mut self, msg: OutboundSignal) -> Result<(), SignalError> {
        let inbound = self.handle.inbound.lock().await.clone();
        let Some(inbound) = inbound else {
            return Err(SignalError::NotConnected);
        };

        tracing::debug!("[MockSignaling] emit {:?}", msg);
        let create_room = matches!(msg, OutboundSignal::CreateRoom);
        self.handle.emitted.lock().await.push(msg);

        if create_room {
            if let Some(code) = self.handle.room_to_create.lock().await.clone() {
                let _ = inbound.send(InboundSignal::RoomCreated { code }).await;
            }
        }
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.handle.disconnects.fetch_add(1, Ordering::SeqCst);
        self.handle.inbound.lock().await.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_signaling_records_emits() {
        let (mut channel, handle) = MockSignalChannel::new();
        let _rx = channel.connect().await.unwrap();

        channel
            .emit(OutboundSignal::Signal {
                target: PeerId::from("a"),
                data: SignalData::Offer {
                    sdp: "v=0".to_string(),
                },
            })
            .await
            .unwrap();

        assert_eq!(handle.offers_to("a").await, 1);
        assert_eq!(handle.connects(), 1);
    }

    #[tokio::test]
    async fn test_mock_signaling_rejects_emit_when_disconnected() {
        let (mut channel, _handle) = MockSignalChannel::new();

        let result = channel.emit(OutboundSignal::JoinRandom).await;

        assert!(matches!(result, Err(SignalError::NotConnected)));
    }
}
