use crate::signaling::signal_channel::{SignalChannel, SignalError};
use async_trait::async_trait;
use echowave_core::{InboundSignal, OutboundSignal};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

const INBOUND_BUFFER: usize = 256;

/// [`SignalChannel`] speaking JSON text frames over a WebSocket.
pub struct WsSignalChannel {
    url: String,
    outbound: Option<mpsc::UnboundedSender<Message>>,
    recv_task: Option<JoinHandle<()>>,
}

impl WsSignalChannel {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            outbound: None,
            recv_task: None,
        }
    }
}

#[async_trait]
impl SignalChannel for WsSignalChannel {
    async fn connect(&mut self) -> Result<mpsc::Receiver<InboundSignal>, SignalError> {
        self.disconnect().await;

        let (stream, _) = connect_async(self.url.as_str())
            .await
            .map_err(|e| SignalError::Connect(e.to_string()))?;
        info!("Connected to signaling server {}", self.url);

        let (mut sender, mut receiver) = stream.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
        let (in_tx, in_rx) = mpsc::channel(INBOUND_BUFFER);

        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                if sender.send(msg).await.is_err() {
                    break;
                }
            }
            let _ = sender.close().await;
        });

        let recv_task = tokio::spawn(async move {
            let reason = loop {
                match receiver.next().await {
                    Some(Ok(Message::Text(text))) => match InboundSignal::from_json(&text) {
                        Ok(signal) => {
                            if in_tx.send(signal).await.is_err() {
                                return;
                            }
                        }
                        Err(e) => warn!("Invalid signal from server: {}", e),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        break frame
                            .map(|f| f.reason.as_str().to_owned())
                            .unwrap_or_else(|| "closed by server".to_owned());
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break e.to_string(),
                    None => break "stream ended".to_owned(),
                }
            };

            debug!("Signaling stream finished: {}", reason);
            let _ = in_tx.send(InboundSignal::Disconnected { reason }).await;
        });

        self.outbound = Some(out_tx);
        self.recv_task = Some(recv_task);
        Ok(in_rx)
    }

    async fn emit(&mut self, msg: OutboundSignal) -> Result<(), SignalError> {
        let Some(outbound) = &self.outbound else {
            return Err(SignalError::NotConnected);
        };
        let json = msg.to_json()?;
        outbound
            .send(Message::Text(json.into()))
            .map_err(|_| SignalError::NotConnected)
    }

    async fn disconnect(&mut self) {
        // Dropping the sender lets the writer task flush and close the socket.
        self.outbound = None;
        if let Some(task) = self.recv_task.take() {
            task.abort();
            info!("Disconnected from signaling server {}", self.url);
        }
    }
}
