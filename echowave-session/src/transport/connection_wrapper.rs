use crate::transport::link_event::{
    LinkEventKind, LinkEventSink, LocalAudio, RemoteAudio, TransportState,
};
use crate::transport::media_connection::{MediaConnection, PeerConnector};
use crate::transport::transport_config::TransportConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use echowave_core::{IceCandidate, SdpKind, SessionDescription};
use std::sync::Arc;
use tracing::{debug, info};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::track::track_local::TrackLocal;

/// [`PeerConnector`] backed by webrtc-rs.
#[derive(Clone, Default)]
pub struct WebRtcConnector {
    config: TransportConfig,
}

impl WebRtcConnector {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl PeerConnector for WebRtcConnector {
    async fn connect(&self, sink: LinkEventSink) -> Result<Arc<dyn MediaConnection>> {
        let connection = ConnectionWrapper::new(self.config.clone(), sink).await?;
        Ok(Arc::new(connection))
    }
}

pub struct ConnectionWrapper {
    peer_connection: Arc<RTCPeerConnection>,
}

impl ConnectionWrapper {
    /// Build a peer connection whose callbacks report into `sink`.
    pub async fn new(config: TransportConfig, sink: LinkEventSink) -> Result<Self> {
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: config
                .ice_servers
                .into_iter()
                .map(|server| RTCIceServer {
                    urls: server.urls,
                    username: server.username.unwrap_or_default(),
                    credential: server.credential.unwrap_or_default(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(
            api.new_peer_connection(rtc_config)
                .await
                .context("Failed to create peer connection")?,
        );

        let state_sink = sink.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let sink = state_sink.clone();

                Box::pin(async move {
                    info!("Peer connection state for {}: {:?}", sink.peer_id(), s);
                    let state = match s {
                        RTCPeerConnectionState::Connected => TransportState::Connected,
                        RTCPeerConnectionState::Disconnected => TransportState::Disconnected,
                        RTCPeerConnectionState::Failed => TransportState::Failed,
                        RTCPeerConnectionState::Closed => TransportState::Closed,
                        _ => TransportState::Connecting,
                    };
                    sink.emit(LinkEventKind::StateChanged(state));
                })
            },
        ));

        let ice_sink = sink.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let sink = ice_sink.clone();

            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                sink.emit(LinkEventKind::CandidateGenerated(IceCandidate {
                    candidate: init.candidate,
                    sdp_mid: init.sdp_mid,
                    sdp_m_line_index: init.sdp_mline_index,
                }));
            })
        }));

        let track_sink = sink;
        peer_connection.on_track(Box::new(move |track, _receiver, _transceiver| {
            let sink = track_sink.clone();

            Box::pin(async move {
                if track.kind() != RTPCodecType::Audio {
                    debug!("Ignoring non-audio track from {}", sink.peer_id());
                    return;
                }
                sink.emit(LinkEventKind::TrackReceived(RemoteAudio {
                    track_id: track.id(),
                    stream_id: track.stream_id(),
                    track: Some(track),
                }));
            })
        }));

        Ok(Self { peer_connection })
    }
}

#[async_trait]
impl MediaConnection for ConnectionWrapper {
    async fn add_local_track(&self, track: LocalAudio) -> Result<()> {
        let track: Arc<dyn TrackLocal + Send + Sync> = track;
        self.peer_connection
            .add_track(track)
            .await
            .context("Failed to attach local track")?;
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        let offer = self.peer_connection.create_offer(None).await?;
        self.peer_connection
            .set_local_description(offer.clone())
            .await?;
        Ok(SessionDescription::offer(offer.sdp))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let answer = self.peer_connection.create_answer(None).await?;
        self.peer_connection
            .set_local_description(answer.clone())
            .await?;
        Ok(SessionDescription::answer(answer.sdp))
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        let desc = match desc.kind {
            SdpKind::Offer => RTCSessionDescription::offer(desc.sdp)?,
            SdpKind::Answer => RTCSessionDescription::answer(desc.sdp)?,
        };
        self.peer_connection
            .set_remote_description(desc)
            .await
            .context("Failed to apply remote description")?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index,
            ..Default::default()
        };
        self.peer_connection
            .add_ice_candidate(init)
            .await
            .context("Failed to add ICE candidate")?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.peer_connection.close().await?;
        Ok(())
    }
}
