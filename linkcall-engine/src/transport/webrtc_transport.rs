use crate::error::TransportError;
use crate::transport::{
    LocalCandidateHandler, PeerTransport, PeerTransportFactory, PhaseChangeHandler,
    TransportConfig,
};
use async_trait::async_trait;
use linkcall_core::{
    ConnectionPhase, IceCandidate, IceServerConfig, NegotiationRole, SdpType, SessionDescription,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::setting_engine::SettingEngine;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

const DATA_CHANNEL_LABEL: &str = "linkcall";

/// [`PeerTransport`] backed by a webrtc-rs `RTCPeerConnection`.
pub struct WebRtcTransport {
    peer_connection: Arc<RTCPeerConnection>,
    closed: AtomicBool,
}

impl WebRtcTransport {
    pub async fn new(config: &TransportConfig, role: NegotiationRole) -> Result<Self, TransportError> {
        // Codecs are registered even for data-only calls so media can be attached later.
        let mut m = MediaEngine::default();
        m.register_default_codecs().map_err(internal)?;
        let registry = register_default_interceptors(Registry::new(), &mut m).map_err(internal)?;

        let mut settings = SettingEngine::default();
        settings.set_include_loopback_candidate(config.include_loopback);

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .with_setting_engine(settings)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: config.ice_servers.iter().map(rtc_ice_server).collect(),
            ice_candidate_pool_size: config.candidate_pool_size,
            ..Default::default()
        };

        let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await.map_err(internal)?);

        // The caller needs at least one m-line in its offer; a data channel
        // provides it when no media tracks are attached.
        if role == NegotiationRole::Caller {
            peer_connection
                .create_data_channel(DATA_CHANNEL_LABEL, None)
                .await
                .map_err(internal)?;
        }

        debug!("WebRTC transport created for {}", role);
        Ok(Self {
            peer_connection,
            closed: AtomicBool::new(false),
        })
    }

    /// The underlying connection, for attaching local tracks and reading remote ones.
    pub fn peer_connection(&self) -> &Arc<RTCPeerConnection> {
        &self.peer_connection
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(TransportError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PeerTransport for WebRtcTransport {
    async fn create_offer(&self) -> Result<SessionDescription, TransportError> {
        self.ensure_open()?;
        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .map_err(rejected)?;
        from_rtc_description(offer)
    }

    async fn create_answer(&self) -> Result<SessionDescription, TransportError> {
        self.ensure_open()?;
        let answer = self
            .peer_connection
            .create_answer(None)
            .await
            .map_err(rejected)?;
        from_rtc_description(answer)
    }

    async fn set_local_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), TransportError> {
        self.ensure_open()?;
        let desc = to_rtc_description(description)?;
        self.peer_connection
            .set_local_description(desc)
            .await
            .map_err(rejected)
    }

    async fn set_remote_description(
        &self,
        description: SessionDescription,
    ) -> Result<(), TransportError> {
        self.ensure_open()?;
        let desc = to_rtc_description(description)?;
        self.peer_connection
            .set_remote_description(desc)
            .await
            .map_err(rejected)
    }

    async fn add_remote_candidate(&self, candidate: IceCandidate) -> Result<(), TransportError> {
        self.ensure_open()?;
        self.peer_connection
            .add_ice_candidate(to_rtc_candidate(candidate))
            .await
            .map_err(rejected)
    }

    fn on_local_candidate(&self, handler: LocalCandidateHandler) {
        let handler: Arc<dyn Fn(IceCandidate) + Send + Sync> = Arc::from(handler);

        self.peer_connection
            .on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
                let handler = handler.clone();

                Box::pin(async move {
                    // `None` marks the end of gathering.
                    let Some(candidate) = c else { return };
                    let Ok(init) = candidate.to_json() else {
                        return;
                    };
                    handler(from_rtc_candidate(init));
                })
            }));
    }

    fn on_connection_phase_change(&self, handler: PhaseChangeHandler) {
        let handler: Arc<dyn Fn(ConnectionPhase) + Send + Sync> = Arc::from(handler);

        self.peer_connection
            .on_peer_connection_state_change(Box::new(move |s: RTCPeerConnectionState| {
                let handler = handler.clone();

                Box::pin(async move {
                    info!("Peer connection state changed: {:?}", s);
                    if let Some(phase) = phase_from_state(s) {
                        handler(phase);
                    }
                })
            }));
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.peer_connection.close().await.map_err(internal)
    }
}

/// Creates a [`WebRtcTransport`] per attempt from a shared configuration.
#[derive(Debug, Clone, Default)]
pub struct WebRtcTransportFactory {
    config: TransportConfig,
}

impl WebRtcTransportFactory {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl PeerTransportFactory for WebRtcTransportFactory {
    async fn create(&self, role: NegotiationRole) -> Result<Arc<dyn PeerTransport>, TransportError> {
        let transport = WebRtcTransport::new(&self.config, role).await?;
        Ok(Arc::new(transport))
    }
}

fn phase_from_state(state: RTCPeerConnectionState) -> Option<ConnectionPhase> {
    match state {
        RTCPeerConnectionState::New => Some(ConnectionPhase::Idle),
        RTCPeerConnectionState::Connecting => Some(ConnectionPhase::Negotiating),
        RTCPeerConnectionState::Connected => Some(ConnectionPhase::Connected),
        RTCPeerConnectionState::Disconnected | RTCPeerConnectionState::Closed => {
            Some(ConnectionPhase::Disconnected)
        }
        RTCPeerConnectionState::Failed => Some(ConnectionPhase::Failed),
        _ => None,
    }
}

fn rtc_ice_server(config: &IceServerConfig) -> RTCIceServer {
    RTCIceServer {
        urls: config.urls.clone(),
        username: config.username.clone().unwrap_or_default(),
        credential: config.credential.clone().unwrap_or_default(),
        ..Default::default()
    }
}

fn to_rtc_description(description: SessionDescription) -> Result<RTCSessionDescription, TransportError> {
    match description.sdp_type {
        SdpType::Offer => RTCSessionDescription::offer(description.sdp),
        SdpType::Answer => RTCSessionDescription::answer(description.sdp),
    }
    .map_err(rejected)
}

fn from_rtc_description(description: RTCSessionDescription) -> Result<SessionDescription, TransportError> {
    match description.sdp_type {
        RTCSdpType::Offer => Ok(SessionDescription::offer(description.sdp)),
        RTCSdpType::Answer => Ok(SessionDescription::answer(description.sdp)),
        other => Err(TransportError::Rejected(format!(
            "unsupported description type {other}"
        ))),
    }
}

fn to_rtc_candidate(candidate: IceCandidate) -> RTCIceCandidateInit {
    RTCIceCandidateInit {
        candidate: candidate.candidate,
        sdp_mid: candidate.sdp_mid,
        sdp_mline_index: candidate.sdp_mline_index,
        username_fragment: candidate.username_fragment,
    }
}

fn from_rtc_candidate(init: RTCIceCandidateInit) -> IceCandidate {
    IceCandidate {
        candidate: init.candidate,
        sdp_mid: init.sdp_mid,
        sdp_mline_index: init.sdp_mline_index,
        username_fragment: init.username_fragment,
    }
}

fn rejected(err: webrtc::Error) -> TransportError {
    TransportError::Rejected(err.to_string())
}

fn internal(err: webrtc::Error) -> TransportError {
    TransportError::Internal(err.to_string())
}
