use crate::media::{LocalStream, MediaKind};
use crate::transport::media_transport::{MediaTransport, TransportFactory};
use crate::transport::transport_config::TransportConfig;
use crate::transport::transport_event::{LinkKey, RemoteTrackInfo, TransportEvent, TransportState};
use anyhow::Result;
use async_trait::async_trait;
use huddle_core::IceCandidate;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};
use webrtc::api::API;
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
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

/// Builds `webrtc` peer connections sharing one media engine.
pub struct WebRtcTransportFactory {
    api: API,
    config: TransportConfig,
}

impl WebRtcTransportFactory {
    pub fn new(config: TransportConfig) -> Result<Self> {
        // Регистрация кодеков и интерцепторов (метрики, RTCP отчеты)
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        Ok(Self { api, config })
    }

    fn rtc_configuration(&self) -> RTCConfiguration {
        let ice_servers = self
            .config
            .ice_servers
            .iter()
            .map(|s| RTCIceServer {
                urls: s.urls.clone(),
                username: s.username.clone().unwrap_or_default(),
                credential: s.credential.clone().unwrap_or_default(),
                ..Default::default()
            })
            .collect();

        RTCConfiguration {
            ice_servers,
            ice_candidate_pool_size: self.config.ice_candidate_pool_size,
            ..Default::default()
        }
    }
}

#[async_trait]
impl TransportFactory for WebRtcTransportFactory {
    async fn create(
        &self,
        key: LinkKey,
        stream: Arc<LocalStream>,
        events: mpsc::Sender<TransportEvent>,
    ) -> Result<Box<dyn MediaTransport>> {
        let transport = WebRtcTransport::new(&self.api, self.rtc_configuration(), key, &stream, events).await?;
        Ok(Box::new(transport))
    }
}

pub struct WebRtcTransport {
    key: LinkKey,
    peer_connection: Arc<RTCPeerConnection>,
}

impl WebRtcTransport {
    /// event_tx: канал, в который транспорт "выплевывает" события для цикла сессии.
    async fn new(
        api: &API,
        rtc_config: RTCConfiguration,
        key: LinkKey,
        stream: &LocalStream,
        event_tx: mpsc::Sender<TransportEvent>,
    ) -> Result<Self> {
        let peer_connection = Arc::new(api.new_peer_connection(rtc_config).await?);

        // Исходящие дорожки: одна локальная камера/микрофон на все соединения
        for track in stream.tracks() {
            let rtp: Arc<dyn TrackLocal + Send + Sync> = track.rtp();
            let sender = peer_connection.add_track(rtp).await?;

            // RTCP нужно вычитывать, иначе интерцепторы не работают
            tokio::spawn(async move {
                let mut rtcp_buf = vec![0u8; 1500];
                while sender.read(&mut rtcp_buf).await.is_ok() {}
            });
        }

        // A. Мониторинг состояния соединения
        let state_tx = event_tx.clone();
        let state_key = key.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let tx = state_tx.clone();
                let key = state_key.clone();

                Box::pin(async move {
                    info!("Peer Connection State changed for {:?}: {:?}", key.peer_id, s);
                    let state = match s {
                        RTCPeerConnectionState::Connected => TransportState::Connected,
                        RTCPeerConnectionState::Disconnected => TransportState::Disconnected,
                        RTCPeerConnectionState::Failed => TransportState::Failed,
                        RTCPeerConnectionState::Closed => TransportState::Closed,
                        _ => TransportState::Connecting,
                    };
                    let _ = tx.send(TransportEvent::StateChanged(key, state)).await;
                })
            },
        ));

        // B. Trickle ICE: отправка локальных кандидатов собеседнику
        let ice_tx = event_tx.clone();
        let ice_key = key.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();
            let key = ice_key.clone();

            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                let candidate = IceCandidate {
                    candidate: init.candidate,
                    sdp_mid: init.sdp_mid,
                    sdp_m_line_index: init.sdp_mline_index,
                    username_fragment: init.username_fragment,
                };
                let _ = tx
                    .send(TransportEvent::CandidateGenerated(key, candidate))
                    .await;
            })
        }));

        // C. Входящие дорожки собеседника
        let track_tx = event_tx;
        let track_key = key.clone();
        peer_connection.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let tx = track_tx.clone();
                let key = track_key.clone();

                Box::pin(async move {
                    let kind = match track.kind() {
                        RTPCodecType::Audio => MediaKind::Audio,
                        RTPCodecType::Video => MediaKind::Video,
                        _ => return,
                    };
                    debug!("Received {} track from {:?}", kind, key.peer_id);
                    let info = RemoteTrackInfo {
                        kind,
                        track_id: track.id(),
                        stream_id: track.stream_id(),
                    };
                    let _ = tx.send(TransportEvent::RemoteTrack(key, info)).await;
                })
            },
        ));

        Ok(Self {
            key,
            peer_connection,
        })
    }
}

#[async_trait]
impl MediaTransport for WebRtcTransport {
    async fn create_offer(&self) -> Result<String> {
        let offer = self.peer_connection.create_offer(None).await?;
        self.peer_connection
            .set_local_description(offer.clone())
            .await?;
        Ok(offer.sdp)
    }

    async fn create_answer(&self) -> Result<String> {
        let answer = self.peer_connection.create_answer(None).await?;
        self.peer_connection
            .set_local_description(answer.clone())
            .await?;
        Ok(answer.sdp)
    }

    async fn set_remote_offer(&self, sdp: String) -> Result<()> {
        let desc = RTCSessionDescription::offer(sdp)?;
        self.peer_connection.set_remote_description(desc).await?;
        Ok(())
    }

    async fn set_remote_answer(&self, sdp: String) -> Result<()> {
        let desc = RTCSessionDescription::answer(sdp)?;
        self.peer_connection.set_remote_description(desc).await?;
        Ok(())
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index,
            username_fragment: candidate.username_fragment,
        };
        self.peer_connection.add_ice_candidate(init).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        debug!("Closing peer connection to {:?} (generation {})", self.key.peer_id, self.key.generation);
        self.peer_connection.close().await?;
        Ok(())
    }
}
