use crate::media::LocalMedia;
use crate::peer::{PeerConnection, PeerEvent, PeerFactory, PeerState};
use anyhow::Context;
use async_trait::async_trait;
use std::sync::Arc;
use tandem_core::{Error, IceCandidate, IceServerConfig, Result, SdpType, SessionDescription};
use tokio::sync::mpsc;
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
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::track::track_local::TrackLocal;
use webrtc::track::track_remote::TrackRemote;

/// Peer connection backed by webrtc-rs.
pub struct RtcPeer {
    peer_connection: Arc<RTCPeerConnection>,
}

impl RtcPeer {
    pub async fn new(
        ice_servers: &[IceServerConfig],
        event_tx: mpsc::UnboundedSender<PeerEvent>,
    ) -> anyhow::Result<Self> {
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        let rtc_config = RTCConfiguration {
            ice_servers: ice_servers
                .iter()
                .map(|server| RTCIceServer {
                    urls: server.urls.clone(),
                    username: server.username.clone().unwrap_or_default(),
                    credential: server.credential.clone().unwrap_or_default(),
                })
                .collect(),
            ..Default::default()
        };

        let peer_connection = Arc::new(
            api.new_peer_connection(rtc_config)
                .await
                .context("failed to create peer connection")?,
        );

        let state_tx = event_tx.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let tx = state_tx.clone();

                Box::pin(async move {
                    info!("Peer connection state changed: {:?}", s);
                    let state = match s {
                        RTCPeerConnectionState::Connecting => PeerState::Connecting,
                        RTCPeerConnectionState::Connected => PeerState::Connected,
                        RTCPeerConnectionState::Disconnected => PeerState::Disconnected,
                        RTCPeerConnectionState::Failed => PeerState::Failed,
                        RTCPeerConnectionState::Closed => PeerState::Closed,
                        _ => PeerState::New,
                    };
                    let _ = tx.send(PeerEvent::StateChanged(state));
                })
            },
        ));

        let ice_tx = event_tx.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();

            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(init) = candidate.to_json() else {
                    return;
                };
                debug!("Local ICE candidate gathered");
                let _ = tx.send(PeerEvent::IceCandidate(IceCandidate {
                    candidate: init.candidate,
                    sdp_mid: init.sdp_mid,
                    sdp_m_line_index: init.sdp_mline_index,
                    username_fragment: init.username_fragment,
                }));
            })
        }));

        let track_tx = event_tx;
        peer_connection.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let tx = track_tx.clone();

                Box::pin(async move {
                    info!("Remote {} track arrived", track.kind());
                    let _ = tx.send(PeerEvent::RemoteTrack {
                        kind: track.kind().to_string(),
                        id: track.id(),
                    });
                })
            },
        ));

        Ok(Self { peer_connection })
    }

    fn to_rtc(desc: SessionDescription) -> anyhow::Result<RTCSessionDescription> {
        let rtc = match desc.kind {
            SdpType::Offer => RTCSessionDescription::offer(desc.sdp)?,
            SdpType::Answer => RTCSessionDescription::answer(desc.sdp)?,
            SdpType::Pranswer => RTCSessionDescription::pranswer(desc.sdp)?,
            SdpType::Rollback => anyhow::bail!("rollback is not supported"),
        };
        Ok(rtc)
    }
}

#[async_trait]
impl PeerConnection for RtcPeer {
    async fn attach_local_media(&self, media: &LocalMedia) -> Result<()> {
        for local in media.tracks() {
            let sender = self
                .peer_connection
                .add_track(local.sample_track() as Arc<dyn TrackLocal + Send + Sync>)
                .await
                .map_err(|e| Error::negotiation(format!("failed to add {} track: {}", local.kind(), e)))?;

            // RTCP has to be read for interceptors like NACK to work
            tokio::spawn(async move {
                let mut buf = vec![0u8; 1500];
                while sender.read(&mut buf).await.is_ok() {}
            });
        }
        Ok(())
    }

    async fn create_offer(&self) -> Result<SessionDescription> {
        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .map_err(Error::negotiation)?;
        self.peer_connection
            .set_local_description(offer.clone())
            .await
            .map_err(Error::negotiation)?;
        Ok(SessionDescription::offer(offer.sdp))
    }

    async fn create_answer(&self) -> Result<SessionDescription> {
        let answer = self
            .peer_connection
            .create_answer(None)
            .await
            .map_err(Error::negotiation)?;
        self.peer_connection
            .set_local_description(answer.clone())
            .await
            .map_err(Error::negotiation)?;
        Ok(SessionDescription::answer(answer.sdp))
    }

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()> {
        let desc = Self::to_rtc(desc).map_err(Error::negotiation)?;
        self.peer_connection
            .set_remote_description(desc)
            .await
            .map_err(Error::negotiation)
    }

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()> {
        let init = RTCIceCandidateInit {
            candidate: candidate.candidate,
            sdp_mid: candidate.sdp_mid,
            sdp_mline_index: candidate.sdp_m_line_index,
            username_fragment: candidate.username_fragment,
        };
        self.peer_connection
            .add_ice_candidate(init)
            .await
            .map_err(Error::negotiation)
    }

    async fn close(&self) -> Result<()> {
        self.peer_connection
            .close()
            .await
            .map_err(Error::negotiation)
    }
}

#[derive(Debug, Clone, Default)]
pub struct RtcPeerFactory;

#[async_trait]
impl PeerFactory for RtcPeerFactory {
    async fn create(
        &self,
        ice_servers: &[IceServerConfig],
        events: mpsc::UnboundedSender<PeerEvent>,
    ) -> Result<Box<dyn PeerConnection>> {
        let peer = RtcPeer::new(ice_servers, events)
            .await
            .map_err(|e| Error::negotiation(format!("{:#}", e)))?;
        Ok(Box::new(peer))
    }
}
