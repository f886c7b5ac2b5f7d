use crate::media::LocalMedia;
use async_trait::async_trait;
use tandem_core::{IceCandidate, IceServerConfig, Result, SessionDescription};
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

/// What a peer connection reports back to the call session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerEvent {
    /// A locally gathered candidate that must reach the remote peer.
    IceCandidate(IceCandidate),
    StateChanged(PeerState),
    RemoteTrack { kind: String, id: String },
}

/// The operations the negotiation engine needs from a WebRTC peer
/// connection. Errors map to `Error::Negotiation`.
#[async_trait]
pub trait PeerConnection: Send + Sync {
    async fn attach_local_media(&self, media: &LocalMedia) -> Result<()>;

    /// Creates an offer and applies it as the local description.
    async fn create_offer(&self) -> Result<SessionDescription>;

    /// Creates an answer and applies it as the local description.
    async fn create_answer(&self) -> Result<SessionDescription>;

    async fn set_remote_description(&self, desc: SessionDescription) -> Result<()>;

    async fn add_ice_candidate(&self, candidate: IceCandidate) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

#[async_trait]
pub trait PeerFactory: Send + Sync {
    /// Builds a fresh peer connection whose events go to `events`.
    async fn create(
        &self,
        ice_servers: &[IceServerConfig],
        events: mpsc::UnboundedSender<PeerEvent>,
    ) -> Result<Box<dyn PeerConnection>>;
}
