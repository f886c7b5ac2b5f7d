use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tandem_client::transport::WsConnector;
use tandem_client::{CallHandle, ClientConfig, ReconnectPolicy};
use tandem_core::{ConnectionStatus, IceCandidate, RoomId, RoomJoined, SignalMessage, UserId};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use super::mock_connector::{MockConnector, ServerLink};
use super::mock_media::RecordingMediaSource;
use super::mock_peer::{MockPeerFactory, MockPeerHandle};

/// Timeout for a single expected event (ms).
pub const SIGNAL_TIMEOUT_MS: u64 = 5000;

/// How long to wait before concluding nothing else will arrive (ms).
pub const QUIET_PERIOD_MS: u64 = 300;

pub fn user(id: &str) -> UserId {
    UserId::parse(id).expect("valid user id")
}

pub fn room(id: &str) -> RoomId {
    RoomId::parse(id).expect("valid room id")
}

pub fn test_config() -> ClientConfig {
    ClientConfig {
        server_url: "ws://signaling.test".to_owned(),
        ice_servers: Vec::new(),
        reconnect: ReconnectPolicy::default(),
        media: Default::default(),
    }
}

pub fn candidate(name: &str) -> IceCandidate {
    IceCandidate {
        candidate: name.to_owned(),
        sdp_mid: Some("0".to_owned()),
        sdp_m_line_index: Some(0),
        username_fragment: None,
    }
}

/// `room-joined` as the server sends it on success.
pub fn joined(room_id: &str, others: &[&str]) -> SignalMessage {
    let user_count = others.len() + 1;
    SignalMessage::RoomJoined(RoomJoined {
        success: true,
        room_id: room(room_id),
        user_count,
        other_users: others.iter().map(|u| user(u)).collect(),
        is_room_full: user_count >= 2,
        message: None,
    })
}

pub async fn wait_for_status(
    handle: &CallHandle,
    status: ConnectionStatus,
    within: Duration,
) -> Result<()> {
    let mut rx = handle.subscribe();
    tokio::time::timeout(within, rx.wait_for(|s| *s == status))
        .await
        .with_context(|| format!("Timeout waiting for {:?}, at {:?}", status, handle.status()))?
        .context("Call controller stopped")?;
    Ok(())
}

/// One client wired to mocks, plus the test-side ends of those mocks.
pub struct TestCall {
    pub handle: CallHandle,
    pub connector: Arc<MockConnector>,
    pub media: Arc<RecordingMediaSource>,
    links: mpsc::UnboundedReceiver<ServerLink>,
    peers: mpsc::UnboundedReceiver<MockPeerHandle>,
}

impl TestCall {
    pub fn spawn(user_id: &str) -> Self {
        Self::spawn_with(user_id, test_config(), RecordingMediaSource::new())
    }

    pub fn spawn_with(user_id: &str, config: ClientConfig, media: RecordingMediaSource) -> Self {
        let (connector, links) = MockConnector::new();
        let (peer_factory, peers) = MockPeerFactory::new();
        let media = Arc::new(media);

        let handle = CallHandle::spawn(
            config,
            user(user_id),
            connector.clone(),
            peer_factory,
            media.clone(),
        );

        Self {
            handle,
            connector,
            media,
            links,
            peers,
        }
    }

    pub async fn next_link(&mut self) -> Result<ServerLink> {
        self.next_link_within(Duration::from_millis(SIGNAL_TIMEOUT_MS))
            .await
    }

    pub async fn next_link_within(&mut self, within: Duration) -> Result<ServerLink> {
        tokio::time::timeout(within, self.links.recv())
            .await
            .context("Timeout waiting for a signaling connection")?
            .context("Connector dropped")
    }

    pub async fn next_peer(&mut self) -> Result<MockPeerHandle> {
        tokio::time::timeout(Duration::from_millis(SIGNAL_TIMEOUT_MS), self.peers.recv())
            .await
            .context("Timeout waiting for a peer connection")?
            .context("Peer factory dropped")
    }

    pub async fn wait_for(&self, status: ConnectionStatus) -> Result<()> {
        wait_for_status(&self.handle, status, Duration::from_millis(SIGNAL_TIMEOUT_MS)).await
    }

    /// Starts a call in `room_id` and consumes the `join-room` it sends.
    pub async fn start_in(&mut self, room_id: &str) -> Result<(ServerLink, MockPeerHandle)> {
        self.handle.start_call(room(room_id)).await?;
        let mut link = self.next_link().await?;
        let peer = self.next_peer().await?;

        match link.expect().await? {
            SignalMessage::JoinRoom { room_id: sent } if sent == room(room_id) => {}
            other => anyhow::bail!("expected join-room, got {:?}", other),
        }
        Ok((link, peer))
    }

    /// Brings the call to `waiting_for_peer` as the first member.
    pub async fn wait_alone_in(&mut self, room_id: &str) -> Result<(ServerLink, MockPeerHandle)> {
        let (link, peer) = self.start_in(room_id).await?;
        link.push(joined(room_id, &[]));
        self.wait_for(ConnectionStatus::WaitingForPeer).await?;
        Ok((link, peer))
    }
}

/// Starts a real signaling server on an ephemeral port.
pub async fn spawn_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("listener has an address");
    let state = Arc::new(tandem_server::AppState::new());

    tokio::spawn(async move {
        if let Err(e) = tandem_server::serve_on(listener, state).await {
            tracing::error!("[TestServer] {:?}", e);
        }
    });
    addr
}

/// A client speaking real WebSocket signaling with mock peers and media.
pub struct LiveCall {
    pub handle: CallHandle,
    pub media: Arc<RecordingMediaSource>,
    peers: mpsc::UnboundedReceiver<MockPeerHandle>,
}

impl LiveCall {
    pub fn spawn(addr: SocketAddr, user_id: &str) -> Self {
        let config = ClientConfig {
            server_url: format!("ws://{}", addr),
            ..test_config()
        };
        let connector = Arc::new(WsConnector::new(config.server_url.clone()));
        let (peer_factory, peers) = MockPeerFactory::new();
        let media = Arc::new(RecordingMediaSource::new());

        let handle = CallHandle::spawn(config, user(user_id), connector, peer_factory, media.clone());
        Self {
            handle,
            media,
            peers,
        }
    }

    pub async fn next_peer(&mut self) -> Result<MockPeerHandle> {
        tokio::time::timeout(Duration::from_millis(SIGNAL_TIMEOUT_MS), self.peers.recv())
            .await
            .context("Timeout waiting for a peer connection")?
            .context("Peer factory dropped")
    }

    pub async fn wait_for(&self, status: ConnectionStatus) -> Result<()> {
        wait_for_status(&self.handle, status, Duration::from_millis(SIGNAL_TIMEOUT_MS)).await
    }
}
