use crate::signaling::SignalingOutput;
use async_trait::async_trait;
use axum::extract::ws::Message;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use tandem_core::{SignalMessage, UserId};
use tokio::sync::mpsc;
use tracing::{error, warn};

struct SignalingInner {
    peers: DashMap<UserId, mpsc::UnboundedSender<Message>>,
}

/// Outbound half of every open signaling socket, keyed by user.
#[derive(Clone)]
pub struct SignalingService {
    inner: Arc<SignalingInner>,
}

impl Default for SignalingService {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalingService {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SignalingInner {
                peers: DashMap::new(),
            }),
        }
    }

    /// Registers a socket. Refuses a second connection for an id that is
    /// already connected.
    pub fn add_peer(&self, user_id: UserId, tx: mpsc::UnboundedSender<Message>) -> bool {
        match self.inner.peers.entry(user_id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(tx);
                true
            }
        }
    }

    pub fn remove_peer(&self, user_id: &UserId) {
        self.inner.peers.remove(user_id);
    }

    pub fn connected_count(&self) -> usize {
        self.inner.peers.len()
    }

    pub fn deliver(&self, user_id: &UserId, msg: &SignalMessage) -> bool {
        let Some(peer) = self.inner.peers.get(user_id) else {
            warn!("Attempted to send {} to disconnected user {}", msg.kind(), user_id);
            return false;
        };

        match msg.encode() {
            Ok(json) => {
                if let Err(e) = peer.send(Message::Text(json.into())) {
                    error!("Failed to send WS message to {}: {:?}", user_id, e);
                    return false;
                }
                true
            }
            Err(e) => {
                error!("Failed to serialize signal message: {}", e);
                false
            }
        }
    }
}

#[async_trait]
impl SignalingOutput for SignalingService {
    async fn send_signal(&self, user_id: &UserId, msg: SignalMessage) -> bool {
        self.deliver(user_id, &msg)
    }

    fn connected_users(&self) -> Vec<UserId> {
        self.inner.peers.iter().map(|e| e.key().clone()).collect()
    }
}
