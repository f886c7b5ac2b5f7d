use serde::{Deserialize, Serialize};
use std::fmt;

/// Externally observable state of a call session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    ConnectingSignaling,
    WaitingForPeer,
    Negotiating,
    Connected,
    DisconnectedPeerLeft,
    Failed,
    Closed,
}

impl ConnectionStatus {
    /// `failed` and `closed` only leave through a fresh call start.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Closed)
    }

    pub fn is_in_call(self) -> bool {
        matches!(
            self,
            Self::WaitingForPeer | Self::Negotiating | Self::Connected
        )
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Disconnected => "Not connected",
            Self::ConnectingSignaling => "Connecting to signaling server...",
            Self::WaitingForPeer => "Waiting for another user to join...",
            Self::Negotiating => "Establishing connection...",
            Self::Connected => "Connected",
            Self::DisconnectedPeerLeft => "The other user has left",
            Self::Failed => "Connection failed",
            Self::Closed => "Call ended",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
