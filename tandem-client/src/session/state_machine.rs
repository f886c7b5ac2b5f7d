use tandem_core::ConnectionStatus;
use tracing::debug;

/// Inputs to the session state machine, already reduced from raw
/// transport, signaling and peer-connection events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    StartCall,
    /// Successful `room-joined`. `full` decides offerer vs. answerer.
    RoomJoined { full: bool },
    JoinRejected,
    ConnectFailed,
    RemoteOffer,
    PeerConnected,
    RemoteTrack,
    PeerFailed,
    NegotiationFailed,
    MediaFailed,
    TransportLost,
    TransportClosedClean,
    ReconnectExhausted,
    PeerLeft,
    CallEnded,
    RoomReset,
    Hangup,
}

/// Owns the current [`ConnectionStatus`]. Every status change goes
/// through [`SessionStateMachine::apply`].
#[derive(Debug, Default)]
pub struct SessionStateMachine {
    status: ConnectionStatus,
}

impl SessionStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Applies `event`. Returns the new status when it changed; events
    /// that make no sense in the current state are ignored.
    pub fn apply(&mut self, event: SessionEvent) -> Option<ConnectionStatus> {
        use tandem_core::ConnectionStatus::*;

        let current = self.status;
        let next = match (current, event) {
            (
                Disconnected | Failed | Closed | DisconnectedPeerLeft,
                SessionEvent::StartCall,
            ) => ConnectingSignaling,

            (ConnectingSignaling | Disconnected, SessionEvent::RoomJoined { full: false }) => {
                WaitingForPeer
            }
            (
                ConnectingSignaling | Disconnected | WaitingForPeer,
                SessionEvent::RoomJoined { full: true },
            ) => Negotiating,

            (WaitingForPeer, SessionEvent::RemoteOffer) => Negotiating,
            (Negotiating, SessionEvent::PeerConnected | SessionEvent::RemoteTrack) => Connected,

            (
                s,
                SessionEvent::PeerFailed
                | SessionEvent::JoinRejected
                | SessionEvent::ConnectFailed
                | SessionEvent::NegotiationFailed
                | SessionEvent::MediaFailed
                | SessionEvent::ReconnectExhausted,
            ) if !s.is_terminal() => Failed,

            (s, SessionEvent::TransportLost) if !s.is_terminal() && s != DisconnectedPeerLeft => {
                Disconnected
            }
            (s, SessionEvent::TransportClosedClean) if !s.is_terminal() => Closed,

            (s, SessionEvent::PeerLeft) if s.is_in_call() => DisconnectedPeerLeft,
            (DisconnectedPeerLeft, SessionEvent::CallEnded) => Closed,

            (s, SessionEvent::Hangup | SessionEvent::RoomReset) if s != Closed => Closed,

            _ => {
                debug!("Ignoring {:?} in state {:?}", event, current);
                return None;
            }
        };

        if next == current {
            return None;
        }
        debug!("Status {:?} -> {:?} on {:?}", current, next, event);
        self.status = next;
        Some(next)
    }
}
