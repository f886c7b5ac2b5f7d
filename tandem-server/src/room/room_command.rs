use serde::Serialize;
use tandem_core::{RoomId, RoomJoined, SignalMessage, UserId};
use tokio::sync::oneshot;

/// Commands delivered to a room actor. The actor applies them one at a
/// time, which is what keeps membership within capacity.
#[derive(Debug)]
pub enum RoomCommand {
    /// Admit a user if there is room left.
    Join {
        user_id: UserId,
        reply: oneshot::Sender<JoinReply>,
    },

    /// Remove a user and tell whoever is left.
    Leave { user_id: UserId, message: String },

    /// Forward an offer/answer/candidate to the other participant(s).
    Relay { from: UserId, message: SignalMessage },

    /// Drop every participant and shut the room down.
    Reset {
        notify: bool,
        reply: oneshot::Sender<Vec<UserId>>,
    },

    Snapshot { reply: oneshot::Sender<RoomSnapshot> },
}

#[derive(Debug)]
pub enum JoinReply {
    Done(RoomJoined),
    /// The room emptied and unregistered itself before this join was
    /// processed; the caller must look the room up again.
    Closing,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub users: Vec<UserId>,
    pub user_count: usize,
    pub created_at: u64,
}
