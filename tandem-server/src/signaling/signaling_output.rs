use async_trait::async_trait;
use tandem_core::{SignalMessage, UserId};

/// How rooms reach connected users. Implemented by the websocket layer,
/// and by capturing mocks in tests.
#[async_trait]
pub trait SignalingOutput: Send + Sync {
    /// Queue a message for one user. Returns `false` if that user has no
    /// open signaling channel.
    async fn send_signal(&self, user_id: &UserId, msg: SignalMessage) -> bool;

    /// Users with an open signaling channel right now.
    fn connected_users(&self) -> Vec<UserId>;
}
