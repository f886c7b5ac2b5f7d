use async_trait::async_trait;
use tandem_core::{Result, SignalMessage, UserId};
use tokio::sync::mpsc;

/// Close code for a normal, intentional closure.
pub const CLOSE_NORMAL: u16 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Message(SignalMessage),
    /// Emitted once, last. `clean` is true when this side closed the
    /// channel or the server closed it with [`CLOSE_NORMAL`].
    Closed {
        clean: bool,
        code: Option<u16>,
        reason: String,
    },
}

/// An open signaling channel plus the stream of what arrives on it.
pub struct Connection {
    pub transport: Box<dyn SignalingTransport>,
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens the channel keyed by `user_id`. Fails with
    /// `Error::Connection` when it cannot be established.
    async fn connect(&self, user_id: &UserId) -> Result<Connection>;
}

pub trait SignalingTransport: Send + Sync {
    /// Queues a message for transmission. Returns `Error::NotConnected`
    /// once the channel is closed; messages are never dropped silently.
    fn send(&self, msg: &SignalMessage) -> Result<()>;

    fn is_open(&self) -> bool;

    /// Starts a clean close. Safe to call more than once and concurrently
    /// with `send`.
    fn close(&self);
}
