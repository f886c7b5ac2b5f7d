use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by the signaling layer and the call session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The signaling channel could not be opened or dropped uncleanly.
    #[error("connection error: {0}")]
    Connection(String),

    /// A message was sent while the signaling channel was not open.
    #[error("signaling channel is not connected")]
    NotConnected,

    /// Camera or microphone could not be acquired.
    #[error("media access error: {0}")]
    MediaAccess(String),

    /// SDP or ICE could not be applied to the peer connection.
    #[error("negotiation error: {0}")]
    Negotiation(String),

    /// The room already holds its maximum number of participants.
    #[error("room is full: {0}")]
    Capacity(String),

    /// Malformed or unexpected signaling message.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("a call is already in progress")]
    CallInProgress,

    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl Error {
    pub fn connection(msg: impl std::fmt::Display) -> Self {
        Self::Connection(msg.to_string())
    }

    pub fn media_access(msg: impl std::fmt::Display) -> Self {
        Self::MediaAccess(msg.to_string())
    }

    pub fn negotiation(msg: impl std::fmt::Display) -> Self {
        Self::Negotiation(msg.to_string())
    }

    pub fn protocol(msg: impl std::fmt::Display) -> Self {
        Self::Protocol(msg.to_string())
    }

    /// Only an unclean transport loss is retried automatically.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Protocol(e.to_string())
    }
}
