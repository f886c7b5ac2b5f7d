use crate::error::Error;
use crate::model::room::RoomId;
use crate::model::user::UserId;
use crate::utils::DEFAULT_STUN_SERVERS;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServerConfig {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }

    /// The public STUN servers used when nothing else is configured.
    pub fn defaults() -> Vec<Self> {
        DEFAULT_STUN_SERVERS.iter().map(|url| Self::stun(*url)).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SdpType {
    Offer,
    Answer,
    Pranswer,
    Rollback,
}

/// Mirrors the browser's `RTCSessionDescriptionInit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    #[serde(rename = "type")]
    pub kind: SdpType,
    pub sdp: String,
}

impl SessionDescription {
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Offer,
            sdp: sdp.into(),
        }
    }

    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpType::Answer,
            sdp: sdp.into(),
        }
    }
}

/// Mirrors the browser's `RTCIceCandidateInit` (camelCase on the wire).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceCandidate {
    pub candidate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_mid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdp_m_line_index: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_fragment: Option<String>,
}

/// Reply to `join-room`. Rejections carry `success: false` and a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomJoined {
    pub success: bool,
    #[serde(default)]
    pub room_id: RoomId,
    #[serde(default)]
    pub user_count: usize,
    #[serde(default)]
    pub other_users: Vec<UserId>,
    #[serde(default)]
    pub is_room_full: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RoomJoined {
    pub fn rejected(room_id: RoomId, message: impl Into<String>) -> Self {
        Self {
            success: false,
            room_id,
            user_count: 0,
            other_users: Vec::new(),
            is_room_full: false,
            message: Some(message.into()),
        }
    }
}

/// JSON text frame exchanged over the signaling channel, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SignalMessage {
    JoinRoom {
        room_id: RoomId,
    },
    RoomJoined(RoomJoined),
    Offer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<UserId>,
        offer: SessionDescription,
    },
    Answer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<UserId>,
        answer: SessionDescription,
    },
    IceCandidate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        from: Option<UserId>,
        candidate: IceCandidate,
    },
    UserJoined {
        user_id: UserId,
        message: String,
    },
    UserLeft {
        user_id: UserId,
        message: String,
    },
    LeaveRoom,
    Error {
        message: String,
    },
    RoomReset {
        message: String,
    },
    RoomsReset {
        message: String,
    },
}

impl SignalMessage {
    pub fn decode(text: &str) -> Result<Self, Error> {
        serde_json::from_str(text).map_err(|e| Error::protocol(format!("{}: {}", e, text)))
    }

    pub fn encode(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Wire name of the variant, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::JoinRoom { .. } => "join-room",
            Self::RoomJoined(_) => "room-joined",
            Self::Offer { .. } => "offer",
            Self::Answer { .. } => "answer",
            Self::IceCandidate { .. } => "ice-candidate",
            Self::UserJoined { .. } => "user-joined",
            Self::UserLeft { .. } => "user-left",
            Self::LeaveRoom => "leave-room",
            Self::Error { .. } => "error",
            Self::RoomReset { .. } => "room-reset",
            Self::RoomsReset { .. } => "rooms-reset",
        }
    }

    /// Offer, answer and ICE are forwarded verbatim between room members.
    pub fn is_relayed(&self) -> bool {
        matches!(
            self,
            Self::Offer { .. } | Self::Answer { .. } | Self::IceCandidate { .. }
        )
    }

    /// Stamps the sender onto a relayed message.
    pub fn with_sender(self, sender: UserId) -> Self {
        match self {
            Self::Offer { offer, .. } => Self::Offer {
                from: Some(sender),
                offer,
            },
            Self::Answer { answer, .. } => Self::Answer {
                from: Some(sender),
                answer,
            },
            Self::IceCandidate { candidate, .. } => Self::IceCandidate {
                from: Some(sender),
                candidate,
            },
            other => other,
        }
    }
}
