mod room;
mod signaling;
mod status;
mod user;

pub use room::{ROOM_CAPACITY, RoomId, RoomMembership};
pub use signaling::{
    IceCandidate, IceServerConfig, RoomJoined, SdpType, SessionDescription, SignalMessage,
};
pub use status::ConnectionStatus;
pub use user::UserId;
