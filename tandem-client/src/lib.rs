//! Client side of a tandem call: signaling transport, WebRTC negotiation
//! and the call session that ties them together behind [`CallHandle`].

pub mod config;
pub mod media;
pub mod negotiation;
pub mod peer;
pub mod session;
pub mod transport;

pub use config::{ClientConfig, MediaConstraints, ReconnectPolicy};
pub use media::{LocalMedia, LocalTrack, MediaSource, StaticMediaSource, TrackKind};
pub use negotiation::NegotiationEngine;
pub use peer::{PeerConnection, PeerEvent, PeerFactory, PeerState, RtcPeer, RtcPeerFactory};
pub use session::{CallHandle, ReconnectSupervisor, SessionEvent, SessionStateMachine};
pub use transport::{
    Connection, Connector, SignalingTransport, TransportEvent, WsConnector, WsTransport,
};
