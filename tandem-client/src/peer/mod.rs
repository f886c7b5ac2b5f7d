mod peer_connection;
mod rtc_peer;

pub use peer_connection::*;
pub use rtc_peer::*;
