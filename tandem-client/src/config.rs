use std::time::Duration;
use tandem_core::IceServerConfig;

pub const DEFAULT_SERVER_URL: &str = "ws://localhost:8000";

/// Everything a call session needs, passed in explicitly.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base `ws://` or `wss://` URL; `/ws/{user_id}` is appended.
    pub server_url: String,
    pub ice_servers: Vec<IceServerConfig>,
    pub reconnect: ReconnectPolicy,
    pub media: MediaConstraints,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_owned(),
            ice_servers: IceServerConfig::defaults(),
            reconnect: ReconnectPolicy::default(),
            media: MediaConstraints::default(),
        }
    }
}

/// Bounded exponential backoff for the signaling connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub multiplier: u32,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(3),
            multiplier: 2,
            max_delay: Duration::from_secs(30),
            max_attempts: 5,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = self.multiplier.max(1).saturating_pow(exponent);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaConstraints {
    pub audio: bool,
    pub video: bool,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            audio: true,
            video: true,
        }
    }
}
