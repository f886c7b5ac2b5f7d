use crate::config::ReconnectPolicy;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// Schedules signaling reconnect attempts with bounded backoff.
#[derive(Debug)]
pub struct ReconnectSupervisor {
    policy: ReconnectPolicy,
    attempt: u32,
    deadline: Option<Instant>,
}

impl ReconnectSupervisor {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            attempt: 0,
            deadline: None,
        }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Arms the timer for the next attempt. Returns `None` once
    /// `max_attempts` have been used up.
    pub fn schedule(&mut self) -> Option<Duration> {
        if self.attempt >= self.policy.max_attempts {
            warn!("Giving up after {} reconnect attempts", self.attempt);
            self.deadline = None;
            return None;
        }

        self.attempt += 1;
        let delay = self.policy.delay_for(self.attempt);
        info!(
            "Reconnect attempt {}/{} in {:?}",
            self.attempt, self.policy.max_attempts, delay
        );
        self.deadline = Some(Instant::now() + delay);
        Some(delay)
    }

    /// Disarms the timer and restores the full attempt budget. Called
    /// after a successful rejoin and when the call ends.
    pub fn reset(&mut self) {
        self.attempt = 0;
        self.deadline = None;
    }

    /// Completes when the armed timer fires; never completes while
    /// nothing is scheduled. Disarms the timer on completion.
    pub async fn wait(&mut self) {
        match self.deadline {
            Some(deadline) => {
                tokio::time::sleep_until(deadline).await;
                self.deadline = None;
            }
            None => std::future::pending().await,
        }
    }
}
