//! Presence session configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Presence session tracking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceConfig {
    /// Inactivity window before an ONLINE session is demoted to IDLE.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u64,
    /// An active session not owned by this process whose last heartbeat is
    /// older than this is treated as abandoned on the next start.
    #[serde(default = "default_stale_minutes")]
    pub stale_session_minutes: i64,
    /// Buffer size of the idle transition broadcast channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer_size: usize,
}

impl PresenceConfig {
    /// Idle timeout as a [`Duration`].
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_seconds)
    }

    /// Staleness threshold as a chrono duration.
    pub fn stale_after(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.stale_session_minutes)
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            idle_timeout_seconds: default_idle_timeout(),
            stale_session_minutes: default_stale_minutes(),
            event_buffer_size: default_event_buffer(),
        }
    }
}

fn default_idle_timeout() -> u64 {
    300
}

fn default_stale_minutes() -> i64 {
    30
}

fn default_event_buffer() -> usize {
    256
}
