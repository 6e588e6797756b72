//! Agent configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use teamhub_core::types::id::{ProjectId, UserId};

/// Settings for one presence agent (one user in one project).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// WebSocket URL of the connection hub, e.g. `ws://localhost:8080/ws`.
    pub server_url: String,
    /// The local user.
    pub user_id: UserId,
    /// Project whose room the agent joins.
    pub project_id: ProjectId,
    /// Minimum gap between two emitted `activity` events.
    #[serde(default = "default_debounce")]
    pub activity_debounce_seconds: u64,
    /// Local inactivity before the agent reports IDLE.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u64,
    /// Outbound and inbound channel capacity.
    #[serde(default = "default_buffer")]
    pub channel_buffer_size: usize,
}

impl AgentConfig {
    /// Config with default timings.
    pub fn new(server_url: impl Into<String>, user_id: UserId, project_id: ProjectId) -> Self {
        Self {
            server_url: server_url.into(),
            user_id,
            project_id,
            activity_debounce_seconds: default_debounce(),
            idle_timeout_seconds: default_idle_timeout(),
            channel_buffer_size: default_buffer(),
        }
    }

    /// Debounce interval as a [`Duration`].
    pub fn activity_debounce(&self) -> Duration {
        Duration::from_secs(self.activity_debounce_seconds)
    }

    /// Local idle timeout as a [`Duration`].
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_seconds)
    }
}

fn default_debounce() -> u64 {
    10
}

fn default_idle_timeout() -> u64 {
    120
}

fn default_buffer() -> usize {
    64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: AgentConfig = serde_json::from_value(serde_json::json!({
            "server_url": "ws://localhost:8080/ws",
            "user_id": UserId::new(),
            "project_id": ProjectId::new(),
        }))
        .unwrap();

        assert_eq!(config.activity_debounce(), Duration::from_secs(10));
        assert_eq!(config.idle_timeout(), Duration::from_secs(120));
        assert_eq!(config.channel_buffer_size, 64);
    }
}
