//! Ping/pong heartbeat for WebSocket keepalive.

use std::sync::Arc;
use std::time::Duration;

use tokio::time;
use tracing::{debug, warn};

use teamhub_core::clock::Clock;
use teamhub_core::config::RealtimeConfig;

use crate::message::types::OutboundMessage;

use super::handle::ConnectionHandle;

/// Heartbeat configuration
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// Interval between pings
    pub ping_interval: Duration,
    /// Silence after which the connection is considered dead
    pub ping_timeout: Duration,
}

impl From<&RealtimeConfig> for HeartbeatConfig {
    fn from(config: &RealtimeConfig) -> Self {
        Self {
            ping_interval: Duration::from_secs(config.ping_interval_seconds.max(1)),
            ping_timeout: Duration::from_secs(config.ping_timeout_seconds),
        }
    }
}

/// Why a heartbeat loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatExit {
    /// The connection closed on its own.
    Closed,
    /// No pong arrived within the timeout.
    TimedOut,
}

/// Run the heartbeat loop for a connection.
///
/// Sends a ping every interval and marks the connection dead when no pong
/// has been recorded within the timeout.
pub async fn run_heartbeat(
    handle: Arc<ConnectionHandle>,
    config: HeartbeatConfig,
    clock: Arc<dyn Clock>,
) -> HeartbeatExit {
    let closed = handle.closed();
    let mut interval = time::interval(config.ping_interval);
    // The first tick completes immediately.
    interval.tick().await;

    let exit = loop {
        tokio::select! {
            _ = closed.cancelled() => break HeartbeatExit::Closed,
            _ = interval.tick() => {}
        }

        let now = clock.now();
        let silence = (now - handle.last_pong().await)
            .to_std()
            .unwrap_or(Duration::ZERO);
        if silence > config.ping_timeout {
            warn!(conn_id = %handle.id, silence_secs = silence.as_secs(), "Heartbeat timeout");
            handle.mark_dead();
            break HeartbeatExit::TimedOut;
        }

        let ping = OutboundMessage::Ping {
            timestamp: now.timestamp_millis(),
        };
        let Ok(frame) = serde_json::to_string(&ping) else {
            continue;
        };
        if !handle.send(frame) && !handle.is_alive() {
            break HeartbeatExit::Closed;
        }
    };

    debug!(conn_id = %handle.id, ?exit, "Heartbeat loop ended");
    exit
}
