//! Response DTOs.

use serde::{Deserialize, Serialize};

use teamhub_entity::presence::PresenceSession;
use teamhub_realtime::metrics::MetricsSnapshot;

/// Standard success response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    /// Whether the request was successful.
    pub success: bool,
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Creates a successful response.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `"ok"` or `"degraded"`.
    pub status: String,
    /// Server version.
    pub version: String,
    /// Seconds since the process started.
    pub uptime_seconds: u64,
    /// `"connected"`, `"unavailable"`, or `"memory"` without a database.
    pub database: String,
    /// Live WebSocket connections.
    pub connections: usize,
    /// Realtime engine counters.
    pub metrics: MetricsSnapshot,
}

/// Result of the HTTP session start fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStartResponse {
    /// The active session for the caller.
    pub session: PresenceSession,
}

/// Result of the HTTP session end fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEndResponse {
    /// Whether a session was closed by this request.
    pub ended: bool,
    /// The closed session, when one was.
    pub session: Option<PresenceSession>,
}
