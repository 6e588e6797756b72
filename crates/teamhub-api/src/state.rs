//! Application state shared across all handlers and middleware.

use std::sync::Arc;
use std::time::Instant;

use teamhub_core::config::AppConfig;
use teamhub_database::DatabasePool;
use teamhub_realtime::RealtimeEngine;

/// Application state containing all shared dependencies.
///
/// Passed to every Axum handler via `State<AppState>`.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,
    /// Presence and WebSocket engine
    pub realtime: Arc<RealtimeEngine>,
    /// PostgreSQL pool, absent when running on the in-memory store
    pub database: Option<DatabasePool>,
    /// Process start, for uptime reporting
    pub started_at: Instant,
}

impl AppState {
    /// Creates the state, stamping the start time.
    pub fn new(
        config: Arc<AppConfig>,
        realtime: Arc<RealtimeEngine>,
        database: Option<DatabasePool>,
    ) -> Self {
        Self {
            config,
            realtime,
            database,
            started_at: Instant::now(),
        }
    }
}
