//! # teamhub-realtime
//!
//! Presence and real-time engine for TeamHub. Provides:
//!
//! - Presence session lifecycle per (user, project) with idle demotion
//! - Idle timer registry with supersede-on-rearm semantics
//! - Presence snapshots with productive-minute accounting
//! - WebSocket connection hub with per-project rooms and multi-tab handling
//! - Ping/pong heartbeat and engine metrics

pub mod connection;
pub mod message;
pub mod metrics;
pub mod presence;
pub mod server;

pub use connection::hub::ConnectionHub;
pub use metrics::RealtimeMetrics;
pub use presence::{IdleTimerRegistry, IdleTransition, SessionManager, SnapshotBuilder};
pub use server::RealtimeEngine;
