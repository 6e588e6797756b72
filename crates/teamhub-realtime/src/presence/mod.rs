//! Presence tracking: session lifecycle, idle timers and snapshots.

pub mod idle_timer;
pub mod session_manager;
pub mod snapshot;

pub use idle_timer::IdleTimerRegistry;
pub use session_manager::{IdleTransition, SessionManager};
pub use snapshot::SnapshotBuilder;
