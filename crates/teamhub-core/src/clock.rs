//! Wall-clock abstraction for presence timing.
//!
//! Session intervals are stored as UTC timestamps while idle timers run on
//! tokio's timer wheel. [`RuntimeClock`] derives timestamps from tokio's
//! monotonic clock so that a paused test runtime moves both together.

use std::fmt::Debug;

use chrono::{DateTime, Utc};

/// Source of "now" for anything that persists timestamps.
pub trait Clock: Send + Sync + Debug + 'static {
    /// Current UTC time.
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock anchored to a wall-clock origin and advanced by tokio's clock.
///
/// Must be created inside a tokio runtime. Under `tokio::time::pause()`
/// it only moves when the runtime's time moves.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeClock {
    origin_wall: DateTime<Utc>,
    origin: tokio::time::Instant,
}

impl RuntimeClock {
    /// Anchor the clock at the current system time.
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    /// Anchor the clock at an explicit wall-clock time.
    pub fn starting_at(origin_wall: DateTime<Utc>) -> Self {
        Self {
            origin_wall,
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for RuntimeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for RuntimeClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = tokio::time::Instant::now().duration_since(self.origin);
        self.origin_wall
            + chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero())
    }
}
