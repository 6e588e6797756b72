//! Local input activity and its debouncing.

use std::fmt;
use std::time::Duration;

use tokio::time::Instant;

/// Kind of user input observed by the host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityKind {
    /// Pointer movement or click.
    Mouse,
    /// Key press.
    Keyboard,
    /// Touch input.
    Touch,
    /// Scrolling.
    Scroll,
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Mouse => "mouse",
            Self::Keyboard => "keyboard",
            Self::Touch => "touch",
            Self::Scroll => "scroll",
        };
        f.write_str(name)
    }
}

/// Decides which raw activity is worth reporting to the server.
#[derive(Debug)]
pub struct ActivityDebouncer {
    interval: Duration,
    last_emitted: Option<Instant>,
}

impl ActivityDebouncer {
    /// Debouncer letting one event through per `interval`.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emitted: None,
        }
    }

    /// Record activity at `now`; true when it should be emitted.
    pub fn observe(&mut self, now: Instant) -> bool {
        let due = self
            .last_emitted
            .is_none_or(|last| now.duration_since(last) > self.interval);
        if due {
            self.last_emitted = Some(now);
        }
        due
    }

    /// Forget the last emission so the next activity goes through.
    pub fn reset(&mut self) {
        self.last_emitted = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_activity_is_emitted() {
        let mut debouncer = ActivityDebouncer::new(Duration::from_secs(10));
        assert!(debouncer.observe(Instant::now()));
    }

    #[test]
    fn test_activity_within_interval_is_dropped() {
        let mut debouncer = ActivityDebouncer::new(Duration::from_secs(10));
        let start = Instant::now();

        assert!(debouncer.observe(start));
        assert!(!debouncer.observe(start + Duration::from_secs(3)));
        assert!(!debouncer.observe(start + Duration::from_secs(10)));
        assert!(debouncer.observe(start + Duration::from_secs(11)));
        assert!(!debouncer.observe(start + Duration::from_secs(15)));
    }

    #[test]
    fn test_reset() {
        let mut debouncer = ActivityDebouncer::new(Duration::from_secs(10));
        let start = Instant::now();
        assert!(debouncer.observe(start));
        debouncer.reset();
        assert!(debouncer.observe(start + Duration::from_secs(1)));
    }
}
