//! Idle timer registry: one pending inactivity callback per presence key.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::task::AbortHandle;
use tracing::debug;

use teamhub_entity::presence::PresenceKey;

/// A scheduled callback and the generation it was armed with.
#[derive(Debug)]
struct PendingTimer {
    generation: u64,
    abort: AbortHandle,
}

/// Process-wide registry of delayed idle callbacks keyed by (user, project).
///
/// Arming a key aborts whatever was pending for it. Every arm gets a new
/// generation number which is passed to the callback; the callback should
/// confirm it is still current with [`IdleTimerRegistry::release`] before
/// acting, which closes the window between a timer waking up and a newer
/// arm aborting it.
#[derive(Debug, Default)]
pub struct IdleTimerRegistry {
    pending: DashMap<PresenceKey, PendingTimer>,
    generations: AtomicU64,
}

impl IdleTimerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `on_fire` after `delay`, superseding any pending timer for `key`.
    ///
    /// Returns the generation assigned to this timer.
    pub fn arm<F, Fut>(&self, key: PresenceKey, delay: Duration, on_fire: F) -> u64
    where
        F: FnOnce(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let generation = self.generations.fetch_add(1, Ordering::SeqCst) + 1;

        // The shard lock is held until the new timer is recorded.
        let entry = self.pending.entry(key);
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire(generation).await;
        });
        let timer = PendingTimer {
            generation,
            abort: task.abort_handle(),
        };

        match entry {
            Entry::Occupied(mut occupied) => {
                let previous = occupied.insert(timer);
                previous.abort.abort();
                debug!(key = %key, generation, superseded = previous.generation, "Idle timer re-armed");
            }
            Entry::Vacant(vacant) => {
                vacant.insert(timer);
                debug!(key = %key, generation, "Idle timer armed");
            }
        }

        generation
    }

    /// Cancel and forget the pending timer for `key`, if any.
    pub fn cancel(&self, key: &PresenceKey) -> bool {
        match self.pending.remove(key) {
            Some((_, timer)) => {
                timer.abort.abort();
                debug!(key = %key, generation = timer.generation, "Idle timer cancelled");
                true
            }
            None => false,
        }
    }

    /// Remove the entry for `key` only if it still belongs to `generation`.
    ///
    /// Returns `false` when the timer has been cancelled or superseded.
    pub fn release(&self, key: &PresenceKey, generation: u64) -> bool {
        self.pending
            .remove_if(key, |_, timer| timer.generation == generation)
            .is_some()
    }

    /// Whether a timer is pending for `key`.
    pub fn is_armed(&self, key: &PresenceKey) -> bool {
        self.pending.contains_key(key)
    }

    /// Number of pending timers.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Abort every pending timer.
    pub fn cancel_all(&self) {
        let keys: Vec<PresenceKey> = self.pending.iter().map(|e| *e.key()).collect();
        for key in &keys {
            self.cancel(key);
        }
    }
}
