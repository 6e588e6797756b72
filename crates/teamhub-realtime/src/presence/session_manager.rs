//! Presence session state machine for a single (user, project) key.

use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard, broadcast};
use tracing::{debug, info, warn};

use teamhub_core::clock::Clock;
use teamhub_core::config::PresenceConfig;
use teamhub_core::error::AppError;
use teamhub_core::result::AppResult;
use teamhub_core::types::id::PresenceSessionId;
use teamhub_database::store::{OpenOutcome, PresenceStore};
use teamhub_entity::presence::{PresenceKey, PresenceSession, PresenceStatus};

use super::idle_timer::IdleTimerRegistry;

/// Emitted when an idle timer demotes a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdleTransition {
    /// The key that went idle.
    pub key: PresenceKey,
    /// The session that was demoted.
    pub session_id: PresenceSessionId,
    /// When the demotion was recorded.
    pub at: DateTime<Utc>,
}

/// Owns the presence lifecycle: start, resume, explicit status, idle, end.
///
/// Every operation on a key runs under that key's async mutex, including
/// idle timer callbacks. Persistence failures are logged and reported as
/// `None`; they never reach the caller as errors.
pub struct SessionManager {
    store: Arc<dyn PresenceStore>,
    timers: Arc<IdleTimerRegistry>,
    clock: Arc<dyn Clock>,
    config: PresenceConfig,
    key_locks: DashMap<PresenceKey, Arc<Mutex<()>>>,
    /// Sessions this process opened or adopted, exempt from staleness.
    owned: DashMap<PresenceKey, PresenceSessionId>,
    idle_events: broadcast::Sender<IdleTransition>,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("owned", &self.owned.len())
            .field("pending_timers", &self.timers.pending_count())
            .finish()
    }
}

impl SessionManager {
    /// Creates a session manager over a presence store.
    pub fn new(
        store: Arc<dyn PresenceStore>,
        timers: Arc<IdleTimerRegistry>,
        clock: Arc<dyn Clock>,
        config: PresenceConfig,
    ) -> Self {
        let (idle_events, _) = broadcast::channel(config.event_buffer_size.max(1));
        Self {
            store,
            timers,
            clock,
            config,
            key_locks: DashMap::new(),
            owned: DashMap::new(),
            idle_events,
        }
    }

    /// Receive idle-timeout transitions.
    pub fn subscribe_idle(&self) -> broadcast::Receiver<IdleTransition> {
        self.idle_events.subscribe()
    }

    /// The clock used for every persisted timestamp.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// The idle timer registry.
    pub fn timers(&self) -> &Arc<IdleTimerRegistry> {
        &self.timers
    }

    /// Join: return the open session for the key or open a new ONLINE one,
    /// then (re)arm the idle timer.
    pub async fn start_session(self: &Arc<Self>, key: PresenceKey) -> Option<PresenceSession> {
        let _guard = self.lock_key(key).await;
        match self.try_start(key).await {
            Ok(session) => {
                self.arm_idle(key);
                Some(session)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to start presence session");
                None
            }
        }
    }

    /// Activity: flip IDLE back to ONLINE and always re-arm the idle timer.
    ///
    /// Opens a session when none is active.
    pub async fn reset_idle(self: &Arc<Self>, key: PresenceKey) -> Option<PresenceSession> {
        let _guard = self.lock_key(key).await;
        let result = self.try_reset_idle(key).await;
        self.arm_idle(key);
        match result {
            Ok(session) => Some(session),
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to record presence activity");
                None
            }
        }
    }

    /// Overwrite the status of the active session. No-op without one.
    pub async fn set_status(
        &self,
        key: PresenceKey,
        status: PresenceStatus,
    ) -> Option<PresenceSession> {
        let _guard = self.lock_key(key).await;
        match self.try_set_status(key, status).await {
            Ok(Some(session)) => Some(session),
            Ok(None) => {
                debug!(key = %key, status = %status, "No active session for status change");
                None
            }
            Err(e) => {
                warn!(key = %key, status = %status, error = %e, "Failed to set presence status");
                None
            }
        }
    }

    /// Close the active session and cancel its idle timer. No-op without one.
    pub async fn end_session(&self, key: PresenceKey) -> Option<PresenceSession> {
        let guard = self.lock_key(key).await;
        self.timers.cancel(&key);
        let result = self.try_end(key).await;
        drop(guard);
        self.prune_lock(key);

        match result {
            Ok(Some(session)) => Some(session),
            Ok(None) => {
                debug!(key = %key, "No active session to end");
                None
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to end presence session");
                None
            }
        }
    }

    /// The currently active session, as stored.
    pub async fn active_session(&self, key: PresenceKey) -> AppResult<Option<PresenceSession>> {
        self.store.find_active(key).await
    }

    /// Cancel every pending idle timer.
    pub fn shutdown(&self) {
        self.timers.cancel_all();
    }

    async fn lock_key(&self, key: PresenceKey) -> OwnedMutexGuard<()> {
        let lock = Arc::clone(self.key_locks.entry(key).or_default().value());
        lock.lock_owned().await
    }

    /// Drop the key's mutex once nobody else holds or waits on it.
    fn prune_lock(&self, key: PresenceKey) {
        self.key_locks
            .remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);
    }

    fn is_stale(&self, session: &PresenceSession, now: DateTime<Utc>) -> bool {
        let owned = self
            .owned
            .get(&session.key())
            .is_some_and(|id| *id == session.id);
        !owned && now - session.last_seen_at > self.config.stale_after()
    }

    async fn try_start(&self, key: PresenceKey) -> AppResult<PresenceSession> {
        let now = self.clock.now();

        if let Some(active) = self.store.find_active(key).await? {
            if !self.is_stale(&active, now) {
                self.owned.insert(key, active.id);
                return Ok(active);
            }
            info!(
                key = %key,
                session_id = %active.id,
                last_seen_at = %active.last_seen_at,
                "Closing abandoned presence session"
            );
            self.store.close_session(active.id, active.last_seen_at).await?;
        }

        let session = match self.store.open_session(key, now).await? {
            OpenOutcome::Created(session) => {
                info!(key = %key, session_id = %session.id, "Presence session started");
                session
            }
            OpenOutcome::Existing(session) => {
                debug!(key = %key, session_id = %session.id, "Adopted concurrently opened session");
                session
            }
        };
        self.owned.insert(key, session.id);
        Ok(session)
    }

    async fn try_reset_idle(&self, key: PresenceKey) -> AppResult<PresenceSession> {
        let now = self.clock.now();

        let active = match self.store.find_active(key).await? {
            Some(active) if !self.is_stale(&active, now) => {
                self.owned.insert(key, active.id);
                active
            }
            _ => return self.try_start(key).await,
        };

        if active.status == PresenceStatus::Idle {
            let resumed = self
                .store
                .update_status(active.id, PresenceStatus::Online, now)
                .await?
                .ok_or_else(|| closed_underneath(key))?;
            debug!(key = %key, session_id = %resumed.id, "Presence resumed from idle");
            return Ok(resumed);
        }

        self.store.touch(active.id, now).await?;
        Ok(PresenceSession {
            last_seen_at: now,
            ..active
        })
    }

    async fn try_set_status(
        &self,
        key: PresenceKey,
        status: PresenceStatus,
    ) -> AppResult<Option<PresenceSession>> {
        let Some(active) = self.store.find_active(key).await? else {
            return Ok(None);
        };
        let updated = self
            .store
            .update_status(active.id, status, self.clock.now())
            .await?;
        if let Some(session) = &updated {
            debug!(key = %key, session_id = %session.id, status = %status, "Presence status set");
        }
        Ok(updated)
    }

    async fn try_end(&self, key: PresenceKey) -> AppResult<Option<PresenceSession>> {
        let now = self.clock.now();
        let Some(active) = self.store.find_active(key).await? else {
            self.owned.remove(&key);
            return Ok(None);
        };

        let end = if self.is_stale(&active, now) {
            active.last_seen_at
        } else {
            now
        };
        let closed = self.store.close_session(active.id, end).await?;
        self.owned.remove(&key);

        if let Some(session) = &closed {
            info!(
                key = %key,
                session_id = %session.id,
                duration = session.duration,
                "Presence session ended"
            );
        }
        Ok(closed)
    }

    fn arm_idle(self: &Arc<Self>, key: PresenceKey) {
        let manager: Weak<Self> = Arc::downgrade(self);
        self.timers
            .arm(key, self.config.idle_timeout(), move |generation| async move {
                if let Some(manager) = manager.upgrade() {
                    manager.on_idle_timeout(key, generation).await;
                }
            });
    }

    async fn on_idle_timeout(&self, key: PresenceKey, generation: u64) {
        let _guard = self.lock_key(key).await;
        if !self.timers.release(&key, generation) {
            debug!(key = %key, generation, "Idle timer superseded");
            return;
        }

        match self.try_set_status(key, PresenceStatus::Idle).await {
            Ok(Some(session)) => {
                info!(key = %key, session_id = %session.id, "Presence went idle");
                let _ = self.idle_events.send(IdleTransition {
                    key,
                    session_id: session.id,
                    at: session.last_seen_at,
                });
            }
            Ok(None) => debug!(key = %key, "Idle timeout with no active session"),
            Err(e) => warn!(key = %key, error = %e, "Failed to mark presence idle"),
        }
    }
}

fn closed_underneath(key: PresenceKey) -> AppError {
    AppError::conflict(format!("Presence session for {key} closed during update"))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::TimeZone;

    use teamhub_core::clock::RuntimeClock;
    use teamhub_core::types::id::{ProjectId, UserId};
    use teamhub_database::store::MemoryPresenceStore;

    use super::*;

    fn manager(store: Arc<dyn PresenceStore>) -> Arc<SessionManager> {
        let clock = RuntimeClock::starting_at(Utc.with_ymd_and_hms(2026, 4, 6, 9, 0, 0).unwrap());
        Arc::new(SessionManager::new(
            store,
            Arc::new(IdleTimerRegistry::new()),
            Arc::new(clock),
            PresenceConfig::default(),
        ))
    }

    fn key() -> PresenceKey {
        PresenceKey::new(UserId::new(), ProjectId::new())
    }

    async fn status_of(store: &MemoryPresenceStore, key: PresenceKey) -> Option<PresenceStatus> {
        store.find_active(key).await.unwrap().map(|s| s.status)
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_is_idempotent() {
        let store = MemoryPresenceStore::new();
        let manager = manager(Arc::new(store.clone()));
        let key = key();

        let first = manager.start_session(key).await.unwrap();
        let second = manager.start_session(key).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.status, PresenceStatus::Online);
        assert_eq!(store.sessions_for_key(key).await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_then_activity_resumes_with_fresh_timer() {
        let store = MemoryPresenceStore::new();
        let manager = manager(Arc::new(store.clone()));
        let mut idle_events = manager.subscribe_idle();
        let key = key();

        manager.start_session(key).await.unwrap();
        tokio::time::sleep(Duration::from_secs(301)).await;
        assert_eq!(status_of(&store, key).await, Some(PresenceStatus::Idle));
        assert_eq!(idle_events.try_recv().unwrap().key, key);

        let resumed = manager.reset_idle(key).await.unwrap();
        assert_eq!(resumed.status, PresenceStatus::Online);
        assert!(manager.timers().is_armed(&key));

        tokio::time::sleep(Duration::from_secs(299)).await;
        assert_eq!(status_of(&store, key).await, Some(PresenceStatus::Online));
        assert!(idle_events.try_recv().is_err());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(status_of(&store, key).await, Some(PresenceStatus::Idle));
        assert_eq!(idle_events.try_recv().unwrap().key, key);
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_rearm_means_old_timer_never_fires() {
        let store = MemoryPresenceStore::new();
        let manager = manager(Arc::new(store.clone()));
        let mut idle_events = manager.subscribe_idle();
        let key = key();

        manager.start_session(key).await.unwrap();
        tokio::time::sleep(Duration::from_secs(60)).await;
        manager.reset_idle(key).await.unwrap();

        // Past the first deadline, before the second.
        tokio::time::sleep(Duration::from_secs(250)).await;
        assert_eq!(status_of(&store, key).await, Some(PresenceStatus::Online));

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(status_of(&store, key).await, Some(PresenceStatus::Idle));
        assert!(idle_events.try_recv().is_ok());
        assert!(idle_events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_keeps_focused_status() {
        let store = MemoryPresenceStore::new();
        let manager = manager(Arc::new(store.clone()));
        let key = key();

        manager.start_session(key).await.unwrap();
        let focused = manager.set_status(key, PresenceStatus::Focused).await.unwrap();
        assert_eq!(focused.status, PresenceStatus::Focused);

        let after = manager.reset_idle(key).await.unwrap();
        assert_eq!(after.status, PresenceStatus::Focused);
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_session_closes_with_one_minute() {
        let store = MemoryPresenceStore::new();
        let manager = manager(Arc::new(store.clone()));
        let key = key();

        manager.start_session(key).await.unwrap();
        tokio::time::sleep(Duration::from_secs(20)).await;
        let closed = manager.end_session(key).await.unwrap();

        assert_eq!(closed.duration, Some(1));
        assert_eq!(closed.status, PresenceStatus::Offline);
        assert!(!closed.is_active);
        assert!(!manager.timers().is_armed(&key));
        assert!(manager.end_session(key).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_cancels_idle_timer() {
        let store = MemoryPresenceStore::new();
        let manager = manager(Arc::new(store.clone()));
        let mut idle_events = manager.subscribe_idle();
        let key = key();

        manager.start_session(key).await.unwrap();
        manager.end_session(key).await.unwrap();
        tokio::time::sleep(Duration::from_secs(600)).await;

        assert!(idle_events.try_recv().is_err());
        let rows = store.sessions_for_key(key).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].closing_status, Some(PresenceStatus::Online));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_session_is_closed_and_replaced() {
        let store = MemoryPresenceStore::new();
        let manager = manager(Arc::new(store.clone()));
        let key = key();

        let now = manager.clock().now();
        let mut leftover = PresenceSession::open(key, now - chrono::Duration::hours(3));
        leftover.last_seen_at = now - chrono::Duration::hours(2);
        store.insert(leftover.clone()).await;

        let fresh = manager.start_session(key).await.unwrap();
        assert_ne!(fresh.id, leftover.id);
        assert_eq!(fresh.session_start, now);

        let rows = store.sessions_for_key(key).await;
        let old = rows.iter().find(|s| s.id == leftover.id).unwrap();
        assert!(!old.is_active);
        assert_eq!(old.session_end, Some(leftover.last_seen_at));
        assert_eq!(old.duration, Some(60));
        assert_eq!(store.active_count(key).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recent_foreign_session_is_adopted() {
        let store = MemoryPresenceStore::new();
        let manager = manager(Arc::new(store.clone()));
        let key = key();

        let now = manager.clock().now();
        let recent = PresenceSession::open(key, now - chrono::Duration::minutes(10));
        store.insert(recent.clone()).await;

        let session = manager.start_session(key).await.unwrap();
        assert_eq!(session.id, recent.id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_without_session_reopens() {
        let store = MemoryPresenceStore::new();
        let manager = manager(Arc::new(store.clone()));
        let key = key();

        let session = manager.reset_idle(key).await.unwrap();
        assert_eq!(session.status, PresenceStatus::Online);
        assert_eq!(store.active_count(key).await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_status_without_session_is_noop() {
        let store = MemoryPresenceStore::new();
        let manager = manager(Arc::new(store.clone()));

        assert!(manager.set_status(key(), PresenceStatus::Focused).await.is_none());
        assert!(store.all().await.is_empty());
    }

    #[derive(Debug)]
    struct FailingStore;

    #[async_trait]
    impl PresenceStore for FailingStore {
        async fn find_active(&self, _: PresenceKey) -> AppResult<Option<PresenceSession>> {
            Err(AppError::database("connection reset"))
        }

        async fn open_session(&self, _: PresenceKey, _: DateTime<Utc>) -> AppResult<OpenOutcome> {
            Err(AppError::database("connection reset"))
        }

        async fn update_status(
            &self,
            _: PresenceSessionId,
            _: PresenceStatus,
            _: DateTime<Utc>,
        ) -> AppResult<Option<PresenceSession>> {
            Err(AppError::database("connection reset"))
        }

        async fn touch(&self, _: PresenceSessionId, _: DateTime<Utc>) -> AppResult<()> {
            Err(AppError::database("connection reset"))
        }

        async fn close_session(
            &self,
            _: PresenceSessionId,
            _: DateTime<Utc>,
        ) -> AppResult<Option<PresenceSession>> {
            Err(AppError::database("connection reset"))
        }

        async fn sessions_for_members(
            &self,
            _: ProjectId,
            _: &[UserId],
        ) -> AppResult<Vec<PresenceSession>> {
            Err(AppError::database("connection reset"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_failures_are_swallowed() {
        let manager = manager(Arc::new(FailingStore));
        let key = key();

        assert!(manager.start_session(key).await.is_none());
        assert!(manager.reset_idle(key).await.is_none());
        assert!(manager.set_status(key, PresenceStatus::Focused).await.is_none());
        assert!(manager.end_session(key).await.is_none());

        // The idle callback also fails quietly.
        tokio::time::sleep(Duration::from_secs(400)).await;
    }
}
