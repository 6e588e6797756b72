//! Connection hub: maps connections to presence keys, drives the session
//! manager and broadcasts room-scoped events.

use std::collections::HashSet;
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use teamhub_core::clock::Clock;
use teamhub_core::config::RealtimeConfig;
use teamhub_core::types::id::{ConnectionId, ProjectId};
use teamhub_database::store::ProjectDirectory;
use teamhub_entity::presence::{PresenceKey, PresenceSession, PresenceStatus};

use crate::message::envelope::MessageEnvelope;
use crate::message::types::{InboundMessage, OutboundMessage, error_codes};
use crate::message::validator::validate_inbound;
use crate::metrics::RealtimeMetrics;
use crate::presence::session_manager::{IdleTransition, SessionManager};

use super::handle::ConnectionHandle;
use super::heartbeat::{HeartbeatConfig, HeartbeatExit, run_heartbeat};
use super::pool::ConnectionPool;
use super::room::{Room, RoomState};

/// Real-time hub for every live connection of this process.
///
/// Membership maps are only mutated while holding the lock of the room the
/// key belongs to. Lock order is room, then the session manager's key lock.
#[derive(Debug)]
pub struct ConnectionHub {
    pool: Arc<ConnectionPool>,
    sessions: Arc<SessionManager>,
    directory: Arc<dyn ProjectDirectory>,
    clock: Arc<dyn Clock>,
    metrics: Arc<RealtimeMetrics>,
    config: RealtimeConfig,
    /// Connection → the key it joined.
    memberships: DashMap<ConnectionId, PresenceKey>,
    /// Key → live connections (tabs) joined as that key.
    by_key: DashMap<PresenceKey, HashSet<ConnectionId>>,
    rooms: DashMap<ProjectId, Arc<Room>>,
}

impl ConnectionHub {
    /// Creates a new connection hub.
    pub fn new(
        config: RealtimeConfig,
        sessions: Arc<SessionManager>,
        directory: Arc<dyn ProjectDirectory>,
        metrics: Arc<RealtimeMetrics>,
    ) -> Self {
        let clock = Arc::clone(sessions.clock());
        Self {
            pool: Arc::new(ConnectionPool::new()),
            sessions,
            directory,
            clock,
            metrics,
            config,
            memberships: DashMap::new(),
            by_key: DashMap::new(),
            rooms: DashMap::new(),
        }
    }

    /// Registers a new transport connection.
    ///
    /// Returns the handle and the receiver the socket write loop drains.
    /// Starts the ping/pong heartbeat unless `ping_interval_seconds` is 0.
    pub fn register(self: &Arc<Self>) -> (Arc<ConnectionHandle>, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(self.config.channel_buffer_size.max(1));
        let handle = Arc::new(ConnectionHandle::new(tx, self.clock.now()));

        self.pool.add(Arc::clone(&handle));
        self.metrics.connection_opened();

        if self.config.ping_interval_seconds > 0 {
            let hub: Weak<Self> = Arc::downgrade(self);
            let beat = run_heartbeat(
                Arc::clone(&handle),
                HeartbeatConfig::from(&self.config),
                Arc::clone(&self.clock),
            );
            let conn_id = handle.id;
            tokio::spawn(async move {
                if beat.await != HeartbeatExit::TimedOut {
                    return;
                }
                if let Some(hub) = hub.upgrade() {
                    hub.unregister(&conn_id).await;
                }
            });
        }

        info!(conn_id = %handle.id, "WebSocket connection registered");
        (handle, rx)
    }

    /// Unregisters a connection, applying the last-tab rule to its key.
    pub async fn unregister(&self, conn_id: &ConnectionId) {
        let Some(handle) = self.pool.remove(conn_id) else {
            return;
        };
        handle.mark_dead();
        self.metrics.connection_closed();
        self.detach(conn_id).await;
        info!(conn_id = %conn_id, "WebSocket connection unregistered");
    }

    /// Processes one inbound text frame from a client.
    pub async fn handle_inbound(&self, conn_id: &ConnectionId, raw: &str) {
        let Some(handle) = self.pool.get(conn_id) else {
            warn!(conn_id = %conn_id, "Message from unknown connection");
            return;
        };
        self.metrics.message_received();

        if let Err(e) = validate_inbound(raw, self.config.max_message_size) {
            let code = if raw.len() > self.config.max_message_size {
                error_codes::MESSAGE_TOO_LARGE
            } else {
                error_codes::INVALID_MESSAGE
            };
            self.reject(&handle, code, e.message);
            return;
        }

        let msg: InboundMessage = match serde_json::from_str(raw) {
            Ok(m) => m,
            Err(e) => {
                self.reject(
                    &handle,
                    error_codes::INVALID_MESSAGE,
                    format!("Failed to parse message: {e}"),
                );
                return;
            }
        };

        match msg {
            InboundMessage::Join {
                user_id,
                project_id,
            } => {
                self.join(&handle, PresenceKey::new(user_id, project_id))
                    .await;
            }
            InboundMessage::Activity {
                user_id,
                project_id,
            } => {
                self.activity(conn_id, PresenceKey::new(user_id, project_id))
                    .await;
            }
            InboundMessage::StatusUpdate {
                user_id,
                project_id,
                status,
            } => {
                self.status_update(conn_id, PresenceKey::new(user_id, project_id), status)
                    .await;
            }
            InboundMessage::ChatSend {
                project_id,
                message,
            } => {
                self.chat(conn_id, project_id, message).await;
            }
            InboundMessage::Leave => {
                self.detach(conn_id).await;
            }
            InboundMessage::Pong { .. } => {
                handle.record_pong(self.clock.now()).await;
            }
        }
    }

    /// Start a session outside of a socket and tell the room.
    pub async fn start_presence(&self, key: PresenceKey) -> Option<PresenceSession> {
        let room = self.room(key.project_id);
        let mut state = room.lock().await;
        let session = self.sessions.start_session(key).await?;
        self.broadcast_presence(&mut state, key, session.status);
        Some(session)
    }

    /// End a session outside of a socket and tell the room.
    ///
    /// Returns `None` without ending anything while the key still has live
    /// connections.
    pub async fn end_presence(&self, key: PresenceKey) -> Option<PresenceSession> {
        let room = self.room(key.project_id);
        let mut state = room.lock().await;
        if self.live_connections(&key) > 0 {
            debug!(key = %key, "Session end skipped, connections still open");
            return None;
        }
        let closed = self.sessions.end_session(key).await;
        if closed.is_some() {
            self.broadcast_presence(&mut state, key, PresenceStatus::Offline);
        }
        closed
    }

    /// Relay idle transitions from the session manager to the rooms until
    /// shutdown.
    pub fn spawn_idle_forwarder(
        self: &Arc<Self>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        let hub = Arc::clone(self);
        let mut idle_events = self.sessions.subscribe_idle();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.recv() => break,
                    event = idle_events.recv() => match event {
                        Ok(transition) => hub.forward_idle(transition).await,
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Idle forwarder lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
            debug!("Idle forwarder stopped");
        })
    }

    /// End every tracked session and drop all connections.
    pub async fn close_all(&self) {
        let keys: Vec<PresenceKey> = self.by_key.iter().map(|e| *e.key()).collect();
        for key in keys {
            let room = self.room(key.project_id);
            let mut state = room.lock().await;
            if let Some((_, conns)) = self.by_key.remove(&key) {
                for conn_id in &conns {
                    self.memberships.remove(conn_id);
                    state.remove(conn_id);
                }
                self.sessions.end_session(key).await;
                self.broadcast_presence(&mut state, key, PresenceStatus::Offline);
            }
        }

        let all = self.pool.all_connections();
        for conn in &all {
            conn.mark_dead();
            self.pool.remove(&conn.id);
            self.metrics.connection_closed();
        }
        info!(count = all.len(), "All connections closed");
    }

    /// Returns the total connection count.
    pub fn connection_count(&self) -> usize {
        self.pool.connection_count()
    }

    /// Live connections joined as `key`.
    pub fn live_connections(&self, key: &PresenceKey) -> usize {
        self.by_key.get(key).map(|set| set.len()).unwrap_or(0)
    }

    /// The key a connection joined, if any.
    pub fn membership(&self, conn_id: &ConnectionId) -> Option<PresenceKey> {
        self.memberships.get(conn_id).map(|k| *k)
    }

    /// Returns the metrics collector.
    pub fn metrics(&self) -> &Arc<RealtimeMetrics> {
        &self.metrics
    }

    /// Returns the session manager.
    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    async fn join(&self, handle: &ConnectionHandle, key: PresenceKey) {
        match self
            .directory
            .is_accepted_member(key.project_id, key.user_id)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                debug!(conn_id = %handle.id, key = %key, "Join ignored, not an accepted member");
                return;
            }
            Err(e) => {
                warn!(conn_id = %handle.id, key = %key, error = %e, "Join ignored, membership lookup failed");
                return;
            }
        }

        if self.membership(&handle.id).is_some_and(|previous| previous != key) {
            self.detach(&handle.id).await;
        }

        // Claim the membership before taking the room lock so a concurrent
        // disconnect either sees it and waits, or has already marked the
        // handle dead.
        self.memberships.insert(handle.id, key);
        if !handle.is_alive() {
            self.memberships.remove_if(&handle.id, |_, k| *k == key);
            return;
        }

        let room = self.room(key.project_id);
        let mut state = room.lock().await;
        if !handle.is_alive() || self.membership(&handle.id) != Some(key) {
            return;
        }

        state.insert(handle.id);
        self.by_key.entry(key).or_default().insert(handle.id);

        let status = self
            .sessions
            .start_session(key)
            .await
            .map(|s| s.status)
            .unwrap_or(PresenceStatus::Online);
        self.broadcast_presence(&mut state, key, status);
        info!(conn_id = %handle.id, key = %key, status = %status, "Connection joined room");
    }

    async fn activity(&self, conn_id: &ConnectionId, key: PresenceKey) {
        let room = self.room(key.project_id);
        let mut state = room.lock().await;
        if !self.is_member_as(conn_id, key) {
            return;
        }

        let status = self
            .sessions
            .reset_idle(key)
            .await
            .map(|s| s.status)
            .unwrap_or(PresenceStatus::Online);
        self.broadcast_presence(&mut state, key, status);
    }

    async fn status_update(&self, conn_id: &ConnectionId, key: PresenceKey, status: PresenceStatus) {
        let room = self.room(key.project_id);
        let mut state = room.lock().await;
        if !self.is_member_as(conn_id, key) {
            return;
        }

        let status = self
            .sessions
            .set_status(key, status)
            .await
            .map(|s| s.status)
            .unwrap_or(status);
        self.broadcast_presence(&mut state, key, status);
    }

    async fn chat(&self, conn_id: &ConnectionId, project_id: ProjectId, message: serde_json::Value) {
        let room = self.room(project_id);
        let mut state = room.lock().await;
        if self.membership(conn_id).map(|k| k.project_id) != Some(project_id) {
            debug!(conn_id = %conn_id, project_id = %project_id, "Chat ignored, not in room");
            return;
        }

        self.broadcast(
            &mut state,
            project_id,
            OutboundMessage::ChatNew {
                project_id,
                message,
            },
        );
    }

    /// Remove a connection from its room. Ends the session and broadcasts
    /// OFFLINE only when it was the key's last live connection.
    async fn detach(&self, conn_id: &ConnectionId) {
        let Some(key) = self.membership(conn_id) else {
            return;
        };

        let room = self.room(key.project_id);
        let mut state = room.lock().await;
        if self
            .memberships
            .remove_if(conn_id, |_, k| *k == key)
            .is_none()
        {
            return;
        }
        state.remove(conn_id);

        let mut was_attached = false;
        let mut last = false;
        if let Some(mut conns) = self.by_key.get_mut(&key) {
            was_attached = conns.remove(conn_id);
            last = conns.is_empty();
        }
        if last {
            self.by_key.remove_if(&key, |_, conns| conns.is_empty());
        }

        if was_attached && last {
            self.sessions.end_session(key).await;
            self.broadcast_presence(&mut state, key, PresenceStatus::Offline);
            info!(conn_id = %conn_id, key = %key, "Last connection left, session ended");
        } else {
            debug!(conn_id = %conn_id, key = %key, "Connection left room");
        }

        let empty = state.is_empty();
        drop(state);
        drop(room);
        if empty {
            self.rooms.remove_if(&key.project_id, |_, room| {
                Arc::strong_count(room) == 1 && room.is_idle_and_empty()
            });
        }
    }

    async fn forward_idle(&self, transition: IdleTransition) {
        let key = transition.key;
        let room = self.room(key.project_id);
        let mut state = room.lock().await;

        // A resume may have been broadcast since the timer fired.
        match self.sessions.active_session(key).await {
            Ok(Some(session)) if session.status == PresenceStatus::Idle => {
                self.broadcast_presence(&mut state, key, PresenceStatus::Idle);
            }
            Ok(_) => debug!(key = %key, "Idle transition superseded before broadcast"),
            Err(e) => warn!(key = %key, error = %e, "Failed to confirm idle transition"),
        }
    }

    fn is_member_as(&self, conn_id: &ConnectionId, key: PresenceKey) -> bool {
        match self.membership(conn_id) {
            Some(joined) if joined == key => true,
            Some(joined) => {
                debug!(conn_id = %conn_id, joined = %joined, claimed = %key, "Event ignored, key mismatch");
                false
            }
            None => {
                debug!(conn_id = %conn_id, key = %key, "Event ignored, connection has not joined");
                false
            }
        }
    }

    fn room(&self, project_id: ProjectId) -> Arc<Room> {
        Arc::clone(self.rooms.entry(project_id).or_default().value())
    }

    fn broadcast_presence(&self, state: &mut RoomState, key: PresenceKey, status: PresenceStatus) {
        self.metrics.presence_broadcast();
        self.broadcast(
            state,
            key.project_id,
            OutboundMessage::presence(key, status, self.clock.now()),
        );
    }

    fn broadcast(&self, state: &mut RoomState, project_id: ProjectId, message: OutboundMessage) {
        let envelope = MessageEnvelope::new(project_id, state.next_seq(), message);
        let frame = match serde_json::to_string(&envelope) {
            Ok(f) => f,
            Err(e) => {
                error!(error = %e, "Failed to serialize broadcast message");
                return;
            }
        };

        let mut sent = 0u64;
        for conn_id in state.members() {
            let delivered = self
                .pool
                .get(conn_id)
                .is_some_and(|handle| handle.send(frame.clone()));
            if delivered {
                sent += 1;
            }
        }
        self.metrics.messages_sent(sent);
    }

    fn reject(&self, handle: &ConnectionHandle, code: &str, message: String) {
        self.metrics.frame_rejected();
        debug!(conn_id = %handle.id, code, "Rejected inbound frame");
        match serde_json::to_string(&OutboundMessage::error(code, message)) {
            Ok(frame) => {
                handle.send(frame);
            }
            Err(e) => error!(error = %e, "Failed to serialize error reply"),
        }
    }
}
