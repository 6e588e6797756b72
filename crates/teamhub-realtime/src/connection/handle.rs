//! Individual WebSocket connection handle.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::{RwLock, mpsc};
use tokio_util::sync::CancellationToken;

use teamhub_core::types::id::ConnectionId;

/// A handle to a single WebSocket connection (one browser tab).
///
/// Holds the sender for pushing serialized frames to the client's write
/// loop, plus heartbeat bookkeeping. The handle knows nothing about rooms;
/// membership lives in the hub.
#[derive(Debug)]
pub struct ConnectionHandle {
    /// Unique connection ID
    pub id: ConnectionId,
    /// Sender for outbound frames
    sender: mpsc::Sender<String>,
    /// Last pong received
    last_pong: RwLock<DateTime<Utc>>,
    /// Whether the connection is still alive
    alive: AtomicBool,
    /// Cancelled when the server gives up on this connection
    closed: CancellationToken,
}

impl ConnectionHandle {
    /// Create a new connection handle
    pub fn new(sender: mpsc::Sender<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: ConnectionId::new(),
            sender,
            last_pong: RwLock::new(now),
            alive: AtomicBool::new(true),
            closed: CancellationToken::new(),
        }
    }

    /// Queue a frame for this connection. Never waits.
    pub fn send(&self, frame: String) -> bool {
        if !self.is_alive() {
            return false;
        }
        match self.sender.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(conn_id = %self.id, "Send buffer full, dropping frame");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.mark_dead();
                false
            }
        }
    }

    /// Check if connection is alive
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Mark connection as dead and wake its socket loop.
    pub fn mark_dead(&self) {
        self.alive.store(false, Ordering::SeqCst);
        self.closed.cancel();
    }

    /// Token cancelled once the connection is marked dead.
    pub fn closed(&self) -> CancellationToken {
        self.closed.clone()
    }

    /// Record a pong response
    pub async fn record_pong(&self, at: DateTime<Utc>) {
        *self.last_pong.write().await = at;
    }

    /// Last pong received (connection time if none yet)
    pub async fn last_pong(&self) -> DateTime<Utc> {
        *self.last_pong.read().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_after_receiver_dropped_marks_dead() {
        let (tx, rx) = mpsc::channel(1);
        let handle = ConnectionHandle::new(tx, Utc::now());
        let closed = handle.closed();
        drop(rx);

        assert!(!handle.send("{}".to_string()));
        assert!(!handle.is_alive());
        assert!(closed.is_cancelled());
    }

    #[tokio::test]
    async fn test_full_buffer_drops_frame_but_stays_alive() {
        let (tx, _rx) = mpsc::channel(1);
        let handle = ConnectionHandle::new(tx, Utc::now());

        assert!(handle.send("a".to_string()));
        assert!(!handle.send("b".to_string()));
        assert!(handle.is_alive());
    }
}
