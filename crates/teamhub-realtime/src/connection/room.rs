//! Per-project broadcast room.

use std::collections::HashSet;

use tokio::sync::{Mutex, MutexGuard};

use teamhub_core::types::id::ConnectionId;

/// Broadcast group of one project.
///
/// The mutex is held for the whole handling of an event in the room, from
/// the session transition through the broadcast, so every member observes
/// the room's broadcasts in processing order.
#[derive(Debug, Default)]
pub struct Room {
    state: Mutex<RoomState>,
}

/// Members and sequence counter of a room.
#[derive(Debug, Default)]
pub struct RoomState {
    members: HashSet<ConnectionId>,
    seq: u64,
}

impl Room {
    /// Wait for exclusive access to the room.
    pub async fn lock(&self) -> MutexGuard<'_, RoomState> {
        self.state.lock().await
    }

    /// Whether the room has no members, without waiting.
    ///
    /// A room that is currently locked counts as busy, not empty.
    pub fn is_idle_and_empty(&self) -> bool {
        self.state
            .try_lock()
            .is_ok_and(|state| state.members.is_empty())
    }
}

impl RoomState {
    /// Add a connection. Returns `false` if it was already a member.
    pub fn insert(&mut self, conn_id: ConnectionId) -> bool {
        self.members.insert(conn_id)
    }

    /// Remove a connection. Returns `false` if it was not a member.
    pub fn remove(&mut self, conn_id: &ConnectionId) -> bool {
        self.members.remove(conn_id)
    }

    /// Current members.
    pub fn members(&self) -> impl Iterator<Item = &ConnectionId> {
        self.members.iter()
    }

    /// Whether the room has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Sequence number for the next broadcast.
    pub fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sequence_increases_per_broadcast() {
        let room = Room::default();
        let mut state = room.lock().await;
        assert_eq!(state.next_seq(), 1);
        assert_eq!(state.next_seq(), 2);
    }

    #[tokio::test]
    async fn test_locked_room_is_not_pruned() {
        let room = Room::default();
        assert!(room.is_idle_and_empty());

        let mut state = room.lock().await;
        assert!(!room.is_idle_and_empty());
        state.insert(ConnectionId::new());
        drop(state);
        assert!(!room.is_idle_and_empty());
    }
}
