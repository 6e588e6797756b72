//! Client side of the hub's JSON wire protocol.
//!
//! Frames are objects tagged by `type`. Room broadcasts additionally carry
//! `id`, `room` and a per-room `seq`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use teamhub_core::types::id::{ProjectId, UserId};
use teamhub_entity::presence::PresenceStatus;

/// Events the agent sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Join a project room.
    Join {
        /// Local user.
        user_id: UserId,
        /// Project to join.
        project_id: ProjectId,
    },
    /// Debounced user input.
    Activity {
        /// Local user.
        user_id: UserId,
        /// Joined project.
        project_id: ProjectId,
    },
    /// Explicit status change.
    StatusUpdate {
        /// Local user.
        user_id: UserId,
        /// Joined project.
        project_id: ProjectId,
        /// New status.
        status: PresenceStatus,
    },
    /// Leave the room before closing.
    Leave,
    /// Reply to a server ping.
    Pong {
        /// Echoed ping timestamp.
        timestamp: Option<i64>,
    },
}

/// Events the hub sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// A member's presence changed.
    Presence {
        /// Member.
        user_id: UserId,
        /// Room.
        project_id: ProjectId,
        /// Confirmed status.
        status: PresenceStatus,
        /// Server time of the change.
        timestamp: DateTime<Utc>,
    },
    /// Chat relay.
    ChatNew {
        /// Room.
        project_id: ProjectId,
        /// Opaque payload.
        message: serde_json::Value,
    },
    /// Keepalive.
    Ping {
        /// Server time in milliseconds.
        timestamp: i64,
    },
    /// The hub rejected a frame.
    Error {
        /// Error code.
        code: String,
        /// Description.
        message: String,
    },
}

/// One inbound frame. `seq` is present on room broadcasts only.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerFrame {
    /// Per-room sequence number.
    #[serde(default)]
    pub seq: Option<u64>,
    /// The event.
    #[serde(flatten)]
    pub event: ServerEvent,
}

impl From<ServerEvent> for ServerFrame {
    fn from(event: ServerEvent) -> Self {
        Self { seq: None, event }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_event_wire_format() {
        let user_id = UserId::new();
        let project_id = ProjectId::new();
        let json = serde_json::to_value(ClientEvent::StatusUpdate {
            user_id,
            project_id,
            status: PresenceStatus::Idle,
        })
        .unwrap();

        assert_eq!(json["type"], "status_update");
        assert_eq!(json["status"], "IDLE");
        assert_eq!(json["user_id"], user_id.to_string());

        let leave = serde_json::to_value(ClientEvent::Leave).unwrap();
        assert_eq!(leave, serde_json::json!({"type": "leave"}));
    }

    #[test]
    fn test_broadcast_frame_parses_with_envelope_fields() {
        let user_id = UserId::new();
        let project_id = ProjectId::new();
        let raw = serde_json::json!({
            "id": "5f0c6b53-8f43-4c55-9f7c-0d1f1c1c8f00",
            "room": project_id,
            "seq": 7,
            "type": "presence",
            "user_id": user_id,
            "project_id": project_id,
            "status": "ONLINE",
            "timestamp": "2026-04-06T09:00:00Z",
        });

        let frame: ServerFrame = serde_json::from_value(raw).unwrap();
        assert_eq!(frame.seq, Some(7));
        assert!(matches!(
            frame.event,
            ServerEvent::Presence { status: PresenceStatus::Online, .. }
        ));
    }

    #[test]
    fn test_direct_frame_has_no_seq() {
        let frame: ServerFrame =
            serde_json::from_str(r#"{"type":"ping","timestamp":1712394000000}"#).unwrap();
        assert_eq!(frame.seq, None);
        assert_eq!(frame.event, ServerEvent::Ping { timestamp: 1712394000000 });
    }
}
