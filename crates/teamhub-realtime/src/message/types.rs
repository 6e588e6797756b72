//! Inbound and outbound WebSocket message type definitions.
//!
//! Frames are JSON objects tagged by `type`:
//!
//! ```json
//! {"type":"join","user_id":"…","project_id":"…"}
//! {"type":"presence","user_id":"…","project_id":"…","status":"IDLE","timestamp":"…"}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use teamhub_core::types::id::{ProjectId, UserId};
use teamhub_entity::presence::{PresenceKey, PresenceStatus};

/// Messages sent by the client to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// Join a project's room, starting or resuming the presence session.
    Join {
        /// Joining user.
        user_id: UserId,
        /// Project (room) to join.
        project_id: ProjectId,
    },
    /// User input observed on the client.
    Activity {
        /// Active user.
        user_id: UserId,
        /// Project the activity belongs to.
        project_id: ProjectId,
    },
    /// Explicit status change (focus mode, local idle timeout).
    StatusUpdate {
        /// User changing status.
        user_id: UserId,
        /// Project the status applies to.
        project_id: ProjectId,
        /// Requested status.
        status: PresenceStatus,
    },
    /// Chat message to rebroadcast to the room.
    ChatSend {
        /// Target room.
        project_id: ProjectId,
        /// Opaque chat payload.
        message: serde_json::Value,
    },
    /// Leave the current room without closing the socket.
    Leave,
    /// Pong response to server ping.
    Pong {
        /// Echoed ping timestamp.
        #[serde(default)]
        timestamp: Option<i64>,
    },
}

/// Messages sent by the server to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// A member's presence changed.
    Presence {
        /// Member user ID.
        user_id: UserId,
        /// Room the change applies to.
        project_id: ProjectId,
        /// New status.
        status: PresenceStatus,
        /// When the change was recorded.
        timestamp: DateTime<Utc>,
    },
    /// Chat message relayed to the room.
    ChatNew {
        /// Room.
        project_id: ProjectId,
        /// Payload exactly as sent.
        message: serde_json::Value,
    },
    /// Ping (server keepalive).
    Ping {
        /// Server timestamp in milliseconds.
        timestamp: i64,
    },
    /// Error message.
    Error {
        /// Error code.
        code: String,
        /// Error description.
        message: String,
    },
}

impl OutboundMessage {
    /// Presence update for a key.
    pub fn presence(key: PresenceKey, status: PresenceStatus, timestamp: DateTime<Utc>) -> Self {
        Self::Presence {
            user_id: key.user_id,
            project_id: key.project_id,
            status,
            timestamp,
        }
    }

    /// Error reply.
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Error codes carried by [`OutboundMessage::Error`].
pub mod error_codes {
    /// Frame could not be parsed.
    pub const INVALID_MESSAGE: &str = "INVALID_MESSAGE";
    /// Frame exceeded the size limit.
    pub const MESSAGE_TOO_LARGE: &str = "MESSAGE_TOO_LARGE";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbound_wire_format() {
        let user = UserId::new();
        let project = ProjectId::new();
        let raw = format!(
            r#"{{"type":"status_update","user_id":"{user}","project_id":"{project}","status":"FOCUSED"}}"#
        );
        let parsed: InboundMessage = serde_json::from_str(&raw).unwrap();
        assert_eq!(
            parsed,
            InboundMessage::StatusUpdate {
                user_id: user,
                project_id: project,
                status: PresenceStatus::Focused,
            }
        );
    }

    #[test]
    fn test_unit_and_optional_variants() {
        let leave: InboundMessage = serde_json::from_str(r#"{"type":"leave"}"#).unwrap();
        assert_eq!(leave, InboundMessage::Leave);

        let pong: InboundMessage = serde_json::from_str(r#"{"type":"pong"}"#).unwrap();
        assert_eq!(pong, InboundMessage::Pong { timestamp: None });
    }

    #[test]
    fn test_presence_serializes_screaming_status() {
        let key = PresenceKey::new(UserId::new(), ProjectId::new());
        let msg = OutboundMessage::presence(key, PresenceStatus::Offline, Utc::now());
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "presence");
        assert_eq!(json["status"], "OFFLINE");
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        assert!(serde_json::from_str::<InboundMessage>(r#"{"type":"subscribe"}"#).is_err());
    }
}
