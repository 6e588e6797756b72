//! Read-side presence value objects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use teamhub_core::types::id::{ProjectId, UserId};

use super::PresenceStatus;

/// Per-project presence view at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenceSnapshot {
    /// Project the snapshot describes.
    pub project_id: ProjectId,
    /// When the snapshot was computed.
    pub generated_at: DateTime<Utc>,
    /// One entry per accepted member.
    pub members: Vec<MemberPresence>,
}

impl PresenceSnapshot {
    /// Look up a member entry.
    pub fn member(&self, user_id: UserId) -> Option<&MemberPresence> {
        self.members.iter().find(|m| m.user_id == user_id)
    }
}

/// Presence entry for one project member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberPresence {
    /// Member user ID.
    pub user_id: UserId,
    /// Display name.
    pub name: String,
    /// Avatar URL, if the member has one.
    pub avatar_url: Option<String>,
    /// Status of the most recently started session.
    pub status: PresenceStatus,
    /// Last activity of the most recently started session.
    pub last_active: LastActive,
    /// Productive minutes across all sessions.
    pub total_active_minutes: i64,
    /// Productive minutes in sessions started today.
    pub today_active_minutes: i64,
}

/// Caller-scoped minute summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivitySummary {
    /// The user.
    pub user_id: UserId,
    /// The project.
    pub project_id: ProjectId,
    /// Productive minutes across all sessions.
    pub total_active_minutes: i64,
    /// Productive minutes in sessions started today.
    pub today_active_minutes: i64,
}

/// Last activity timestamp, or `"Never"` for members with no history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LastActive {
    /// The member has never had a session in this project.
    Never,
    /// Timestamp of the member's last observed activity.
    At(DateTime<Utc>),
}

const NEVER: &str = "Never";

impl Serialize for LastActive {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Never => serializer.serialize_str(NEVER),
            Self::At(at) => at.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for LastActive {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw == NEVER {
            return Ok(Self::Never);
        }
        DateTime::parse_from_rfc3339(&raw)
            .map(|at| Self::At(at.with_timezone(&Utc)))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_last_active_never_sentinel() {
        assert_eq!(serde_json::to_string(&LastActive::Never).unwrap(), "\"Never\"");
        let parsed: LastActive = serde_json::from_str("\"Never\"").unwrap();
        assert_eq!(parsed, LastActive::Never);
    }

    #[test]
    fn test_last_active_timestamp() {
        let at = Utc.with_ymd_and_hms(2026, 1, 15, 8, 30, 0).unwrap();
        let json = serde_json::to_string(&LastActive::At(at)).unwrap();
        let parsed: LastActive = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, LastActive::At(at));
    }
}
