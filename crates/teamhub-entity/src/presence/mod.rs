//! Presence domain entities.

pub mod model;
pub mod snapshot;

pub use model::PresenceSession;
pub use snapshot::{ActivitySummary, LastActive, MemberPresence, PresenceSnapshot};

use serde::{Deserialize, Serialize};

use teamhub_core::types::id::{ProjectId, UserId};

/// Presence status of a user within a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(
    feature = "sqlx",
    sqlx(type_name = "presence_status", rename_all = "lowercase")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PresenceStatus {
    /// Connected and recently active.
    Online,
    /// Connected but inactive past the idle timeout.
    Idle,
    /// Connected and explicitly in focus mode.
    Focused,
    /// Not connected, or explicitly hidden.
    Offline,
}

impl PresenceStatus {
    /// Whether time spent in this status counts toward productivity totals.
    pub fn is_productive(&self) -> bool {
        matches!(self, Self::Online | Self::Focused)
    }

    /// Return the status as its wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "ONLINE",
            Self::Idle => "IDLE",
            Self::Focused => "FOCUSED",
            Self::Offline => "OFFLINE",
        }
    }
}

impl std::fmt::Display for PresenceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PresenceStatus {
    type Err = teamhub_core::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ONLINE" => Ok(Self::Online),
            "IDLE" => Ok(Self::Idle),
            "FOCUSED" => Ok(Self::Focused),
            "OFFLINE" => Ok(Self::Offline),
            _ => Err(teamhub_core::AppError::validation(format!(
                "Invalid presence status: '{s}'"
            ))),
        }
    }
}

/// Composite key of a presence session: one user within one project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresenceKey {
    /// The user.
    pub user_id: UserId,
    /// The project (room).
    pub project_id: ProjectId,
}

impl PresenceKey {
    /// Build a key.
    pub fn new(user_id: UserId, project_id: ProjectId) -> Self {
        Self {
            user_id,
            project_id,
        }
    }
}

impl std::fmt::Display for PresenceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.user_id, self.project_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_wire_format() {
        let json = serde_json::to_string(&PresenceStatus::Focused).unwrap();
        assert_eq!(json, "\"FOCUSED\"");
        let parsed: PresenceStatus = serde_json::from_str("\"IDLE\"").unwrap();
        assert_eq!(parsed, PresenceStatus::Idle);
    }

    #[test]
    fn test_status_from_str_is_case_insensitive() {
        assert_eq!(
            "online".parse::<PresenceStatus>().unwrap(),
            PresenceStatus::Online
        );
        assert!("away".parse::<PresenceStatus>().is_err());
    }

    #[test]
    fn test_productive_statuses() {
        assert!(PresenceStatus::Online.is_productive());
        assert!(PresenceStatus::Focused.is_productive());
        assert!(!PresenceStatus::Idle.is_productive());
        assert!(!PresenceStatus::Offline.is_productive());
    }
}
