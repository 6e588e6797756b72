//! Presence session entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use teamhub_core::types::id::{PresenceSessionId, ProjectId, UserId};

use super::{PresenceKey, PresenceStatus};

/// One continuous presence interval of a user in a project.
///
/// At most one row per (user, project) has `is_active = true`; the
/// database enforces this with a partial unique index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PresenceSession {
    /// Unique session identifier.
    pub id: PresenceSessionId,
    /// The user this interval belongs to.
    pub user_id: UserId,
    /// The project this interval belongs to.
    pub project_id: ProjectId,
    /// Current status (OFFLINE once closed).
    pub status: PresenceStatus,
    /// When the interval opened. Never changes.
    pub session_start: DateTime<Utc>,
    /// When the interval closed; `None` while open.
    pub session_end: Option<DateTime<Utc>>,
    /// Whole minutes, set exactly once on close.
    pub duration: Option<i32>,
    /// Whether this is the open interval for its key.
    pub is_active: bool,
    /// Last transition or heartbeat observed for this interval.
    pub last_seen_at: DateTime<Utc>,
    /// Status in effect at the moment the interval was closed.
    pub closing_status: Option<PresenceStatus>,
}

impl PresenceSession {
    /// Build a fresh ONLINE interval starting at `now`.
    pub fn open(key: PresenceKey, now: DateTime<Utc>) -> Self {
        Self {
            id: PresenceSessionId::new(),
            user_id: key.user_id,
            project_id: key.project_id,
            status: PresenceStatus::Online,
            session_start: now,
            session_end: None,
            duration: None,
            is_active: true,
            last_seen_at: now,
            closing_status: None,
        }
    }

    /// The (user, project) key of this interval.
    pub fn key(&self) -> PresenceKey {
        PresenceKey::new(self.user_id, self.project_id)
    }

    /// Status used for productivity accounting.
    ///
    /// Closed rows carry OFFLINE, so the status in effect at close time is
    /// preferred when it was recorded. The whole row is judged by this one
    /// status: a row that closed while IDLE counts nothing, including the
    /// active stretch before it went idle.
    pub fn accounting_status(&self) -> PresenceStatus {
        self.closing_status.unwrap_or(self.status)
    }

    /// Minutes attributed to this interval as of `now`.
    ///
    /// Uses the stored duration, then the closed span, then the live span,
    /// each floored to one minute.
    pub fn elapsed_minutes(&self, now: DateTime<Utc>) -> i64 {
        if let Some(duration) = self.duration {
            return i64::from(duration).max(1);
        }
        let end = self.session_end.unwrap_or(now);
        whole_minutes(self.session_start, end)
    }
}

/// Whole minutes between two instants, never less than one.
pub fn whole_minutes(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (end - start).num_minutes().max(1)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn key() -> PresenceKey {
        PresenceKey::new(UserId::new(), ProjectId::new())
    }

    #[test]
    fn test_short_interval_rounds_up_to_one_minute() {
        let start = Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(whole_minutes(start, start + Duration::seconds(59)), 1);
        assert_eq!(whole_minutes(start, start), 1);
    }

    #[test]
    fn test_whole_minutes_truncates() {
        let start = Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(whole_minutes(start, start + Duration::seconds(8 * 60 + 59)), 8);
    }

    #[test]
    fn test_elapsed_prefers_stored_duration() {
        let start = Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap();
        let mut session = PresenceSession::open(key(), start);
        session.session_end = Some(start + Duration::minutes(40));
        session.duration = Some(12);
        assert_eq!(session.elapsed_minutes(start + Duration::hours(5)), 12);

        session.duration = None;
        assert_eq!(session.elapsed_minutes(start + Duration::hours(5)), 40);

        session.session_end = None;
        assert_eq!(session.elapsed_minutes(start + Duration::minutes(7)), 7);
    }

    #[test]
    fn test_accounting_status_uses_closing_status() {
        let now = Utc::now();
        let mut session = PresenceSession::open(key(), now);
        session.status = PresenceStatus::Offline;
        assert_eq!(session.accounting_status(), PresenceStatus::Offline);
        session.closing_status = Some(PresenceStatus::Focused);
        assert_eq!(session.accounting_status(), PresenceStatus::Focused);
    }
}
