//! Local presence state for one project.
//!
//! The last fetched snapshot is the base; presence broadcasts confirmed by
//! the hub are overlaid on it per user. A delta older than the snapshot it
//! would overlay is discarded, so a snapshot fetched after some broadcasts
//! arrived does not resurrect stale statuses.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use teamhub_core::types::id::{ProjectId, UserId};
use teamhub_entity::presence::{LastActive, MemberPresence, PresenceSnapshot, PresenceStatus};

#[derive(Debug, Clone, Copy)]
struct Confirmed {
    status: PresenceStatus,
    at: DateTime<Utc>,
}

/// Merged presence view of a project's members.
#[derive(Debug, Clone)]
pub struct PresenceView {
    project_id: ProjectId,
    snapshot: Option<PresenceSnapshot>,
    confirmed: HashMap<UserId, Confirmed>,
}

impl PresenceView {
    /// Empty view for a project.
    pub fn new(project_id: ProjectId) -> Self {
        Self {
            project_id,
            snapshot: None,
            confirmed: HashMap::new(),
        }
    }

    /// Replace the base snapshot.
    ///
    /// Snapshots of other projects are ignored.
    pub fn load_snapshot(&mut self, snapshot: PresenceSnapshot) {
        if snapshot.project_id != self.project_id {
            return;
        }
        let generated_at = snapshot.generated_at;
        self.confirmed.retain(|_, c| c.at > generated_at);
        self.snapshot = Some(snapshot);
    }

    /// Overlay a server-confirmed status. Returns whether the view changed.
    pub fn apply(
        &mut self,
        project_id: ProjectId,
        user_id: UserId,
        status: PresenceStatus,
        at: DateTime<Utc>,
    ) -> bool {
        if project_id != self.project_id {
            return false;
        }
        if self
            .snapshot
            .as_ref()
            .is_some_and(|snapshot| at < snapshot.generated_at)
        {
            return false;
        }
        if self.confirmed.get(&user_id).is_some_and(|c| c.at > at) {
            return false;
        }
        self.confirmed.insert(user_id, Confirmed { status, at });
        true
    }

    /// Current status of a user, OFFLINE when unknown.
    pub fn status_of(&self, user_id: UserId) -> PresenceStatus {
        if let Some(confirmed) = self.confirmed.get(&user_id) {
            return confirmed.status;
        }
        self.snapshot
            .as_ref()
            .and_then(|s| s.member(user_id))
            .map(|m| m.status)
            .unwrap_or(PresenceStatus::Offline)
    }

    /// Snapshot members with confirmed statuses applied, in snapshot order.
    pub fn members(&self) -> Vec<MemberPresence> {
        let Some(snapshot) = &self.snapshot else {
            return Vec::new();
        };
        snapshot
            .members
            .iter()
            .map(|member| {
                let mut member = member.clone();
                if let Some(confirmed) = self.confirmed.get(&member.user_id) {
                    member.status = confirmed.status;
                    member.last_active = LastActive::At(confirmed.at);
                }
                member
            })
            .collect()
    }

    /// Users currently shown as ONLINE or FOCUSED.
    pub fn active_count(&self) -> usize {
        let mut users: Vec<UserId> = self.confirmed.keys().copied().collect();
        if let Some(snapshot) = &self.snapshot {
            users.extend(snapshot.members.iter().map(|m| m.user_id));
        }
        users.sort();
        users.dedup();
        users
            .into_iter()
            .filter(|user| self.status_of(*user).is_productive())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn member(user_id: UserId, name: &str, status: PresenceStatus) -> MemberPresence {
        MemberPresence {
            user_id,
            name: name.to_string(),
            avatar_url: None,
            status,
            last_active: LastActive::Never,
            total_active_minutes: 12,
            today_active_minutes: 3,
        }
    }

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 6, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_delta_overlays_snapshot() {
        let project = ProjectId::new();
        let ada = UserId::new();
        let mut view = PresenceView::new(project);
        view.load_snapshot(PresenceSnapshot {
            project_id: project,
            generated_at: base(),
            members: vec![member(ada, "Ada", PresenceStatus::Offline)],
        });

        let at = base() + Duration::seconds(5);
        assert!(view.apply(project, ada, PresenceStatus::Online, at));
        assert_eq!(view.status_of(ada), PresenceStatus::Online);

        let members = view.members();
        assert_eq!(members[0].status, PresenceStatus::Online);
        assert_eq!(members[0].last_active, LastActive::At(at));
        assert_eq!(members[0].total_active_minutes, 12);
        assert_eq!(view.active_count(), 1);
    }

    #[test]
    fn test_older_delta_is_discarded() {
        let project = ProjectId::new();
        let ada = UserId::new();
        let mut view = PresenceView::new(project);

        assert!(view.apply(project, ada, PresenceStatus::Idle, base() + Duration::seconds(10)));
        assert!(!view.apply(project, ada, PresenceStatus::Online, base()));
        assert_eq!(view.status_of(ada), PresenceStatus::Idle);
    }

    #[test]
    fn test_newer_snapshot_drops_stale_overlay() {
        let project = ProjectId::new();
        let ada = UserId::new();
        let mut view = PresenceView::new(project);
        view.apply(project, ada, PresenceStatus::Online, base());

        view.load_snapshot(PresenceSnapshot {
            project_id: project,
            generated_at: base() + Duration::minutes(1),
            members: vec![member(ada, "Ada", PresenceStatus::Focused)],
        });
        assert_eq!(view.status_of(ada), PresenceStatus::Focused);
    }

    #[test]
    fn test_other_projects_are_ignored() {
        let project = ProjectId::new();
        let ada = UserId::new();
        let mut view = PresenceView::new(project);

        assert!(!view.apply(ProjectId::new(), ada, PresenceStatus::Online, base()));
        assert_eq!(view.status_of(ada), PresenceStatus::Offline);
        assert!(view.members().is_empty());
    }
}
