//! Presence snapshot builder: read-side reconstruction from stored intervals.
//!
//! Minutes are attributed per interval using the status the interval carried
//! (its closing status once closed). A row that went ONLINE → IDLE → ONLINE
//! counts fully or not at all depending on where it ended up, so totals are
//! an approximation at transition boundaries.
//!
//! The gap is large in practice. Clients report IDLE after two minutes
//! without input, so a session whose last tab closes while idle contributes
//! zero minutes for its whole length, even after hours of work. Counting that
//! time would need the row split at each IDLE transition.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use teamhub_core::clock::Clock;
use teamhub_core::result::AppResult;
use teamhub_core::types::id::{ProjectId, UserId};
use teamhub_database::store::{PresenceStore, ProjectDirectory};
use teamhub_entity::presence::{
    ActivitySummary, LastActive, MemberPresence, PresenceSession, PresenceSnapshot, PresenceStatus,
};

/// Builds per-project presence snapshots and per-user minute summaries.
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    store: Arc<dyn PresenceStore>,
    directory: Arc<dyn ProjectDirectory>,
    clock: Arc<dyn Clock>,
}

/// Running totals for one member.
#[derive(Debug, Default)]
struct Tally<'a> {
    total: i64,
    today: i64,
    latest: Option<&'a PresenceSession>,
}

impl<'a> Tally<'a> {
    fn add(&mut self, session: &'a PresenceSession, now: DateTime<Utc>, midnight: DateTime<Utc>) {
        if session.accounting_status().is_productive() {
            let minutes = session.elapsed_minutes(now);
            self.total += minutes;
            if session.session_start >= midnight {
                self.today += minutes;
            }
        }
        if self
            .latest
            .is_none_or(|latest| session.session_start >= latest.session_start)
        {
            self.latest = Some(session);
        }
    }
}

impl SnapshotBuilder {
    /// Creates a snapshot builder.
    pub fn new(
        store: Arc<dyn PresenceStore>,
        directory: Arc<dyn ProjectDirectory>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            directory,
            clock,
        }
    }

    /// The project directory this builder reads members from.
    pub fn directory(&self) -> &Arc<dyn ProjectDirectory> {
        &self.directory
    }

    /// Snapshot of every accepted member of a project, ordered by name.
    pub async fn get_snapshot(&self, project_id: ProjectId) -> AppResult<PresenceSnapshot> {
        let now = self.clock.now();
        let midnight = utc_midnight(now);

        let mut members = self.directory.accepted_members(project_id).await?;
        members.sort_by(|a, b| a.name.cmp(&b.name).then(a.user_id.cmp(&b.user_id)));

        let user_ids: Vec<UserId> = members.iter().map(|m| m.user_id).collect();
        let sessions = self.store.sessions_for_members(project_id, &user_ids).await?;

        let mut tallies: HashMap<UserId, Tally<'_>> = HashMap::new();
        for session in &sessions {
            tallies
                .entry(session.user_id)
                .or_default()
                .add(session, now, midnight);
        }

        let members = members
            .into_iter()
            .map(|member| {
                let tally = tallies.remove(&member.user_id).unwrap_or_default();
                let (status, last_active) = match tally.latest {
                    Some(latest) => (latest.status, LastActive::At(latest.last_seen_at)),
                    None => (PresenceStatus::Offline, LastActive::Never),
                };
                MemberPresence {
                    user_id: member.user_id,
                    name: member.name,
                    avatar_url: member.avatar_url,
                    status,
                    last_active,
                    total_active_minutes: tally.total,
                    today_active_minutes: tally.today,
                }
            })
            .collect();

        Ok(PresenceSnapshot {
            project_id,
            generated_at: now,
            members,
        })
    }

    /// Today/total productive minutes of one user in one project.
    pub async fn user_summary(
        &self,
        project_id: ProjectId,
        user_id: UserId,
    ) -> AppResult<ActivitySummary> {
        let now = self.clock.now();
        let midnight = utc_midnight(now);

        let sessions = self
            .store
            .sessions_for_members(project_id, &[user_id])
            .await?;
        let mut tally = Tally::default();
        for session in &sessions {
            tally.add(session, now, midnight);
        }

        Ok(ActivitySummary {
            user_id,
            project_id,
            total_active_minutes: tally.total,
            today_active_minutes: tally.today,
        })
    }
}

/// Start of the UTC calendar day containing `now`.
fn utc_midnight(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|midnight| midnight.and_utc())
        .unwrap_or(now)
}
