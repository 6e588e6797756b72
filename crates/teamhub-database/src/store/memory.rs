//! In-memory presence store and project directory for single-node use and tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use teamhub_core::result::AppResult;
use teamhub_core::types::id::{PresenceSessionId, ProjectId, UserId};
use teamhub_entity::presence::model::whole_minutes;
use teamhub_entity::presence::{PresenceKey, PresenceSession, PresenceStatus};
use teamhub_entity::project::ProjectMember;

use super::{OpenOutcome, PresenceStore, ProjectDirectory};

/// Presence store keeping every interval in a `Vec` behind a Tokio mutex.
///
/// The mutex makes "find active, else create" atomic, mirroring the
/// partial unique index of the PostgreSQL schema.
#[derive(Debug, Clone, Default)]
pub struct MemoryPresenceStore {
    sessions: Arc<Mutex<Vec<PresenceSession>>>,
}

impl MemoryPresenceStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a row as-is (used to seed history and leftover sessions).
    pub async fn insert(&self, session: PresenceSession) {
        self.sessions.lock().await.push(session);
    }

    /// Copy of every row, in insertion order.
    pub async fn all(&self) -> Vec<PresenceSession> {
        self.sessions.lock().await.clone()
    }

    /// Rows for a key, in insertion order.
    pub async fn sessions_for_key(&self, key: PresenceKey) -> Vec<PresenceSession> {
        self.sessions
            .lock()
            .await
            .iter()
            .filter(|s| s.key() == key)
            .cloned()
            .collect()
    }

    /// Number of open rows for a key.
    pub async fn active_count(&self, key: PresenceKey) -> usize {
        self.sessions
            .lock()
            .await
            .iter()
            .filter(|s| s.is_active && s.key() == key)
            .count()
    }
}

#[async_trait]
impl PresenceStore for MemoryPresenceStore {
    async fn find_active(&self, key: PresenceKey) -> AppResult<Option<PresenceSession>> {
        let sessions = self.sessions.lock().await;
        Ok(sessions
            .iter()
            .find(|s| s.is_active && s.key() == key)
            .cloned())
    }

    async fn open_session(&self, key: PresenceKey, now: DateTime<Utc>) -> AppResult<OpenOutcome> {
        let mut sessions = self.sessions.lock().await;

        if let Some(existing) = sessions.iter().find(|s| s.is_active && s.key() == key) {
            return Ok(OpenOutcome::Existing(existing.clone()));
        }

        let session = PresenceSession::open(key, now);
        sessions.push(session.clone());
        debug!(session_id = %session.id, key = %key, "Presence session inserted");
        Ok(OpenOutcome::Created(session))
    }

    async fn update_status(
        &self,
        id: PresenceSessionId,
        status: PresenceStatus,
        at: DateTime<Utc>,
    ) -> AppResult<Option<PresenceSession>> {
        let mut sessions = self.sessions.lock().await;
        Ok(sessions
            .iter_mut()
            .find(|s| s.id == id && s.is_active)
            .map(|s| {
                s.status = status;
                s.last_seen_at = at;
                s.clone()
            }))
    }

    async fn touch(&self, id: PresenceSessionId, at: DateTime<Utc>) -> AppResult<()> {
        let mut sessions = self.sessions.lock().await;
        if let Some(s) = sessions.iter_mut().find(|s| s.id == id && s.is_active) {
            s.last_seen_at = at;
        }
        Ok(())
    }

    async fn close_session(
        &self,
        id: PresenceSessionId,
        end: DateTime<Utc>,
    ) -> AppResult<Option<PresenceSession>> {
        let mut sessions = self.sessions.lock().await;
        Ok(sessions
            .iter_mut()
            .find(|s| s.id == id && s.is_active)
            .map(|s| {
                s.closing_status = Some(s.status);
                s.status = PresenceStatus::Offline;
                s.session_end = Some(end);
                s.duration = Some(whole_minutes(s.session_start, end) as i32);
                s.is_active = false;
                s.last_seen_at = end;
                s.clone()
            }))
    }

    async fn sessions_for_members(
        &self,
        project_id: ProjectId,
        user_ids: &[UserId],
    ) -> AppResult<Vec<PresenceSession>> {
        let sessions = self.sessions.lock().await;
        let mut matched: Vec<PresenceSession> = sessions
            .iter()
            .filter(|s| s.project_id == project_id && user_ids.contains(&s.user_id))
            .cloned()
            .collect();
        matched.sort_by_key(|s| s.session_start);
        Ok(matched)
    }
}

/// Project directory backed by a map of project → accepted members.
#[derive(Debug, Clone, Default)]
pub struct MemoryProjectDirectory {
    members: Arc<Mutex<HashMap<ProjectId, Vec<ProjectMember>>>>,
}

impl MemoryProjectDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an accepted member to a project.
    pub async fn add_member(&self, project_id: ProjectId, member: ProjectMember) {
        let mut members = self.members.lock().await;
        let list = members.entry(project_id).or_default();
        list.retain(|m| m.user_id != member.user_id);
        list.push(member);
        list.sort_by(|a, b| a.name.cmp(&b.name).then(a.user_id.cmp(&b.user_id)));
    }
}

#[async_trait]
impl ProjectDirectory for MemoryProjectDirectory {
    async fn accepted_members(&self, project_id: ProjectId) -> AppResult<Vec<ProjectMember>> {
        Ok(self
            .members
            .lock()
            .await
            .get(&project_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn is_accepted_member(
        &self,
        project_id: ProjectId,
        user_id: UserId,
    ) -> AppResult<bool> {
        Ok(self
            .members
            .lock()
            .await
            .get(&project_id)
            .is_some_and(|list| list.iter().any(|m| m.user_id == user_id)))
    }
}
