//! Persistence seams used by the presence subsystem.
//!
//! Two implementations of each trait are provided:
//! - PostgreSQL repositories (see [`crate::repositories`])
//! - In-memory stores guarded by a `tokio::sync::Mutex`

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use teamhub_core::result::AppResult;
use teamhub_core::types::id::{PresenceSessionId, ProjectId, UserId};
use teamhub_entity::presence::{PresenceKey, PresenceSession, PresenceStatus};
use teamhub_entity::project::ProjectMember;

pub use memory::{MemoryPresenceStore, MemoryProjectDirectory};

/// Result of an atomic "find active session, else create" call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenOutcome {
    /// A new interval was inserted.
    Created(PresenceSession),
    /// Another writer already holds the open interval for the key.
    Existing(PresenceSession),
}

impl OpenOutcome {
    /// The open interval, whichever way it was obtained.
    pub fn into_session(self) -> PresenceSession {
        match self {
            Self::Created(s) | Self::Existing(s) => s,
        }
    }
}

/// Durable record of presence intervals per (user, project).
///
/// Implementations must make [`PresenceStore::open_session`] atomic: two
/// concurrent calls for one key yield exactly one `Created`.
#[async_trait]
pub trait PresenceStore: Send + Sync + std::fmt::Debug + 'static {
    /// The open interval for a key, if any.
    async fn find_active(&self, key: PresenceKey) -> AppResult<Option<PresenceSession>>;

    /// Open an ONLINE interval at `now`, or return the one already open.
    async fn open_session(&self, key: PresenceKey, now: DateTime<Utc>) -> AppResult<OpenOutcome>;

    /// Overwrite the status of an open interval and record `at` as last seen.
    ///
    /// Returns `None` when the interval is no longer open.
    async fn update_status(
        &self,
        id: PresenceSessionId,
        status: PresenceStatus,
        at: DateTime<Utc>,
    ) -> AppResult<Option<PresenceSession>>;

    /// Record `at` as the last time the open interval was seen.
    async fn touch(&self, id: PresenceSessionId, at: DateTime<Utc>) -> AppResult<()>;

    /// Close an open interval at `end`.
    ///
    /// Sets the duration in whole minutes (at least one), moves the current
    /// status into `closing_status` and marks the row OFFLINE and inactive.
    /// Returns `None` if the interval was already closed.
    async fn close_session(
        &self,
        id: PresenceSessionId,
        end: DateTime<Utc>,
    ) -> AppResult<Option<PresenceSession>>;

    /// Every interval of the given users in a project, oldest first.
    async fn sessions_for_members(
        &self,
        project_id: ProjectId,
        user_ids: &[UserId],
    ) -> AppResult<Vec<PresenceSession>>;
}

/// Read-only view of project membership held by the relational store.
#[async_trait]
pub trait ProjectDirectory: Send + Sync + std::fmt::Debug + 'static {
    /// Accepted members of a project, ordered by display name.
    async fn accepted_members(&self, project_id: ProjectId) -> AppResult<Vec<ProjectMember>>;

    /// Whether the user is an accepted member of the project.
    async fn is_accepted_member(&self, project_id: ProjectId, user_id: UserId)
    -> AppResult<bool>;
}
