//! Presence session repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use teamhub_core::error::{AppError, ErrorKind};
use teamhub_core::result::AppResult;
use teamhub_core::types::id::{PresenceSessionId, ProjectId, UserId};
use teamhub_entity::presence::{PresenceKey, PresenceSession, PresenceStatus};

use crate::store::{OpenOutcome, PresenceStore};

/// Repository for the `presence_sessions` table.
#[derive(Debug, Clone)]
pub struct PresenceSessionRepository {
    pool: PgPool,
}

impl PresenceSessionRepository {
    /// Create a new presence session repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PresenceStore for PresenceSessionRepository {
    async fn find_active(&self, key: PresenceKey) -> AppResult<Option<PresenceSession>> {
        sqlx::query_as::<_, PresenceSession>(
            "SELECT * FROM presence_sessions \
             WHERE user_id = $1 AND project_id = $2 AND is_active",
        )
        .bind(key.user_id)
        .bind(key.project_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to find active presence session", e)
        })
    }

    async fn open_session(&self, key: PresenceKey, now: DateTime<Utc>) -> AppResult<OpenOutcome> {
        let fresh = PresenceSession::open(key, now);

        // The partial unique index turns a concurrent second insert into a no-op.
        let inserted = sqlx::query_as::<_, PresenceSession>(
            "INSERT INTO presence_sessions \
             (id, user_id, project_id, status, session_start, is_active, last_seen_at) \
             VALUES ($1, $2, $3, $4, $5, TRUE, $5) \
             ON CONFLICT (user_id, project_id) WHERE is_active DO NOTHING \
             RETURNING *",
        )
        .bind(fresh.id)
        .bind(fresh.user_id)
        .bind(fresh.project_id)
        .bind(fresh.status)
        .bind(fresh.session_start)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to open presence session", e)
        })?;

        if let Some(session) = inserted {
            debug!(session_id = %session.id, key = %key, "Presence session inserted");
            return Ok(OpenOutcome::Created(session));
        }

        self.find_active(key)
            .await?
            .map(OpenOutcome::Existing)
            .ok_or_else(|| {
                AppError::conflict(format!(
                    "Active presence session for {key} vanished during open"
                ))
            })
    }

    async fn update_status(
        &self,
        id: PresenceSessionId,
        status: PresenceStatus,
        at: DateTime<Utc>,
    ) -> AppResult<Option<PresenceSession>> {
        sqlx::query_as::<_, PresenceSession>(
            "UPDATE presence_sessions SET status = $2, last_seen_at = $3 \
             WHERE id = $1 AND is_active RETURNING *",
        )
        .bind(id)
        .bind(status)
        .bind(at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to update presence status", e)
        })
    }

    async fn touch(&self, id: PresenceSessionId, at: DateTime<Utc>) -> AppResult<()> {
        sqlx::query("UPDATE presence_sessions SET last_seen_at = $2 WHERE id = $1 AND is_active")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to touch presence session", e)
            })?;
        Ok(())
    }

    async fn close_session(
        &self,
        id: PresenceSessionId,
        end: DateTime<Utc>,
    ) -> AppResult<Option<PresenceSession>> {
        sqlx::query_as::<_, PresenceSession>(
            "UPDATE presence_sessions SET \
                 closing_status = status, \
                 status = 'offline', \
                 session_end = $2, \
                 duration = GREATEST(1, FLOOR(EXTRACT(EPOCH FROM ($2 - session_start)) / 60))::INT, \
                 is_active = FALSE, \
                 last_seen_at = $2 \
             WHERE id = $1 AND is_active RETURNING *",
        )
        .bind(id)
        .bind(end)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to close presence session", e)
        })
    }

    async fn sessions_for_members(
        &self,
        project_id: ProjectId,
        user_ids: &[UserId],
    ) -> AppResult<Vec<PresenceSession>> {
        let ids: Vec<Uuid> = user_ids.iter().map(|id| id.into_uuid()).collect();
        sqlx::query_as::<_, PresenceSession>(
            "SELECT * FROM presence_sessions \
             WHERE project_id = $1 AND user_id = ANY($2) \
             ORDER BY session_start ASC",
        )
        .bind(project_id)
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to list member sessions", e)
        })
    }
}
