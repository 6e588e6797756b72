//! Read-only project membership queries.

use async_trait::async_trait;
use sqlx::PgPool;

use teamhub_core::error::{AppError, ErrorKind};
use teamhub_core::result::AppResult;
use teamhub_core::types::id::{ProjectId, UserId};
use teamhub_entity::project::ProjectMember;

use crate::store::ProjectDirectory;

/// Membership status value that grants access to a project's room.
const ACCEPTED: &str = "ACCEPTED";

/// Repository over the externally managed `project_members` and `users` tables.
#[derive(Debug, Clone)]
pub struct ProjectMemberRepository {
    pool: PgPool,
}

impl ProjectMemberRepository {
    /// Create a new project member repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProjectDirectory for ProjectMemberRepository {
    async fn accepted_members(&self, project_id: ProjectId) -> AppResult<Vec<ProjectMember>> {
        sqlx::query_as::<_, ProjectMember>(
            "SELECT u.id AS user_id, u.name, u.avatar_url \
             FROM project_members pm JOIN users u ON u.id = pm.user_id \
             WHERE pm.project_id = $1 AND pm.status = $2 \
             ORDER BY u.name ASC, u.id ASC",
        )
        .bind(project_id)
        .bind(ACCEPTED)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to list project members", e)
        })
    }

    async fn is_accepted_member(
        &self,
        project_id: ProjectId,
        user_id: UserId,
    ) -> AppResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM project_members \
             WHERE project_id = $1 AND user_id = $2 AND status = $3)",
        )
        .bind(project_id)
        .bind(user_id)
        .bind(ACCEPTED)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to check project membership", e)
        })
    }
}
