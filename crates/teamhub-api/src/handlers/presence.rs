//! Presence read endpoints and the HTTP session fallback.

use axum::Json;
use axum::extract::{Path, State};
use tracing::info;

use teamhub_core::error::AppError;
use teamhub_core::types::id::{ProjectId, UserId};
use teamhub_database::store::ProjectDirectory;
use teamhub_entity::presence::{ActivitySummary, PresenceKey, PresenceSnapshot};

use crate::dto::response::{ApiResponse, SessionEndResponse, SessionStartResponse};
use crate::extractors::AuthUser;
use crate::state::AppState;

/// GET /api/projects/{project_id}/presence
pub async fn get_snapshot(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<ProjectId>,
) -> Result<Json<ApiResponse<PresenceSnapshot>>, AppError> {
    require_member(&state, project_id, auth.user_id).await?;
    let snapshot = state.realtime.snapshots.get_snapshot(project_id).await?;
    Ok(Json(ApiResponse::ok(snapshot)))
}

/// GET /api/projects/{project_id}/presence/me
pub async fn my_summary(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<ProjectId>,
) -> Result<Json<ApiResponse<ActivitySummary>>, AppError> {
    require_member(&state, project_id, auth.user_id).await?;
    let summary = state
        .realtime
        .snapshots
        .user_summary(project_id, auth.user_id)
        .await?;
    Ok(Json(ApiResponse::ok(summary)))
}

/// POST /api/projects/{project_id}/presence/start
pub async fn start_session(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<ProjectId>,
) -> Result<Json<ApiResponse<SessionStartResponse>>, AppError> {
    require_member(&state, project_id, auth.user_id).await?;
    let key = PresenceKey::new(auth.user_id, project_id);

    let session = state
        .realtime
        .hub
        .start_presence(key)
        .await
        .ok_or_else(|| AppError::service_unavailable("Presence store is unavailable"))?;

    info!(key = %key, session_id = %session.id, "Presence session started over HTTP");
    Ok(Json(ApiResponse::ok(SessionStartResponse { session })))
}

/// POST /api/projects/{project_id}/presence/end
///
/// Leaves the session open while the caller still has a live socket in the
/// project; `ended` is false in that case.
pub async fn end_session(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<ProjectId>,
) -> Result<Json<ApiResponse<SessionEndResponse>>, AppError> {
    let key = PresenceKey::new(auth.user_id, project_id);
    let session = state.realtime.hub.end_presence(key).await;

    Ok(Json(ApiResponse::ok(SessionEndResponse {
        ended: session.is_some(),
        session,
    })))
}

async fn require_member(
    state: &AppState,
    project_id: ProjectId,
    user_id: UserId,
) -> Result<(), AppError> {
    let is_member = state
        .realtime
        .snapshots
        .directory()
        .is_accepted_member(project_id, user_id)
        .await?;

    if is_member {
        Ok(())
    } else {
        Err(AppError::authorization("Not a member of this project"))
    }
}
