//! `AuthUser` extractor: reads the caller identity forwarded by the
//! upstream authentication layer.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use teamhub_core::error::AppError;
use teamhub_core::types::id::UserId;

use crate::state::AppState;

/// Header carrying the authenticated user's ID.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Authenticated caller available in handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    /// The caller's user ID.
    pub user_id: UserId,
}

impl AuthUser {
    fn from_parts(parts: &Parts) -> Result<Self, AppError> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| AppError::authentication("Missing x-user-id header"))?
            .to_str()
            .map_err(|_| AppError::authentication("Invalid x-user-id header"))?;

        let user_id = raw
            .trim()
            .parse::<UserId>()
            .map_err(|_| AppError::authentication("Invalid x-user-id header"))?;

        Ok(Self { user_id })
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Self::from_parts(parts)
    }
}
