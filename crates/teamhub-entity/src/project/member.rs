//! Accepted project member, as read from the relational store.

use serde::{Deserialize, Serialize};

use teamhub_core::types::id::UserId;

/// A user whose membership in a project has been accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ProjectMember {
    /// Member user ID.
    pub user_id: UserId,
    /// Display name.
    pub name: String,
    /// Avatar URL.
    pub avatar_url: Option<String>,
}
