//! # teamhub-entity
//!
//! Domain entity models for TeamHub presence tracking. Every struct in this
//! crate represents a database table row or a domain value object. Database
//! entities derive `sqlx::FromRow` when the `sqlx` feature is enabled, which
//! keeps the crate usable from clients that never touch the database.

pub mod presence;
pub mod project;
