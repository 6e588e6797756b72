//! # teamhub-database
//!
//! Persistence for presence tracking: the [`PresenceStore`] and
//! [`ProjectDirectory`] traits, their PostgreSQL repositories, in-memory
//! implementations for tests and single-node development, connection
//! pool management and migrations.

pub mod connection;
pub mod migration;
pub mod repositories;
pub mod store;

pub use connection::DatabasePool;
pub use store::{OpenOutcome, PresenceStore, ProjectDirectory};
