//! # teamhub-api
//!
//! HTTP API layer for TeamHub built on Axum.
//!
//! Provides the presence read endpoints, the HTTP start/end fallback, the
//! WebSocket upgrade into the connection hub, middleware (CORS, request
//! logging), extractors, DTOs, and error mapping.

pub mod app;
pub mod dto;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use app::{build_app, serve};
pub use state::AppState;
