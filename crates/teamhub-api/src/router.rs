//! Route definitions for the TeamHub HTTP API.
//!
//! REST routes are mounted under `/api`; the WebSocket upgrade lives at `/ws`.

use axum::{
    Router,
    middleware as axum_middleware,
    routing::{get, post},
};

use crate::handlers;
use crate::middleware;
use crate::state::AppState;

/// Build the router with all routes and the request logging middleware.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .merge(presence_routes())
        .merge(health_routes());

    let ws_routes = Router::new().route("/ws", get(handlers::ws::ws_upgrade));

    Router::new()
        .nest("/api", api_routes)
        .merge(ws_routes)
        .layer(axum_middleware::from_fn(middleware::logging::request_logging))
        .with_state(state)
}

/// Project presence endpoints
fn presence_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/projects/{project_id}/presence",
            get(handlers::presence::get_snapshot),
        )
        .route(
            "/projects/{project_id}/presence/me",
            get(handlers::presence::my_summary),
        )
        .route(
            "/projects/{project_id}/presence/start",
            post(handlers::presence::start_session),
        )
        .route(
            "/projects/{project_id}/presence/end",
            post(handlers::presence::end_session),
        )
}

/// Health check endpoints (no auth required)
fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health::health_check))
}
