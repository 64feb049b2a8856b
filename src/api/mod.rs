//! HTTP router for the lumora-calendar service.
//!
//! Endpoints:
//! - /status      — health check
//! - /connect     — start the provider OAuth flow
//! - /callback    — provider redirect target
//! - /calendars   — list calendars / toggle selection
//! - /events      — aggregated events for a date window
//! - /disconnect  — drop the provider connection

pub mod routes;

use crate::SharedState;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    routes::calendar_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
