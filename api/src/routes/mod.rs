//! HTTP route entry point for `/api/...`.
//!
//! Route groups:
//! - `/health` → liveness endpoint (public)
//! - `/auth` → registration, login and face enrollment
//! - `/attendance` → session management and dual-factor marking

use crate::routes::{attendance::attendance_routes, auth::auth_routes, health::health_routes};
use crate::state::AppState;
use axum::Router;

pub mod attendance;
pub mod auth;
pub mod common;
pub mod health;

/// Builds the complete application router for all HTTP endpoints.
///
/// Registration/login and `/health` are public; everything else carries a
/// role guard on its route group.
pub fn routes(app_state: AppState) -> Router {
    Router::new()
        .nest("/health", health_routes())
        .nest("/auth", auth_routes())
        .nest("/attendance", attendance_routes())
        .with_state(app_state)
}
