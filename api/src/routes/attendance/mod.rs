//! `/api/attendance` route group: session creation and listings for
//! lecturers, open-session discovery, history and dual-factor marking for
//! students.

use crate::auth::guards::{allow_lecturer, allow_student};
use crate::state::AppState;
use axum::{
    Router,
    middleware::from_fn,
    routing::{get, post},
};

pub mod common;
pub mod get;
pub mod post;

pub fn attendance_routes() -> Router<AppState> {
    let lecturer = Router::new()
        .route(
            "/sessions",
            post(post::create_session).get(get::list_sessions),
        )
        .route("/sessions/{session_id}/records", get(get::session_records))
        .route_layer(from_fn(allow_lecturer));

    let student = Router::new()
        .route("/sessions/active", get(get::active_sessions))
        .route("/history", get(get::my_history))
        .route("/mark", post(post::mark_attendance))
        .route_layer(from_fn(allow_student));

    lecturer.merge(student)
}
