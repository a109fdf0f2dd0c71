use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::Utc;

use services::attendance::AttendanceRecord;
use services::session::{self, AttendanceSession, SessionWithCount};

use crate::auth::AuthUser;
use crate::response::ApiResponse;
use crate::routes::common::service_error_reply;
use crate::state::AppState;

/// GET /api/attendance/sessions/active
///
/// Sessions currently open for marking in the student's enrolled courses,
/// soonest-closing first.
pub async fn active_sessions(
    State(state): State<AppState>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
) -> (StatusCode, Json<ApiResponse<Vec<AttendanceSession>>>) {
    match session::list_open_for_student(state.db(), claims.sub, Utc::now()).await {
        Ok(sessions) => (
            StatusCode::OK,
            Json(ApiResponse::success(sessions, "Open sessions fetched")),
        ),
        Err(err) => service_error_reply(&err),
    }
}

/// GET /api/attendance/sessions
///
/// All sessions the lecturer has created, newest first, each with its
/// attendance count.
pub async fn list_sessions(
    State(state): State<AppState>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
) -> (StatusCode, Json<ApiResponse<Vec<SessionWithCount>>>) {
    match session::list_for_lecturer(state.db(), claims.sub).await {
        Ok(sessions) => (
            StatusCode::OK,
            Json(ApiResponse::success(sessions, "Sessions fetched")),
        ),
        Err(err) => service_error_reply(&err),
    }
}

/// GET /api/attendance/sessions/{session_id}/records
///
/// Accepted records for one session; only the session creator may read
/// them.
pub async fn session_records(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
) -> (StatusCode, Json<ApiResponse<Vec<AttendanceRecord>>>) {
    match session::records_for_session(state.db(), claims.sub, session_id).await {
        Ok(records) => (
            StatusCode::OK,
            Json(ApiResponse::success(records, "Attendance records fetched")),
        ),
        Err(err) => service_error_reply(&err),
    }
}

/// GET /api/attendance/history
///
/// The student's own accepted records, newest first.
pub async fn my_history(
    State(state): State<AppState>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
) -> (StatusCode, Json<ApiResponse<Vec<AttendanceRecord>>>) {
    match session::history_for_student(state.db(), claims.sub).await {
        Ok(records) => (
            StatusCode::OK,
            Json(ApiResponse::success(records, "Attendance history fetched")),
        ),
        Err(err) => service_error_reply(&err),
    }
}
