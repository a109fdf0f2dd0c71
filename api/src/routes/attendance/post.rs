use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;

use serde_json::json;
use services::ServiceError;
use services::attendance::{self, Verdict, VerifyPolicy};
use services::encoder::FaceImage;
use services::session::{self, CreateAttendanceSession};
use util::geo::Location;

use crate::auth::AuthUser;
use crate::auth::guards::Empty;
use crate::response::ApiResponse;
use crate::routes::common::service_error_reply;
use crate::state::AppState;

use super::common::{
    CreateSessionReq, DEFAULT_RADIUS_M, MAX_RADIUS_M, MIN_RADIUS_M, MarkAttendanceReq, MarkResponse,
};

/// POST /api/attendance/sessions
///
/// Creates a geofenced attendance session for one of the lecturer's own
/// courses. The radius defaults to 100 m and is clamped to 10-1000 m.
///
/// ### Responses
/// - `201 Created` with the session
/// - `400 Bad Request` on invalid coordinates, empty title or inverted window
/// - `403 Forbidden` when the course belongs to another lecturer
/// - `404 Not Found` on unknown course
pub async fn create_session(
    State(state): State<AppState>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    Json(body): Json<CreateSessionReq>,
) -> Response {
    let target = match Location::new(body.latitude, body.longitude, 0.0) {
        Ok(target) => target,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::<Empty>::error(e.to_string())),
            )
                .into_response();
        }
    };

    let radius_m = body
        .radius_m
        .unwrap_or(DEFAULT_RADIUS_M)
        .clamp(MIN_RADIUS_M, MAX_RADIUS_M);

    let params = CreateAttendanceSession {
        course_id: body.course_id,
        created_by: claims.sub,
        title: body.title,
        start_time: body.start_time,
        end_time: body.end_time,
        target,
        radius_m,
    };

    match session::create(state.db(), params).await {
        Ok(created) => (
            StatusCode::CREATED,
            Json(ApiResponse::success(created, "Attendance session created")),
        )
            .into_response(),
        Err(err) => service_error_reply::<Empty>(&err).into_response(),
    }
}

/// POST /api/attendance/mark
///
/// Marks attendance for the authenticated student: the capture must match
/// the enrolled template AND the claimed position must fall inside the
/// session geofence, during the session window.
///
/// ### Responses
/// - `200 OK` with the stored record and measured distance
/// - `400 Bad Request` with the failed factors when verification rejects;
///   a closed window or a duplicate mark carries an `outcome` tag instead
///   (`session_closed` / `already_marked`)
/// - `403 Forbidden` when not enrolled in the session's course
/// - `409 Conflict` when no face template is registered
pub async fn mark_attendance(
    State(state): State<AppState>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    Json(body): Json<MarkAttendanceReq>,
) -> Response {
    let image = match FaceImage::from_data_url(&body.image_data) {
        Ok(image) => image,
        Err(msg) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::<Empty>::error(msg)),
            )
                .into_response();
        }
    };

    let claimed = match Location::new(body.latitude, body.longitude, body.accuracy_m) {
        Ok(claimed) => claimed,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::<Empty>::error(e.to_string())),
            )
                .into_response();
        }
    };

    let verdict = attendance::mark(
        state.db(),
        state.encoder(),
        VerifyPolicy::from_config(),
        body.session_id,
        claims.sub,
        &image,
        claimed,
        Utc::now(),
    )
    .await;

    match verdict {
        Ok(Verdict::Accepted { record, distance_m }) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                MarkResponse { record, distance_m },
                "Attendance recorded",
            )),
        )
            .into_response(),
        Ok(rejected @ Verdict::Rejected { .. }) => {
            let body = ApiResponse {
                success: false,
                data: rejected,
                message: "Attendance verification failed".to_string(),
            };
            (StatusCode::BAD_REQUEST, Json(body)).into_response()
        }
        Err(err @ (ServiceError::SessionClosed | ServiceError::AlreadyMarked)) => {
            let outcome = match err {
                ServiceError::AlreadyMarked => "already_marked",
                _ => "session_closed",
            };
            let body = ApiResponse {
                success: false,
                data: json!({ "outcome": outcome }),
                message: err.to_string(),
            };
            (StatusCode::BAD_REQUEST, Json(body)).into_response()
        }
        Err(err) => service_error_reply::<Empty>(&err).into_response(),
    }
}
