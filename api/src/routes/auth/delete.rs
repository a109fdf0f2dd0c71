use axum::{Extension, Json, extract::State, http::StatusCode};

use services::enrollment;

use crate::auth::AuthUser;
use crate::auth::guards::Empty;
use crate::response::ApiResponse;
use crate::routes::common::service_error_reply;
use crate::state::AppState;

/// DELETE /api/auth/register-face
///
/// Removes the authenticated student's face template.
///
/// ### Responses
/// - `200 OK` when a template was removed
/// - `409 Conflict` when nothing was registered
pub async fn unregister_face(
    State(state): State<AppState>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
) -> (StatusCode, Json<ApiResponse<Empty>>) {
    match enrollment::unregister(state.db(), claims.sub).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::success(Empty, "Face registration removed")),
        ),
        Err(err) => service_error_reply(&err),
    }
}
