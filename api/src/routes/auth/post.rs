use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, SqlErr};
use serde::{Deserialize, Serialize};
use validator::Validate;

use db::models::face_template::RegistrationMethod;
use db::models::user::{self, Role};
use services::encoder::FaceImage;
use services::enrollment::{self, QualityReport};
use services::error::ServiceError;
use util::config;

use crate::auth::{AuthUser, generate_jwt};
use crate::response::ApiResponse;
use crate::routes::common::{format_validation_errors, service_error_reply};
use crate::state::AppState;

lazy_static::lazy_static! {
    static ref USERNAME_REGEX: regex::Regex =
        regex::Regex::new("^[A-Za-z0-9_]{3,32}$").unwrap();
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(regex(
        path = *USERNAME_REGEX,
        message = "Username must be 3-32 characters of letters, digits or underscores"
    ))]
    pub username: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    pub role: Role,
}

#[derive(Debug, Serialize, Default)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: String,
    pub token: String,
    pub expires_at: String,
}

impl UserResponse {
    fn from_user(user: user::Model, token: String, expires_at: String) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role.to_string(),
            token,
            expires_at,
        }
    }
}

/// POST /api/auth/register
///
/// Register a new account and issue a JWT.
///
/// ### Request Body
/// ```json
/// {
///   "username": "u12345678",
///   "email": "user@example.com",
///   "password": "strongpassword",
///   "role": "student"
/// }
/// ```
///
/// ### Responses
/// - `201 Created` with the user and a fresh token
/// - `400 Bad Request` on validation failure
/// - `409 Conflict` on duplicate username or email
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> (StatusCode, Json<ApiResponse<UserResponse>>) {
    if let Err(validation_errors) = req.validate() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error(format_validation_errors(
                &validation_errors,
            ))),
        );
    }

    let db = state.db();

    match user::Entity::find()
        .filter(user::Column::Email.eq(req.email.as_str()))
        .one(db)
        .await
    {
        Ok(Some(_)) => {
            return (
                StatusCode::CONFLICT,
                Json(ApiResponse::error("A user with this email already exists")),
            );
        }
        Ok(None) => {}
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(format!("Database error: {e}"))),
            );
        }
    }

    match user::Model::create(db, &req.username, &req.email, &req.password, req.role).await {
        Ok(created) => {
            let (token, expires_at) = generate_jwt(created.id, created.role);
            (
                StatusCode::CREATED,
                Json(ApiResponse::success(
                    UserResponse::from_user(created, token, expires_at),
                    "User registered successfully",
                )),
            )
        }
        Err(e) => {
            if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                return (
                    StatusCode::CONFLICT,
                    Json(ApiResponse::error(
                        "A user with this username or email already exists",
                    )),
                );
            }
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(format!("Database error: {e}"))),
            )
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// POST /api/auth/login
///
/// Authenticate an existing user and issue a JWT.
///
/// ### Responses
/// - `200 OK` with the user and a fresh token
/// - `401 Unauthorized` on unknown username or wrong password
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> (StatusCode, Json<ApiResponse<UserResponse>>) {
    match user::Model::verify_credentials(state.db(), &req.username, &req.password).await {
        Ok(Some(found)) => {
            let (token, expires_at) = generate_jwt(found.id, found.role);
            (
                StatusCode::OK,
                Json(ApiResponse::success(
                    UserResponse::from_user(found, token, expires_at),
                    "Login successful",
                )),
            )
        }
        Ok(None) => (
            StatusCode::UNAUTHORIZED,
            Json(ApiResponse::error("Invalid username or password")),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!("Database error: {e}"))),
        ),
    }
}

#[derive(Debug, Deserialize)]
pub struct FaceImageRequest {
    /// Captured frame as a `data:image/...;base64,...` URL.
    pub image_data: String,
    /// Only meaningful for `register_face`; ignored by the quality probe.
    #[serde(default)]
    pub registration_method: Option<RegistrationMethod>,
}

fn quality_rejection(err: &ServiceError) -> Option<Response> {
    if let ServiceError::QualityTooLow {
        score,
        status,
        suggestions,
    } = err
    {
        let report = QualityReport {
            quality_score: *score,
            status: status.clone(),
            suggestions: suggestions.clone(),
        };
        let body = ApiResponse {
            success: false,
            data: report,
            message: "Image quality below acceptance threshold".to_string(),
        };
        return Some((StatusCode::BAD_REQUEST, Json(body)).into_response());
    }
    None
}

/// POST /api/auth/test-face-quality
///
/// Runs the capture through the encoder's quality gate without storing
/// anything, so the user can retake before enrolling.
///
/// ### Responses
/// - `200 OK` with the quality report
/// - `400 Bad Request` with score and retake suggestions when below
///   threshold, or when the image contains no face / multiple faces
pub async fn test_face_quality(
    State(state): State<AppState>,
    Json(req): Json<FaceImageRequest>,
) -> Response {
    let image = match FaceImage::from_data_url(&req.image_data) {
        Ok(image) => image,
        Err(msg) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::<QualityReport>::error(msg)),
            )
                .into_response();
        }
    };

    match enrollment::test_quality(state.encoder(), &image, config::face_quality_threshold()).await
    {
        Ok(report) => (
            StatusCode::OK,
            Json(ApiResponse::success(report, "Face quality acceptable")),
        )
            .into_response(),
        Err(err) => quality_rejection(&err)
            .unwrap_or_else(|| service_error_reply::<QualityReport>(&err).into_response()),
    }
}

/// POST /api/auth/register-face
///
/// Enrolls (or wholesale replaces) the authenticated student's face
/// template, gated by the same quality check as the probe.
///
/// ### Responses
/// - `200 OK` with the enrollment receipt
/// - `400 Bad Request` on quality failure or unusable image
pub async fn register_face(
    State(state): State<AppState>,
    Extension(AuthUser(claims)): Extension<AuthUser>,
    Json(req): Json<FaceImageRequest>,
) -> Response {
    let image = match FaceImage::from_data_url(&req.image_data) {
        Ok(image) => image,
        Err(msg) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::<QualityReport>::error(msg)),
            )
                .into_response();
        }
    };

    let method = req.registration_method.unwrap_or(RegistrationMethod::Basic);

    match enrollment::register(
        state.db(),
        state.encoder(),
        claims.sub,
        &image,
        method,
        config::face_quality_threshold(),
    )
    .await
    {
        Ok(receipt) => (
            StatusCode::OK,
            Json(ApiResponse::success(receipt, "Face registered successfully")),
        )
            .into_response(),
        Err(err) => quality_rejection(&err)
            .unwrap_or_else(|| service_error_reply::<QualityReport>(&err).into_response()),
    }
}
