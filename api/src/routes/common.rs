//! Shared helpers for route handlers: validation error formatting and the
//! `ServiceError` → HTTP status mapping.

use axum::{Json, http::StatusCode};
use serde::Serialize;
use services::ServiceError;
use validator::ValidationErrors;

use crate::response::ApiResponse;

/// Flattens `validator` errors into one human-readable message.
pub fn format_validation_errors(errors: &ValidationErrors) -> String {
    let mut messages = Vec::new();
    for (field, errs) in errors.field_errors() {
        for err in errs {
            match &err.message {
                Some(msg) => messages.push(msg.to_string()),
                None => messages.push(format!("Invalid value for {field}")),
            }
        }
    }
    messages.join(", ")
}

/// Maps each service failure to its HTTP status.
///
/// Caller-correctable failures are 400, a missing template is 409 (the
/// client must enroll first), ownership violations are 403, and anything
/// infrastructural is 500.
pub fn service_error_status(err: &ServiceError) -> StatusCode {
    match err {
        ServiceError::InvalidInput(_)
        | ServiceError::QualityTooLow { .. }
        | ServiceError::EncodingFailed
        | ServiceError::SessionClosed
        | ServiceError::AlreadyMarked => StatusCode::BAD_REQUEST,
        ServiceError::NoTemplate => StatusCode::CONFLICT,
        ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::NotEnrolled | ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
        ServiceError::Encoder(_) | ServiceError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Standard error reply for a service failure. Server-side failures are
/// logged here so handlers don't have to.
pub fn service_error_reply<T>(err: &ServiceError) -> (StatusCode, Json<ApiResponse<T>>)
where
    T: Serialize + Default,
{
    let status = service_error_status(err);
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(error = %err, "request failed");
    }
    (status, Json(ApiResponse::error(err.to_string())))
}
