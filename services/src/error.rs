use sea_orm::DbErr;
use thiserror::Error;

use crate::encoder::EncoderError;

/// Failure taxonomy for the enrollment and verification services.
///
/// Every variant is distinguishable by the caller; the HTTP layer maps each
/// to its own status and message rather than collapsing them into one
/// generic error.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Malformed request data (bad coordinates, empty title, multiple
    /// faces in an enrollment shot). Always caller-correctable.
    #[error("{0}")]
    InvalidInput(String),

    /// Enrollment image is below the configured quality threshold.
    /// Carries the numeric score and actionable suggestions.
    #[error("image quality {score:.2} below acceptance threshold")]
    QualityTooLow {
        score: f32,
        status: String,
        suggestions: Vec<String>,
    },

    /// No usable face in the submitted image. Distinct from
    /// `QualityTooLow`: this can happen at verification time against an
    /// already-good template.
    #[error("no face detected in image")]
    EncodingFailed,

    /// The session's marking window has not opened yet or has passed.
    #[error("attendance session is not open")]
    SessionClosed,

    /// The student has no enrolled face template.
    #[error("no face template registered")]
    NoTemplate,

    /// An accepted record already exists for this (student, session).
    #[error("attendance already recorded for this session")]
    AlreadyMarked,

    /// The student is not enrolled in the session's course.
    #[error("not enrolled in this course")]
    NotEnrolled,

    /// The acting user does not own the resource.
    #[error("{0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("face encoder error: {0}")]
    Encoder(#[from] EncoderError),

    #[error("database error: {0}")]
    Db(#[from] DbErr),
}
