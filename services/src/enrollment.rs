//! Quality-gated face template registration.
//!
//! `test_quality` is a pure probe the client can call before committing;
//! `register` performs the same checks and then atomically replaces the
//! user's stored template.

use sea_orm::DatabaseConnection;
use serde::Serialize;
use tracing::info;

use db::models::face_template::{Model as FaceTemplate, RegistrationMethod};

use crate::encoder::{FaceAnalysis, FaceEncoder, FaceImage};
use crate::error::ServiceError;

/// Capture guidance returned alongside a failed quality check.
const RETAKE_SUGGESTIONS: [&str; 4] = [
    "Ensure your face is evenly lit, without strong backlight",
    "Face the camera directly and center yourself in the frame",
    "Remove glasses, masks or anything obscuring your face",
    "Hold the camera steady at roughly arm's length",
];

#[derive(Debug, Clone, Default, Serialize)]
pub struct QualityReport {
    pub quality_score: f32,
    pub status: String,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnrollmentReceipt {
    pub quality_score: f32,
    pub registration_method: RegistrationMethod,
}

/// The shared gate: exactly one face, at or above the quality threshold.
fn quality_gate(analysis: &FaceAnalysis, threshold: f32) -> Result<QualityReport, ServiceError> {
    if analysis.faces_detected == 0 {
        return Err(ServiceError::EncodingFailed);
    }
    if analysis.faces_detected > 1 {
        return Err(ServiceError::InvalidInput(format!(
            "{} faces detected; exactly one face is required",
            analysis.faces_detected
        )));
    }

    if analysis.quality_score < threshold {
        let mut suggestions: Vec<String> = analysis.quality_issues.clone();
        if suggestions.is_empty() {
            suggestions = RETAKE_SUGGESTIONS.iter().map(|s| s.to_string()).collect();
        }
        return Err(ServiceError::QualityTooLow {
            score: analysis.quality_score,
            status: "below_threshold".to_string(),
            suggestions,
        });
    }

    Ok(QualityReport {
        quality_score: analysis.quality_score,
        status: "acceptable".to_string(),
        suggestions: analysis.quality_issues.clone(),
    })
}

/// Runs the encoder and the quality gate without persisting anything, so a
/// user can retake before committing.
///
/// Errors: `EncodingFailed` when no face is present, `InvalidInput` when
/// more than one face is present, `QualityTooLow` below the threshold.
pub async fn test_quality(
    encoder: &dyn FaceEncoder,
    image: &FaceImage,
    quality_threshold: f32,
) -> Result<QualityReport, ServiceError> {
    let analysis = encoder.analyze(image).await?;
    quality_gate(&analysis, quality_threshold)
}

/// Registers (or replaces) the user's face template, gated by the same
/// quality check as [`test_quality`]. The replacement is a single upsert,
/// so concurrent verifications read either the old or the new template.
pub async fn register(
    db: &DatabaseConnection,
    encoder: &dyn FaceEncoder,
    user_id: i64,
    image: &FaceImage,
    method: RegistrationMethod,
    quality_threshold: f32,
) -> Result<EnrollmentReceipt, ServiceError> {
    let analysis = encoder.analyze(image).await?;
    let report = quality_gate(&analysis, quality_threshold)?;

    if analysis.embedding.is_empty() {
        return Err(ServiceError::EncodingFailed);
    }

    FaceTemplate::replace(
        db,
        user_id,
        &analysis.embedding,
        report.quality_score,
        method,
    )
    .await?;

    info!(
        user_id,
        quality = report.quality_score,
        ?method,
        "face template registered"
    );

    Ok(EnrollmentReceipt {
        quality_score: report.quality_score,
        registration_method: method,
    })
}

/// Removes the user's template. Fails with `NoTemplate` when nothing was
/// registered.
pub async fn unregister(db: &DatabaseConnection, user_id: i64) -> Result<(), ServiceError> {
    if FaceTemplate::delete_for_user(db, user_id).await? {
        Ok(())
    } else {
        Err(ServiceError::NoTemplate)
    }
}
