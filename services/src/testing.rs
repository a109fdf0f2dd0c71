//! Shared fixtures for service tests: a canned face encoder and seed
//! helpers that insert minimal rows directly through the entities.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

use async_trait::async_trait;
use db::models::{
    attendance_session, course, course_student,
    face_template::{Model as FaceTemplate, RegistrationMethod},
    user::{self, Role},
};

use crate::encoder::{EncoderError, FaceAnalysis, FaceEncoder, FaceImage};

const SAMPLE_DATA_URL: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg==";

/// A face encoder that returns the same analysis for every image.
pub struct MockEncoder {
    analysis: FaceAnalysis,
}

impl MockEncoder {
    /// One detected face with the given embedding and quality score.
    pub fn one_face(embedding: Vec<f32>, quality_score: f32) -> Self {
        Self {
            analysis: FaceAnalysis {
                faces_detected: 1,
                embedding,
                quality_score,
                quality_issues: Vec::new(),
            },
        }
    }

    pub fn no_face() -> Self {
        Self {
            analysis: FaceAnalysis {
                faces_detected: 0,
                embedding: Vec::new(),
                quality_score: 0.0,
                quality_issues: vec!["no face detected".into()],
            },
        }
    }

    /// Multiple detected faces in one frame.
    pub fn faces(n: u32) -> Self {
        Self {
            analysis: FaceAnalysis {
                faces_detected: n,
                embedding: vec![0.2; 128],
                quality_score: 0.9,
                quality_issues: Vec::new(),
            },
        }
    }
}

#[async_trait]
impl FaceEncoder for MockEncoder {
    async fn analyze(&self, _image: &FaceImage) -> Result<FaceAnalysis, EncoderError> {
        Ok(self.analysis.clone())
    }
}

/// A valid one-pixel PNG data URL.
pub fn sample_image() -> FaceImage {
    FaceImage::from_data_url(SAMPLE_DATA_URL).unwrap()
}

pub async fn seed_student(db: &DatabaseConnection, username: &str) -> user::Model {
    user::Model::create(
        db,
        username,
        &format!("{username}@up.example"),
        "hunter2!",
        Role::Student,
    )
    .await
    .unwrap()
}

pub async fn seed_lecturer(db: &DatabaseConnection, username: &str) -> user::Model {
    user::Model::create(
        db,
        username,
        &format!("{username}@up.example"),
        "hunter2!",
        Role::Lecturer,
    )
    .await
    .unwrap()
}

pub async fn seed_course(
    db: &DatabaseConnection,
    lecturer_id: i64,
    code: &str,
) -> course::Model {
    course::ActiveModel {
        code: Set(code.to_owned()),
        title: Set(format!("{code} Lectures")),
        lecturer_id: Set(lecturer_id),
        created_at: Set(Utc::now()),
        updated_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

pub async fn enroll(db: &DatabaseConnection, course_id: i64, user_id: i64) {
    course_student::ActiveModel {
        course_id: Set(course_id),
        user_id: Set(user_id),
        enrolled_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .unwrap();
}

pub async fn register_template(db: &DatabaseConnection, user_id: i64, embedding: Vec<f32>) {
    FaceTemplate::replace(db, user_id, &embedding, 0.9, RegistrationMethod::Basic)
        .await
        .unwrap();
}

#[allow(clippy::too_many_arguments)]
pub async fn seed_session(
    db: &DatabaseConnection,
    course_id: i64,
    created_by: i64,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    lat: f64,
    lng: f64,
    radius_m: f64,
) -> attendance_session::Model {
    attendance_session::ActiveModel {
        course_id: Set(course_id),
        created_by: Set(created_by),
        title: Set("Lecture".to_owned()),
        start_time: Set(start_time),
        end_time: Set(end_time),
        location_lat: Set(lat),
        location_lng: Set(lng),
        radius_m: Set(radius_m),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}
