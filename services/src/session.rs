//! Attendance session lifecycle: creation by lecturers and the listings
//! consumed by both roles. Sessions are append-only; openness is purely
//! time-driven.

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Serialize;
use tracing::info;

use db::models::{
    attendance_record,
    attendance_session::{ActiveModel, Column, Entity},
    course, course_student,
};
use util::geo::Location;

use crate::error::ServiceError;

pub use db::models::attendance_session::Model as AttendanceSession;

#[derive(Debug, Clone)]
pub struct CreateAttendanceSession {
    pub course_id: i64,
    pub created_by: i64,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub target: Location,
    pub radius_m: f64,
}

/// A session joined with how many students have marked it.
#[derive(Debug, Clone, Serialize)]
pub struct SessionWithCount {
    #[serde(flatten)]
    pub session: AttendanceSession,
    pub attended_count: u64,
}

/// Validates and persists a new session.
///
/// The target `Location` is validated by construction; this checks the
/// remaining invariants: non-empty title, positive radius, `start < end`,
/// an existing course owned by the caller.
pub async fn create(
    db: &DatabaseConnection,
    params: CreateAttendanceSession,
) -> Result<AttendanceSession, ServiceError> {
    if params.title.trim().is_empty() {
        return Err(ServiceError::InvalidInput("title cannot be empty".into()));
    }
    if params.end_time <= params.start_time {
        return Err(ServiceError::InvalidInput(
            "end_time must be after start_time".into(),
        ));
    }
    if params.radius_m <= 0.0 || !params.radius_m.is_finite() {
        return Err(ServiceError::InvalidInput(
            "radius must be a positive number of meters".into(),
        ));
    }

    let course = course::Entity::find_by_id(params.course_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound("course".into()))?;
    if course.lecturer_id != params.created_by {
        return Err(ServiceError::Forbidden(
            "only the course lecturer can create sessions for it".into(),
        ));
    }

    let session = ActiveModel {
        course_id: Set(params.course_id),
        created_by: Set(params.created_by),
        title: Set(params.title.trim().to_owned()),
        start_time: Set(params.start_time),
        end_time: Set(params.end_time),
        location_lat: Set(params.target.latitude),
        location_lng: Set(params.target.longitude),
        radius_m: Set(params.radius_m),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(
        session_id = session.id,
        course_id = session.course_id,
        radius_m = session.radius_m,
        "attendance session created"
    );

    Ok(session)
}

/// Sessions currently open for marking in any course the student is
/// enrolled in.
pub async fn list_open_for_student(
    db: &DatabaseConnection,
    student_id: i64,
    now: DateTime<Utc>,
) -> Result<Vec<AttendanceSession>, ServiceError> {
    let enrolled_course_ids: Vec<i64> = course_student::Entity::find()
        .filter(course_student::Column::UserId.eq(student_id))
        .all(db)
        .await?
        .into_iter()
        .map(|e| e.course_id)
        .collect();

    if enrolled_course_ids.is_empty() {
        return Ok(Vec::new());
    }

    let sessions = Entity::find()
        .filter(Column::CourseId.is_in(enrolled_course_ids))
        .filter(Column::StartTime.lte(now))
        .filter(Column::EndTime.gt(now))
        .order_by_asc(Column::EndTime)
        .all(db)
        .await?;

    Ok(sessions)
}

/// All sessions a lecturer has created, newest first, each with its
/// attendance count.
pub async fn list_for_lecturer(
    db: &DatabaseConnection,
    lecturer_id: i64,
) -> Result<Vec<SessionWithCount>, ServiceError> {
    let sessions = Entity::find()
        .filter(Column::CreatedBy.eq(lecturer_id))
        .order_by_desc(Column::CreatedAt)
        .all(db)
        .await?;

    let mut out = Vec::with_capacity(sessions.len());
    for session in sessions {
        let attended_count = attendance_record::Entity::find()
            .filter(attendance_record::Column::SessionId.eq(session.id))
            .count(db)
            .await?;
        out.push(SessionWithCount {
            session,
            attended_count,
        });
    }
    Ok(out)
}

/// Records for one session, restricted to the lecturer who created it.
pub async fn records_for_session(
    db: &DatabaseConnection,
    lecturer_id: i64,
    session_id: i64,
) -> Result<Vec<attendance_record::Model>, ServiceError> {
    let session = Entity::find_by_id(session_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound("attendance session".into()))?;
    if session.created_by != lecturer_id {
        return Err(ServiceError::Forbidden(
            "only the session creator can view its records".into(),
        ));
    }

    let records = attendance_record::Entity::find()
        .filter(attendance_record::Column::SessionId.eq(session_id))
        .order_by_asc(attendance_record::Column::MarkedAt)
        .all(db)
        .await?;
    Ok(records)
}

/// A student's own accepted records, newest first.
pub async fn history_for_student(
    db: &DatabaseConnection,
    student_id: i64,
) -> Result<Vec<attendance_record::Model>, ServiceError> {
    let records = attendance_record::Entity::find()
        .filter(attendance_record::Column::StudentId.eq(student_id))
        .order_by_desc(attendance_record::Column::MarkedAt)
        .all(db)
        .await?;
    Ok(records)
}
