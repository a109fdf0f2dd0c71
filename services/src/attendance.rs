//! The dual-factor attendance verifier.
//!
//! Marking an attendance requires both a face match against the enrolled
//! template and a geofence check against the session's target location,
//! evaluated independently and combined with a strict AND. The composite
//! primary key on `attendance_records` is the atomic gate against
//! concurrent duplicate marks.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, SqlErr};
use serde::Serialize;
use tracing::{info, warn};

use db::models::{
    attendance_record::{self, ActiveModel as RecordActive},
    attendance_session::Entity as SessionEntity,
    course_student,
    face_template::Model as FaceTemplate,
};
use util::geo::{Location, haversine_distance_m};

use crate::encoder::{FaceEncoder, FaceImage, embedding_matches};
use crate::error::ServiceError;

pub use db::models::attendance_record::Model as AttendanceRecord;

pub const VERIFICATION_METHOD: &str = "face_gps";

/// Thresholds the verifier applies. Constructed from global config in the
/// API layer; built directly in tests.
#[derive(Debug, Clone, Copy)]
pub struct VerifyPolicy {
    /// Maximum embedding distance for a face match (lower = stricter).
    pub face_match_tolerance: f32,
}

impl VerifyPolicy {
    pub fn from_config() -> Self {
        Self {
            face_match_tolerance: util::config::face_match_tolerance(),
        }
    }
}

impl Default for VerifyPolicy {
    fn default() -> Self {
        Self {
            face_match_tolerance: 0.6,
        }
    }
}

/// Which verification factor failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyFactor {
    Face,
    Location,
}

/// The verifier's decision, as a tagged variant rather than a bag of
/// optional fields.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Verdict {
    Accepted {
        record: AttendanceRecord,
        distance_m: f64,
    },
    Rejected {
        failed: Vec<VerifyFactor>,
        face_verified: bool,
        location_verified: bool,
        /// Embedding distance measured against the enrolled template.
        face_distance: f32,
        /// Distance to the session target, always measured so the client
        /// can show "142 m from session, outside 100 m radius".
        distance_m: f64,
        radius_m: f64,
    },
}

/// Evaluates a student's attendance attempt against an open session.
///
/// `now` is passed explicitly so callers control the clock; the API layer
/// passes `Utc::now()`.
///
/// Hard failures (`SessionClosed`, `NotEnrolled`, `AlreadyMarked`,
/// `NoTemplate`, `EncodingFailed`, ...) surface as errors; a completed
/// evaluation returns a [`Verdict`], and only `Verdict::Accepted` has
/// persisted anything.
pub async fn mark(
    db: &DatabaseConnection,
    encoder: &dyn FaceEncoder,
    policy: VerifyPolicy,
    session_id: i64,
    student_id: i64,
    image: &FaceImage,
    claimed: Location,
    now: DateTime<Utc>,
) -> Result<Verdict, ServiceError> {
    let session = SessionEntity::find_by_id(session_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound("attendance session".into()))?;

    if !session.is_open(now) {
        return Err(ServiceError::SessionClosed);
    }

    if !course_student::Model::is_enrolled(db, session.course_id, student_id).await? {
        return Err(ServiceError::NotEnrolled);
    }

    // Friendly fast path; the composite-PK insert below remains the
    // authoritative uniqueness gate.
    let already = attendance_record::Entity::find()
        .filter(attendance_record::Column::SessionId.eq(session_id))
        .filter(attendance_record::Column::StudentId.eq(student_id))
        .one(db)
        .await?
        .is_some();
    if already {
        return Err(ServiceError::AlreadyMarked);
    }

    let template = FaceTemplate::find_for_user(db, student_id)
        .await?
        .ok_or(ServiceError::NoTemplate)?;

    // Face factor.
    let analysis = encoder.analyze(image).await?;
    if analysis.faces_detected == 0 || analysis.embedding.is_empty() {
        return Err(ServiceError::EncodingFailed);
    }
    let known = template.embedding_vec()?;
    let (face_verified, face_distance) =
        embedding_matches(&known, &analysis.embedding, policy.face_match_tolerance);

    // Location factor. The stored target was validated at session
    // creation; accuracy is irrelevant to the distance.
    let target = Location::new(session.location_lat, session.location_lng, 0.0)
        .map_err(|e| ServiceError::InvalidInput(e.to_string()))?;
    let distance_m = haversine_distance_m(&claimed, &target);
    let location_verified = distance_m <= session.radius_m;

    if !(face_verified && location_verified) {
        let mut failed = Vec::new();
        if !face_verified {
            failed.push(VerifyFactor::Face);
        }
        if !location_verified {
            failed.push(VerifyFactor::Location);
        }
        warn!(
            session_id,
            student_id,
            face_verified,
            location_verified,
            distance_m,
            face_distance,
            "attendance attempt rejected"
        );
        return Ok(Verdict::Rejected {
            failed,
            face_verified,
            location_verified,
            face_distance,
            distance_m,
            radius_m: session.radius_m,
        });
    }

    let record = RecordActive {
        session_id: Set(session_id),
        student_id: Set(student_id),
        marked_at: Set(now),
        face_verified: Set(true),
        location_verified: Set(true),
        distance_m: Set(distance_m),
        verification_method: Set(VERIFICATION_METHOD.to_owned()),
    }
    .insert(db)
    .await
    .map_err(|err| match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(_)) => ServiceError::AlreadyMarked,
        _ => ServiceError::Db(err),
    })?;

    info!(session_id, student_id, distance_m, "attendance recorded");

    Ok(Verdict::Accepted { record, distance_m })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        MockEncoder, enroll, register_template, sample_image, seed_course, seed_lecturer,
        seed_session, seed_student,
    };
    use chrono::{Duration, TimeZone};
    use db::test_utils::setup_test_db;
    use sea_orm::PaginatorTrait;

    const TARGET: (f64, f64) = (7.3000, 5.1450);

    struct Fixture {
        db: DatabaseConnection,
        session_id: i64,
        student_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    }

    /// One enrolled student with a zero-vector template, one session at
    /// TARGET with a 100 m radius open 10:00-11:00.
    async fn fixture(tag: &str) -> Fixture {
        let db = setup_test_db().await;
        let lecturer = seed_lecturer(&db, &format!("staff_{tag}")).await;
        let course = seed_course(&db, lecturer.id, &format!("CSC_{tag}")).await;
        let student = seed_student(&db, &format!("stud_{tag}")).await;
        enroll(&db, course.id, student.id).await;
        register_template(&db, student.id, vec![0.0; 128]).await;

        let start = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 3, 2, 11, 0, 0).unwrap();
        let session =
            seed_session(&db, course.id, lecturer.id, start, end, TARGET.0, TARGET.1, 100.0).await;

        Fixture {
            db,
            session_id: session.id,
            student_id: student.id,
            start,
            end,
        }
    }

    fn inside() -> Location {
        // ~56 m north of the target
        Location::new(7.3005, 5.1450, 0.0).unwrap()
    }

    fn outside() -> Location {
        // ~1112 m north of the target
        Location::new(7.3100, 5.1450, 0.0).unwrap()
    }

    fn matching_encoder() -> MockEncoder {
        MockEncoder::one_face(vec![0.0; 128], 0.9)
    }

    fn mismatching_encoder() -> MockEncoder {
        MockEncoder::one_face(vec![1.0; 128], 0.9)
    }

    async fn record_count(db: &DatabaseConnection, session_id: i64) -> u64 {
        attendance_record::Entity::find()
            .filter(attendance_record::Column::SessionId.eq(session_id))
            .count(db)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn both_factors_pass_accepts_and_persists() {
        let f = fixture("accept").await;
        let mid = f.start + Duration::minutes(30);

        let verdict = mark(
            &f.db,
            &matching_encoder(),
            VerifyPolicy::default(),
            f.session_id,
            f.student_id,
            &sample_image(),
            inside(),
            mid,
        )
        .await
        .unwrap();

        match verdict {
            Verdict::Accepted { record, distance_m } => {
                assert!(record.face_verified && record.location_verified);
                assert!(distance_m < 100.0);
                assert_eq!(record.verification_method, VERIFICATION_METHOD);
            }
            other => panic!("expected acceptance, got {other:?}"),
        }
        assert_eq!(record_count(&f.db, f.session_id).await, 1);
    }

    #[tokio::test]
    async fn face_pass_location_fail_rejects() {
        let f = fixture("loc_fail").await;
        let verdict = mark(
            &f.db,
            &matching_encoder(),
            VerifyPolicy::default(),
            f.session_id,
            f.student_id,
            &sample_image(),
            outside(),
            f.start + Duration::minutes(30),
        )
        .await
        .unwrap();

        match verdict {
            Verdict::Rejected {
                failed,
                face_verified,
                location_verified,
                distance_m,
                radius_m,
                ..
            } => {
                assert_eq!(failed, vec![VerifyFactor::Location]);
                assert!(face_verified);
                assert!(!location_verified);
                assert!((distance_m - 1112.0).abs() < 2.0);
                assert_eq!(radius_m, 100.0);
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        assert_eq!(record_count(&f.db, f.session_id).await, 0);
    }

    #[tokio::test]
    async fn face_fail_location_pass_rejects() {
        let f = fixture("face_fail").await;
        let verdict = mark(
            &f.db,
            &mismatching_encoder(),
            VerifyPolicy::default(),
            f.session_id,
            f.student_id,
            &sample_image(),
            inside(),
            f.start + Duration::minutes(30),
        )
        .await
        .unwrap();

        match verdict {
            Verdict::Rejected { failed, .. } => {
                assert_eq!(failed, vec![VerifyFactor::Face]);
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        assert_eq!(record_count(&f.db, f.session_id).await, 0);
    }

    #[tokio::test]
    async fn both_factors_fail_rejects_with_both_listed() {
        let f = fixture("both_fail").await;
        let verdict = mark(
            &f.db,
            &mismatching_encoder(),
            VerifyPolicy::default(),
            f.session_id,
            f.student_id,
            &sample_image(),
            outside(),
            f.start + Duration::minutes(30),
        )
        .await
        .unwrap();

        match verdict {
            Verdict::Rejected { failed, .. } => {
                assert_eq!(failed, vec![VerifyFactor::Face, VerifyFactor::Location]);
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        assert_eq!(record_count(&f.db, f.session_id).await, 0);
    }

    #[tokio::test]
    async fn window_edges_are_half_open() {
        let f = fixture("window").await;
        let attempt = |when: DateTime<Utc>| {
            let db = f.db.clone();
            async move {
                mark(
                    &db,
                    &matching_encoder(),
                    VerifyPolicy::default(),
                    f.session_id,
                    f.student_id,
                    &sample_image(),
                    inside(),
                    when,
                )
                .await
            }
        };

        // One second before opening: closed.
        let before = attempt(f.start - Duration::seconds(1)).await;
        assert!(matches!(before, Err(ServiceError::SessionClosed)));

        // Exactly at end: closed.
        let at_end = attempt(f.end).await;
        assert!(matches!(at_end, Err(ServiceError::SessionClosed)));

        // One second before end: open (accepted).
        let near_end = attempt(f.end - Duration::seconds(1)).await.unwrap();
        assert!(matches!(near_end, Verdict::Accepted { .. }));

        // Exactly at start would also be open, but the student is now
        // already marked.
        let at_start = attempt(f.start).await;
        assert!(matches!(at_start, Err(ServiceError::AlreadyMarked)));
    }

    #[tokio::test]
    async fn geofence_boundary_is_inclusive() {
        let f = fixture("boundary").await;
        // ~100.07 m from the target against a 100 m radius: just outside.
        let just_outside = Location::new(7.3009, 5.1450, 0.0).unwrap();
        let verdict = mark(
            &f.db,
            &matching_encoder(),
            VerifyPolicy::default(),
            f.session_id,
            f.student_id,
            &sample_image(),
            just_outside,
            f.start + Duration::minutes(5),
        )
        .await
        .unwrap();
        match verdict {
            Verdict::Rejected {
                failed, distance_m, ..
            } => {
                assert_eq!(failed, vec![VerifyFactor::Location]);
                assert!(distance_m > 100.0 && distance_m < 101.0);
            }
            other => panic!("expected rejection, got {other:?}"),
        }

        // ~89 m from the target: inside, distance <= radius verifies.
        let just_inside = Location::new(7.3008, 5.1450, 0.0).unwrap();
        let verdict = mark(
            &f.db,
            &matching_encoder(),
            VerifyPolicy::default(),
            f.session_id,
            f.student_id,
            &sample_image(),
            just_inside,
            f.start + Duration::minutes(5),
        )
        .await
        .unwrap();
        assert!(matches!(verdict, Verdict::Accepted { .. }));
    }

    #[tokio::test]
    async fn second_attempt_reports_already_marked() {
        let f = fixture("dup").await;
        let mid = f.start + Duration::minutes(30);

        let first = mark(
            &f.db,
            &matching_encoder(),
            VerifyPolicy::default(),
            f.session_id,
            f.student_id,
            &sample_image(),
            inside(),
            mid,
        )
        .await
        .unwrap();
        assert!(matches!(first, Verdict::Accepted { .. }));

        let second = mark(
            &f.db,
            &matching_encoder(),
            VerifyPolicy::default(),
            f.session_id,
            f.student_id,
            &sample_image(),
            inside(),
            mid,
        )
        .await;
        assert!(matches!(second, Err(ServiceError::AlreadyMarked)));
        assert_eq!(record_count(&f.db, f.session_id).await, 1);
    }

    #[tokio::test]
    async fn concurrent_marks_yield_exactly_one_record() {
        let f = fixture("race").await;
        let mid = f.start + Duration::minutes(30);

        let attempt = || {
            let db = f.db.clone();
            async move {
                mark(
                    &db,
                    &matching_encoder(),
                    VerifyPolicy::default(),
                    f.session_id,
                    f.student_id,
                    &sample_image(),
                    inside(),
                    mid,
                )
                .await
            }
        };

        let (a, b) = tokio::join!(attempt(), attempt());
        let accepted = [&a, &b]
            .iter()
            .filter(|r| matches!(r, Ok(Verdict::Accepted { .. })))
            .count();
        let already = [&a, &b]
            .iter()
            .filter(|r| matches!(r, Err(ServiceError::AlreadyMarked)))
            .count();
        assert_eq!(accepted, 1, "exactly one attempt must win: {a:?} / {b:?}");
        assert_eq!(already, 1);
        assert_eq!(record_count(&f.db, f.session_id).await, 1);
    }

    #[tokio::test]
    async fn no_template_is_terminal_until_enrollment() {
        let db = setup_test_db().await;
        let lecturer = seed_lecturer(&db, "staff_nt").await;
        let course = seed_course(&db, lecturer.id, "CSC_NT").await;
        let student = seed_student(&db, "stud_nt").await;
        enroll(&db, course.id, student.id).await;
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
        let end = start + Duration::hours(1);
        let session =
            seed_session(&db, course.id, lecturer.id, start, end, TARGET.0, TARGET.1, 100.0).await;

        let err = mark(
            &db,
            &matching_encoder(),
            VerifyPolicy::default(),
            session.id,
            student.id,
            &sample_image(),
            inside(),
            start + Duration::minutes(5),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::NoTemplate));
    }

    #[tokio::test]
    async fn unenrolled_student_cannot_mark() {
        let db = setup_test_db().await;
        let lecturer = seed_lecturer(&db, "staff_ue").await;
        let course = seed_course(&db, lecturer.id, "CSC_UE").await;
        let student = seed_student(&db, "stud_ue").await;
        register_template(&db, student.id, vec![0.0; 128]).await;
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap();
        let end = start + Duration::hours(1);
        let session =
            seed_session(&db, course.id, lecturer.id, start, end, TARGET.0, TARGET.1, 100.0).await;

        let err = mark(
            &db,
            &matching_encoder(),
            VerifyPolicy::default(),
            session.id,
            student.id,
            &sample_image(),
            inside(),
            start + Duration::minutes(5),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::NotEnrolled));
    }

    #[tokio::test]
    async fn unusable_image_is_encoding_failed() {
        let f = fixture("noface").await;
        let err = mark(
            &f.db,
            &MockEncoder::no_face(),
            VerifyPolicy::default(),
            f.session_id,
            f.student_id,
            &sample_image(),
            inside(),
            f.start + Duration::minutes(5),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::EncodingFailed));
    }
}
