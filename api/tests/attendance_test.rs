mod helpers;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use db::models::{course, course_student};
use db::test_utils::setup_test_db;
use helpers::{
    StubEncoder, TINY_PNG, get_json_body, make_app, register_account, send_get, send_json,
};
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use serde_json::{Value, json};
use serial_test::serial;
use std::sync::Arc;

const CAMPUS: (f64, f64) = (7.3000, 5.1450);

async fn seed_course(db: &DatabaseConnection, lecturer_id: i64, code: &str) -> course::Model {
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

async fn enroll(db: &DatabaseConnection, course_id: i64, user_id: i64) {
    course_student::ActiveModel {
        course_id: Set(course_id),
        user_id: Set(user_id),
        enrolled_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .unwrap();
}

fn session_payload(course_id: i64, radius_m: Option<f64>) -> Value {
    let now = Utc::now();
    let mut payload = json!({
        "course_id": course_id,
        "title": "Week 5 lecture",
        "start_time": (now - Duration::minutes(5)).to_rfc3339(),
        "end_time": (now + Duration::minutes(55)).to_rfc3339(),
        "latitude": CAMPUS.0,
        "longitude": CAMPUS.1,
    });
    if let Some(radius_m) = radius_m {
        payload["radius_m"] = json!(radius_m);
    }
    payload
}

fn mark_payload(session_id: i64, latitude: f64, longitude: f64) -> Value {
    json!({
        "session_id": session_id,
        "image_data": TINY_PNG,
        "latitude": latitude,
        "longitude": longitude,
    })
}

#[tokio::test]
#[serial]
async fn create_session_defaults_and_clamps_radius() {
    let db = setup_test_db().await;
    let app = make_app(db.clone(), Arc::new(StubEncoder::no_face()));
    let (lecturer_id, token) = register_account(&app, "staff201", "lecturer").await;
    let course = seed_course(&db, lecturer_id, "COS201").await;

    let created = send_json(
        &app,
        "POST",
        "/api/attendance/sessions",
        Some(&token),
        &session_payload(course.id, None),
    )
    .await;
    assert_eq!(created.status(), StatusCode::CREATED);
    let json = get_json_body(created).await;
    assert_eq!(json["data"]["radius_m"], 100.0);

    let oversized = send_json(
        &app,
        "POST",
        "/api/attendance/sessions",
        Some(&token),
        &session_payload(course.id, Some(5000.0)),
    )
    .await;
    assert_eq!(oversized.status(), StatusCode::CREATED);
    let json = get_json_body(oversized).await;
    assert_eq!(json["data"]["radius_m"], 1000.0);
}

#[tokio::test]
#[serial]
async fn create_session_requires_course_ownership() {
    let db = setup_test_db().await;
    let app = make_app(db.clone(), Arc::new(StubEncoder::no_face()));
    let (owner_id, _) = register_account(&app, "staff202", "lecturer").await;
    let (_, other_token) = register_account(&app, "staff203", "lecturer").await;
    let course = seed_course(&db, owner_id, "COS202").await;

    let response = send_json(
        &app,
        "POST",
        "/api/attendance/sessions",
        Some(&other_token),
        &session_payload(course.id, None),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[serial]
async fn students_see_only_open_sessions_for_enrolled_courses() {
    let db = setup_test_db().await;
    let app = make_app(db.clone(), Arc::new(StubEncoder::no_face()));
    let (lecturer_id, lecturer_token) = register_account(&app, "staff204", "lecturer").await;
    let (student_id, student_token) = register_account(&app, "u20100001", "student").await;
    let enrolled_course = seed_course(&db, lecturer_id, "COS203").await;
    let other_course = seed_course(&db, lecturer_id, "COS204").await;
    enroll(&db, enrolled_course.id, student_id).await;

    for course_id in [enrolled_course.id, other_course.id] {
        let created = send_json(
            &app,
            "POST",
            "/api/attendance/sessions",
            Some(&lecturer_token),
            &session_payload(course_id, None),
        )
        .await;
        assert_eq!(created.status(), StatusCode::CREATED);
    }

    let response = send_get(&app, "/api/attendance/sessions/active", Some(&student_token)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_json_body(response).await;
    let sessions = json["data"].as_array().unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0]["course_id"], enrolled_course.id);
}

#[tokio::test]
#[serial]
async fn mark_attendance_end_to_end() {
    let db = setup_test_db().await;
    let encoder = Arc::new(StubEncoder::good(vec![0.25; 128]));
    let app = make_app(db.clone(), encoder);
    let (lecturer_id, lecturer_token) = register_account(&app, "staff205", "lecturer").await;
    let (student_id, student_token) = register_account(&app, "u20100002", "student").await;
    let course = seed_course(&db, lecturer_id, "COS205").await;
    enroll(&db, course.id, student_id).await;

    let created = send_json(
        &app,
        "POST",
        "/api/attendance/sessions",
        Some(&lecturer_token),
        &session_payload(course.id, None),
    )
    .await;
    let session_id = get_json_body(created).await["data"]["id"].as_i64().unwrap();

    // Marking before enrolling a face template is a conflict.
    let no_template = send_json(
        &app,
        "POST",
        "/api/attendance/mark",
        Some(&student_token),
        &mark_payload(session_id, CAMPUS.0, CAMPUS.1),
    )
    .await;
    assert_eq!(no_template.status(), StatusCode::CONFLICT);

    let enrolled = send_json(
        &app,
        "POST",
        "/api/auth/register-face",
        Some(&student_token),
        &json!({"image_data": TINY_PNG}),
    )
    .await;
    assert_eq!(enrolled.status(), StatusCode::OK);

    // ~56 m from the target, inside the 100 m default radius.
    let accepted = send_json(
        &app,
        "POST",
        "/api/attendance/mark",
        Some(&student_token),
        &mark_payload(session_id, CAMPUS.0 + 0.0005, CAMPUS.1),
    )
    .await;
    assert_eq!(accepted.status(), StatusCode::OK);
    let json = get_json_body(accepted).await;
    assert_eq!(json["data"]["record"]["face_verified"], true);
    assert_eq!(json["data"]["record"]["location_verified"], true);
    assert!(json["data"]["distance_m"].as_f64().unwrap() < 100.0);

    // A second attempt is rejected without creating another record.
    let duplicate = send_json(
        &app,
        "POST",
        "/api/attendance/mark",
        Some(&student_token),
        &mark_payload(session_id, CAMPUS.0, CAMPUS.1),
    )
    .await;
    assert_eq!(duplicate.status(), StatusCode::BAD_REQUEST);
    let json = get_json_body(duplicate).await;
    assert_eq!(json["data"]["outcome"], "already_marked");
    assert!(json["message"].as_str().unwrap().contains("already"));

    // The lecturer sees exactly one record; the student sees it in history.
    let records = send_get(
        &app,
        &format!("/api/attendance/sessions/{session_id}/records"),
        Some(&lecturer_token),
    )
    .await;
    assert_eq!(records.status(), StatusCode::OK);
    let json = get_json_body(records).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 1);

    let history = send_get(&app, "/api/attendance/history", Some(&student_token)).await;
    let json = get_json_body(history).await;
    assert_eq!(json["data"].as_array().unwrap().len(), 1);
    assert_eq!(json["data"][0]["session_id"], session_id);
}

#[tokio::test]
#[serial]
async fn mark_outside_geofence_is_rejected_with_distance() {
    let db = setup_test_db().await;
    let app = make_app(db.clone(), Arc::new(StubEncoder::good(vec![0.25; 128])));
    let (lecturer_id, lecturer_token) = register_account(&app, "staff206", "lecturer").await;
    let (student_id, student_token) = register_account(&app, "u20100003", "student").await;
    let course = seed_course(&db, lecturer_id, "COS206").await;
    enroll(&db, course.id, student_id).await;

    let created = send_json(
        &app,
        "POST",
        "/api/attendance/sessions",
        Some(&lecturer_token),
        &session_payload(course.id, None),
    )
    .await;
    let session_id = get_json_body(created).await["data"]["id"].as_i64().unwrap();

    let enrolled = send_json(
        &app,
        "POST",
        "/api/auth/register-face",
        Some(&student_token),
        &json!({"image_data": TINY_PNG}),
    )
    .await;
    assert_eq!(enrolled.status(), StatusCode::OK);

    // ~1112 m north of the session target.
    let response = send_json(
        &app,
        "POST",
        "/api/attendance/mark",
        Some(&student_token),
        &mark_payload(session_id, CAMPUS.0 + 0.01, CAMPUS.1),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = get_json_body(response).await;
    assert_eq!(json["success"], false);
    assert_eq!(json["data"]["outcome"], "rejected");
    assert_eq!(json["data"]["failed"][0], "location");
    assert!(json["data"]["distance_m"].as_f64().unwrap() > 1000.0);
}

#[tokio::test]
#[serial]
async fn unenrolled_student_cannot_mark() {
    let db = setup_test_db().await;
    let app = make_app(db.clone(), Arc::new(StubEncoder::good(vec![0.25; 128])));
    let (lecturer_id, lecturer_token) = register_account(&app, "staff207", "lecturer").await;
    let (_, student_token) = register_account(&app, "u20100004", "student").await;
    let course = seed_course(&db, lecturer_id, "COS207").await;

    let created = send_json(
        &app,
        "POST",
        "/api/attendance/sessions",
        Some(&lecturer_token),
        &session_payload(course.id, None),
    )
    .await;
    let session_id = get_json_body(created).await["data"]["id"].as_i64().unwrap();

    let enrolled = send_json(
        &app,
        "POST",
        "/api/auth/register-face",
        Some(&student_token),
        &json!({"image_data": TINY_PNG}),
    )
    .await;
    assert_eq!(enrolled.status(), StatusCode::OK);

    let response = send_json(
        &app,
        "POST",
        "/api/attendance/mark",
        Some(&student_token),
        &mark_payload(session_id, CAMPUS.0, CAMPUS.1),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
#[serial]
async fn session_records_are_owner_only() {
    let db = setup_test_db().await;
    let app = make_app(db.clone(), Arc::new(StubEncoder::no_face()));
    let (owner_id, owner_token) = register_account(&app, "staff208", "lecturer").await;
    let (_, other_token) = register_account(&app, "staff209", "lecturer").await;
    let course = seed_course(&db, owner_id, "COS208").await;

    let created = send_json(
        &app,
        "POST",
        "/api/attendance/sessions",
        Some(&owner_token),
        &session_payload(course.id, None),
    )
    .await;
    let session_id = get_json_body(created).await["data"]["id"].as_i64().unwrap();

    let response = send_get(
        &app,
        &format!("/api/attendance/sessions/{session_id}/records"),
        Some(&other_token),
    )
    .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let missing = send_get(
        &app,
        "/api/attendance/sessions/999999/records",
        Some(&owner_token),
    )
    .await;
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}
