use api::routes::routes;
use api::state::AppState;
use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, header::CONTENT_TYPE},
    response::Response,
};
use sea_orm::DatabaseConnection;
use serde_json::Value;
use services::encoder::{EncoderError, FaceAnalysis, FaceEncoder, FaceImage};
use std::sync::{Arc, Once};
use tower::ServiceExt;

/// A valid one-pixel PNG data URL for request payloads.
pub const TINY_PNG: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg==";

static ENV_INIT: Once = Once::new();

/// Populates the environment the config singleton requires before any part
/// of the app reads it.
pub fn init_test_env() {
    ENV_INIT.call_once(|| unsafe {
        std::env::set_var("DATABASE_PATH", "sqlite::memory:");
        std::env::set_var("JWT_SECRET", "integration-test-secret");
    });
}

/// A face encoder that returns the same analysis for every frame.
pub struct StubEncoder(FaceAnalysis);

impl StubEncoder {
    pub fn good(embedding: Vec<f32>) -> Self {
        Self(FaceAnalysis {
            faces_detected: 1,
            embedding,
            quality_score: 0.9,
            quality_issues: Vec::new(),
        })
    }

    pub fn low_quality() -> Self {
        Self(FaceAnalysis {
            faces_detected: 1,
            embedding: vec![0.5; 128],
            quality_score: 0.2,
            quality_issues: vec!["image too dark".into()],
        })
    }

    pub fn no_face() -> Self {
        Self(FaceAnalysis {
            faces_detected: 0,
            embedding: Vec::new(),
            quality_score: 0.0,
            quality_issues: Vec::new(),
        })
    }
}

#[async_trait]
impl FaceEncoder for StubEncoder {
    async fn analyze(&self, _image: &FaceImage) -> Result<FaceAnalysis, EncoderError> {
        Ok(self.0.clone())
    }
}

pub fn make_app(db: DatabaseConnection, encoder: Arc<dyn FaceEncoder>) -> Router {
    init_test_env();
    Router::new().nest("/api", routes(AppState::new(db, encoder)))
}

pub async fn get_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// Sends one JSON request through the router.
pub async fn send_json(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    payload: &Value,
) -> Response {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let req = builder
        .body(Body::from(serde_json::to_vec(payload).unwrap()))
        .unwrap();
    app.clone().oneshot(req).await.unwrap()
}

pub async fn send_get(app: &Router, uri: &str, token: Option<&str>) -> Response {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let req = builder.body(Body::empty()).unwrap();
    app.clone().oneshot(req).await.unwrap()
}

/// Registers an account through the API and returns its (id, token).
pub async fn register_account(app: &Router, username: &str, role: &str) -> (i64, String) {
    let payload = serde_json::json!({
        "username": username,
        "email": format!("{username}@up.example"),
        "password": "strongpassword",
        "role": role,
    });
    let response = send_json(app, "POST", "/api/auth/register", None, &payload).await;
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);
    let json = get_json_body(response).await;
    (
        json["data"]["id"].as_i64().unwrap(),
        json["data"]["token"].as_str().unwrap().to_owned(),
    )
}
