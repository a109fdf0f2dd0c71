//! Thin HTTP client over the attendance API. Every call returns the raw
//! status plus the decoded response envelope; interpretation lives in
//! [`crate::workflow`].

use async_trait::async_trait;
use serde_json::{Value, json};
use util::geo::Location;

use crate::error::ClientError;

/// One server reply: HTTP status and the `{success, data, message}`
/// envelope body.
#[derive(Debug, Clone)]
pub struct ApiReply {
    pub status: u16,
    pub body: Value,
}

impl ApiReply {
    pub fn message(&self) -> &str {
        self.body["message"].as_str().unwrap_or_default()
    }

    pub fn data(&self) -> &Value {
        &self.body["data"]
    }
}

/// The subset of the server API the capture workflow needs. Mocked in
/// tests.
#[async_trait]
pub trait AttendanceApi: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> Result<ApiReply, ClientError>;
    async fn test_quality(&self, token: &str, image_data: &str) -> Result<ApiReply, ClientError>;
    async fn register_face(&self, token: &str, image_data: &str) -> Result<ApiReply, ClientError>;
    async fn mark(
        &self,
        token: &str,
        session_id: i64,
        image_data: &str,
        location: Location,
    ) -> Result<ApiReply, ClientError>;
    async fn active_sessions(&self, token: &str) -> Result<ApiReply, ClientError>;
    async fn history(&self, token: &str) -> Result<ApiReply, ClientError>;
}

pub struct HttpAttendanceApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpAttendanceApi {
    /// `base_url` points at the server root, e.g. `http://127.0.0.1:3000`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    async fn post(
        &self,
        path: &str,
        token: Option<&str>,
        payload: &Value,
    ) -> Result<ApiReply, ClientError> {
        let mut req = self
            .client
            .post(format!("{}{path}", self.base_url))
            .json(payload);
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await?;
        Self::decode(resp).await
    }

    async fn get(&self, path: &str, token: &str) -> Result<ApiReply, ClientError> {
        let resp = self
            .client
            .get(format!("{}{path}", self.base_url))
            .bearer_auth(token)
            .send()
            .await?;
        Self::decode(resp).await
    }

    async fn decode(resp: reqwest::Response) -> Result<ApiReply, ClientError> {
        let status = resp.status().as_u16();
        let body: Value = resp
            .json()
            .await
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;
        Ok(ApiReply { status, body })
    }
}

#[async_trait]
impl AttendanceApi for HttpAttendanceApi {
    async fn login(&self, username: &str, password: &str) -> Result<ApiReply, ClientError> {
        self.post(
            "/api/auth/login",
            None,
            &json!({"username": username, "password": password}),
        )
        .await
    }

    async fn test_quality(&self, token: &str, image_data: &str) -> Result<ApiReply, ClientError> {
        self.post(
            "/api/auth/test-face-quality",
            Some(token),
            &json!({"image_data": image_data}),
        )
        .await
    }

    async fn register_face(&self, token: &str, image_data: &str) -> Result<ApiReply, ClientError> {
        self.post(
            "/api/auth/register-face",
            Some(token),
            &json!({"image_data": image_data}),
        )
        .await
    }

    async fn mark(
        &self,
        token: &str,
        session_id: i64,
        image_data: &str,
        location: Location,
    ) -> Result<ApiReply, ClientError> {
        self.post(
            "/api/attendance/mark",
            Some(token),
            &json!({
                "session_id": session_id,
                "image_data": image_data,
                "latitude": location.latitude,
                "longitude": location.longitude,
                "accuracy_m": location.accuracy_m,
            }),
        )
        .await
    }

    async fn active_sessions(&self, token: &str) -> Result<ApiReply, ClientError> {
        self.get("/api/attendance/sessions/active", token).await
    }

    async fn history(&self, token: &str) -> Result<ApiReply, ClientError> {
        self.get("/api/attendance/history", token).await
    }
}
