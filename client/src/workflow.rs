//! The capture workflows: enrollment with quality retakes, and attendance
//! marking. `CaptureSession` owns the bearer token explicitly and drops it
//! the moment the server says it expired.

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use std::sync::Arc;
use tracing::debug;
use util::geo::Location;

use crate::api::{ApiReply, AttendanceApi};
use crate::error::ClientError;

/// Supplies captured frames as base64 data URLs. The CLI reads files; a
/// kiosk build would wrap a camera.
#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn capture(&mut self) -> Result<String, ClientError>;
}

/// Encodes raw image bytes as the data URL the server expects.
pub fn encode_frame(bytes: &[u8], mime_subtype: &str) -> String {
    format!(
        "data:image/{mime_subtype};base64,{}",
        BASE64.encode(bytes)
    )
}

/// User-facing outcome of a workflow step, mirroring the server's failure
/// taxonomy.
#[derive(Debug, Clone, PartialEq)]
pub enum Feedback {
    LoggedIn,
    Accepted {
        distance_m: f64,
    },
    /// Verification ran and at least one factor failed.
    Rejected {
        failed: Vec<String>,
        distance_m: f64,
        radius_m: f64,
    },
    Enrolled {
        quality_score: f32,
    },
    /// A standalone probe passed; nothing was stored.
    QualityOk {
        score: f32,
    },
    QualityTooLow {
        score: f32,
        suggestions: Vec<String>,
    },
    AlreadyMarked,
    SessionClosed,
    NoTemplate,
    NotEnrolled,
    /// The token expired or was revoked; the session dropped it.
    SessionExpired,
    Failed(String),
}

pub struct CaptureSession {
    api: Arc<dyn AttendanceApi>,
    token: Option<String>,
}

impl CaptureSession {
    pub fn new(api: Arc<dyn AttendanceApi>) -> Self {
        Self { api, token: None }
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Logs in and retains the issued token for subsequent calls.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<Feedback, ClientError> {
        let reply = self.api.login(username, password).await?;
        if reply.status == 200 {
            let token = reply.data()["token"]
                .as_str()
                .ok_or_else(|| ClientError::InvalidResponse("login reply without token".into()))?
                .to_owned();
            self.token = Some(token);
            Ok(Feedback::LoggedIn)
        } else {
            Ok(Feedback::Failed(reply.message().to_owned()))
        }
    }

    /// Adopts a token obtained elsewhere (e.g. from the environment).
    pub fn adopt_token(&mut self, token: impl Into<String>) {
        self.token = Some(token.into());
    }

    fn token(&self) -> Result<&str, ClientError> {
        self.token.as_deref().ok_or(ClientError::NotAuthenticated)
    }

    /// Probes one capture against the quality gate without enrolling.
    pub async fn check_quality(
        &mut self,
        frames: &mut dyn FrameSource,
    ) -> Result<Feedback, ClientError> {
        let frame = frames.capture().await?;
        let token = self.token()?.to_owned();
        let probe = self.api.test_quality(&token, &frame).await?;

        if self.expired(&probe) {
            return Ok(Feedback::SessionExpired);
        }
        Ok(match Self::quality_feedback(&probe) {
            Ok(()) => Feedback::QualityOk {
                score: probe.data()["quality_score"].as_f64().unwrap_or_default() as f32,
            },
            Err(feedback) => feedback,
        })
    }

    /// Quality-probes captures until one passes (up to `max_retakes`
    /// additional attempts), then registers the passing frame.
    pub async fn enroll_face(
        &mut self,
        frames: &mut dyn FrameSource,
        max_retakes: u32,
    ) -> Result<Feedback, ClientError> {
        let mut last_quality = Feedback::Failed("no capture attempted".into());

        for attempt in 0..=max_retakes {
            let frame = frames.capture().await?;
            let token = self.token()?.to_owned();
            let probe = self.api.test_quality(&token, &frame).await?;

            if self.expired(&probe) {
                return Ok(Feedback::SessionExpired);
            }

            match Self::quality_feedback(&probe) {
                Ok(()) => {
                    let reply = self.api.register_face(&token, &frame).await?;
                    if self.expired(&reply) {
                        return Ok(Feedback::SessionExpired);
                    }
                    return Ok(if reply.status == 200 {
                        Feedback::Enrolled {
                            quality_score: reply.data()["quality_score"]
                                .as_f64()
                                .unwrap_or_default()
                                as f32,
                        }
                    } else {
                        Feedback::Failed(reply.message().to_owned())
                    });
                }
                Err(feedback) => {
                    debug!(attempt, "capture below quality threshold, retaking");
                    last_quality = feedback;
                }
            }
        }

        Ok(last_quality)
    }

    /// Captures one frame and submits a dual-factor mark for `session_id`
    /// at the given location.
    pub async fn mark_attendance(
        &mut self,
        frames: &mut dyn FrameSource,
        session_id: i64,
        location: Location,
    ) -> Result<Feedback, ClientError> {
        let frame = frames.capture().await?;
        let token = self.token()?.to_owned();
        let reply = self.api.mark(&token, session_id, &frame, location).await?;

        if self.expired(&reply) {
            return Ok(Feedback::SessionExpired);
        }

        Ok(Self::mark_feedback(&reply))
    }

    /// Detects an expired token and forgets it.
    fn expired(&mut self, reply: &ApiReply) -> bool {
        if reply.status == 401 {
            self.token = None;
            return true;
        }
        false
    }

    fn quality_feedback(reply: &ApiReply) -> Result<(), Feedback> {
        if reply.status == 200 {
            return Ok(());
        }
        let data = reply.data();
        if data["status"] == "below_threshold" {
            return Err(Feedback::QualityTooLow {
                score: data["quality_score"].as_f64().unwrap_or_default() as f32,
                suggestions: data["suggestions"]
                    .as_array()
                    .map(|a| {
                        a.iter()
                            .filter_map(|s| s.as_str().map(str::to_owned))
                            .collect()
                    })
                    .unwrap_or_default(),
            });
        }
        Err(Feedback::Failed(reply.message().to_owned()))
    }

    fn mark_feedback(reply: &ApiReply) -> Feedback {
        let data = reply.data();
        match reply.status {
            200 => Feedback::Accepted {
                distance_m: data["distance_m"].as_f64().unwrap_or_default(),
            },
            400 if data["outcome"] == "rejected" => Feedback::Rejected {
                failed: data["failed"]
                    .as_array()
                    .map(|a| {
                        a.iter()
                            .filter_map(|s| s.as_str().map(str::to_owned))
                            .collect()
                    })
                    .unwrap_or_default(),
                distance_m: data["distance_m"].as_f64().unwrap_or_default(),
                radius_m: data["radius_m"].as_f64().unwrap_or_default(),
            },
            400 if data["outcome"] == "already_marked" => Feedback::AlreadyMarked,
            400 if data["outcome"] == "session_closed" => Feedback::SessionClosed,
            409 => Feedback::NoTemplate,
            403 => Feedback::NotEnrolled,
            _ => Feedback::Failed(reply.message().to_owned()),
        }
    }
}
