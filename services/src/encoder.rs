//! Boundary to the external face encoder service.
//!
//! The encoder is a black box that turns one captured image into a
//! fixed-length embedding plus a quality score. Everything biometric beyond
//! "compare two embeddings against a tolerance" lives on the other side of
//! this trait.

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EncoderError {
    #[error("encoder service unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),
    #[error("encoder returned an invalid response: {0}")]
    InvalidResponse(String),
}

/// A captured frame as transmitted by clients: a base64 JPEG/PNG data URL.
///
/// The raw data URL is kept alongside the decoded bytes so the HTTP encoder
/// can forward the payload unchanged.
#[derive(Debug, Clone)]
pub struct FaceImage {
    data_url: String,
    bytes: Vec<u8>,
}

impl FaceImage {
    /// Parses a `data:image/...;base64,...` payload, rejecting anything
    /// that is not a well-formed base64 image data URL.
    pub fn from_data_url(data_url: &str) -> Result<Self, String> {
        let rest = data_url
            .strip_prefix("data:image/")
            .ok_or_else(|| "expected a data:image/... URL".to_string())?;
        let (_, encoded) = rest
            .split_once(";base64,")
            .ok_or_else(|| "expected base64-encoded image data".to_string())?;
        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| format!("invalid base64 image data: {e}"))?;
        if bytes.is_empty() {
            return Err("image payload is empty".to_string());
        }
        Ok(Self {
            data_url: data_url.to_owned(),
            bytes,
        })
    }

    pub fn as_data_url(&self) -> &str {
        &self.data_url
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// What the encoder reports for one image.
#[derive(Debug, Clone, Deserialize)]
pub struct FaceAnalysis {
    pub faces_detected: u32,
    /// Fixed-length embedding for the most prominent face. Empty when no
    /// face was detected.
    #[serde(default)]
    pub embedding: Vec<f32>,
    /// 0.0..=1.0 capture quality estimate.
    #[serde(default)]
    pub quality_score: f32,
    /// Human-readable capture problems ("image too dark", "face not
    /// centered", ...).
    #[serde(default)]
    pub quality_issues: Vec<String>,
}

#[async_trait]
pub trait FaceEncoder: Send + Sync {
    async fn analyze(&self, image: &FaceImage) -> Result<FaceAnalysis, EncoderError>;
}

/// Talks to the encoder sidecar over HTTP (`POST /analyze`).
pub struct HttpFaceEncoder {
    client: reqwest::Client,
    base_url: String,
}

impl HttpFaceEncoder {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: format!("http://{host}:{port}"),
        }
    }

    pub fn from_config() -> Self {
        Self::new(
            &util::config::face_encoder_host(),
            util::config::face_encoder_port(),
        )
    }
}

#[async_trait]
impl FaceEncoder for HttpFaceEncoder {
    async fn analyze(&self, image: &FaceImage) -> Result<FaceAnalysis, EncoderError> {
        let url = format!("{}/analyze", self.base_url);
        let resp = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "image_data": image.as_data_url() }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(EncoderError::InvalidResponse(format!(
                "status {}",
                resp.status()
            )));
        }

        let analysis: FaceAnalysis = resp
            .json()
            .await
            .map_err(|e| EncoderError::InvalidResponse(e.to_string()))?;
        Ok(analysis)
    }
}

/// Euclidean distance between two embeddings. Vectors of different lengths
/// (e.g. templates from a different encoder generation) compare as
/// infinitely far apart, which fails verification rather than panicking.
pub fn embedding_distance(known: &[f32], probe: &[f32]) -> f32 {
    if known.len() != probe.len() || known.is_empty() {
        return f32::INFINITY;
    }
    known
        .iter()
        .zip(probe)
        .map(|(a, b)| (a - b) * (a - b))
        .sum::<f32>()
        .sqrt()
}

/// Match rule: distance at or below the tolerance verifies the face.
/// Lower tolerance = stricter matching.
pub fn embedding_matches(known: &[f32], probe: &[f32], tolerance: f32) -> (bool, f32) {
    let distance = embedding_distance(known, probe);
    (distance <= tolerance, distance)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TINY_PNG: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNk+M9QDwADhgGAWjR9awAAAABJRU5ErkJggg==";

    #[test]
    fn parses_well_formed_data_url() {
        let image = FaceImage::from_data_url(TINY_PNG).unwrap();
        assert!(!image.is_empty());
        assert_eq!(image.as_data_url(), TINY_PNG);
    }

    #[test]
    fn rejects_non_image_payloads() {
        assert!(FaceImage::from_data_url("data:text/plain;base64,aGk=").is_err());
        assert!(FaceImage::from_data_url("plain garbage").is_err());
        assert!(FaceImage::from_data_url("data:image/jpeg;base64,!!!").is_err());
    }

    #[test]
    fn distance_is_zero_for_identical_embeddings() {
        let v = vec![0.1, -0.4, 0.25];
        let (ok, d) = embedding_matches(&v, &v, 0.6);
        assert!(ok);
        assert_eq!(d, 0.0);
    }

    #[test]
    fn tolerance_is_inclusive_and_direction_is_lower_is_closer() {
        let a = vec![0.0, 0.0, 0.0, 0.0];
        let b = vec![0.3, 0.0, 0.0, 0.0];
        // distance exactly 0.3
        let (ok, d) = embedding_matches(&a, &b, 0.3);
        assert!(ok);
        assert!((d - 0.3).abs() < 1e-6);
        let (ok, _) = embedding_matches(&a, &b, 0.29);
        assert!(!ok);
    }

    #[test]
    fn mismatched_lengths_never_match() {
        let (ok, d) = embedding_matches(&[0.1, 0.2], &[0.1, 0.2, 0.3], 10.0);
        assert!(!ok);
        assert!(d.is_infinite());
    }
}
