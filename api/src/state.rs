use sea_orm::DatabaseConnection;
use services::encoder::{FaceEncoder, HttpFaceEncoder};
use std::sync::Arc;

/// Shared per-request state: the database handle and the face encoder
/// boundary. The encoder is held behind the trait so tests can substitute
/// a canned implementation.
#[derive(Clone)]
pub struct AppState {
    db: DatabaseConnection,
    encoder: Arc<dyn FaceEncoder>,
}

impl AppState {
    pub fn new(db: DatabaseConnection, encoder: Arc<dyn FaceEncoder>) -> Self {
        Self { db, encoder }
    }

    /// Production wiring: HTTP encoder sidecar from configuration.
    pub fn from_config(db: DatabaseConnection) -> Self {
        Self::new(db, Arc::new(HttpFaceEncoder::from_config()))
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn encoder(&self) -> &dyn FaceEncoder {
        self.encoder.as_ref()
    }
}
