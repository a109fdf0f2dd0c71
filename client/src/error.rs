use thiserror::Error;

use crate::location::LocationError;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("server unreachable: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected server response: {0}")]
    InvalidResponse(String),

    #[error("not logged in")]
    NotAuthenticated,

    #[error(transparent)]
    Location(#[from] LocationError),

    #[error("could not read capture: {0}")]
    Io(#[from] std::io::Error),
}
