//! Capture-side library for the attendance service: location resolution,
//! the HTTP client, and the marking/enrollment workflows driven by the
//! `rollcall` binary.

pub mod api;
pub mod error;
pub mod location;
pub mod workflow;

pub use error::ClientError;
