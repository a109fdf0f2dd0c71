pub mod attendance;
pub mod encoder;
pub mod enrollment;
pub mod error;
pub mod session;

pub use error::ServiceError;

#[cfg(test)]
pub(crate) mod testing;
