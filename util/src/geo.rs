//! Geodesy primitives shared by the verification services and the capture client.
//!
//! All coordinate sources (device fix, manual entry, preset landmark) normalize
//! into the same immutable [`Location`] value, and range validation happens here
//! at construction rather than downstream.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Mean Earth radius in meters, as used by the haversine formula.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeoError {
    #[error("latitude {0} out of range [-90, 90]")]
    LatitudeOutOfRange(f64),
    #[error("longitude {0} out of range [-180, 180]")]
    LongitudeOutOfRange(f64),
    #[error("accuracy must be non-negative, got {0}")]
    NegativeAccuracy(f64),
    #[error("could not parse '{0}' as a coordinate")]
    Unparseable(String),
}

/// A validated WGS84 coordinate pair.
///
/// `accuracy_m` carries the device-reported horizontal accuracy; `0.0` means
/// "unknown" (manual entry and presets have no measured accuracy).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_m: f64,
}

impl Location {
    /// Constructs a location, rejecting out-of-range values at the boundary.
    /// Boundary values (±90, ±180) are accepted.
    pub fn new(latitude: f64, longitude: f64, accuracy_m: f64) -> Result<Self, GeoError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(GeoError::LatitudeOutOfRange(latitude));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(GeoError::LongitudeOutOfRange(longitude));
        }
        if !accuracy_m.is_finite() || accuracy_m < 0.0 {
            return Err(GeoError::NegativeAccuracy(accuracy_m));
        }
        Ok(Self {
            latitude,
            longitude,
            accuracy_m,
        })
    }

    /// Parses two coordinate strings, e.g. from manual entry fields.
    /// Accuracy is 0 since nothing was measured.
    pub fn parse(lat_text: &str, lng_text: &str) -> Result<Self, GeoError> {
        let latitude: f64 = lat_text
            .trim()
            .parse()
            .map_err(|_| GeoError::Unparseable(lat_text.to_owned()))?;
        let longitude: f64 = lng_text
            .trim()
            .parse()
            .map_err(|_| GeoError::Unparseable(lng_text.to_owned()))?;
        Self::new(latitude, longitude, 0.0)
    }
}

/// Great-circle distance in meters between two locations, via the haversine
/// formula. Ignores `accuracy_m`. Pure and total over valid locations.
pub fn haversine_distance_m(a: &Location, b: &Location) -> f64 {
    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    let d_phi = (b.latitude - a.latitude).to_radians();
    let d_lambda = (b.longitude - a.longitude).to_radians();

    let h = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}
