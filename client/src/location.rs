//! Location resolution for attendance marking: a device provider with a
//! hard timeout, manual coordinate entry, and named campus presets. All
//! three paths produce the same [`Location`].

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;
use util::config::PresetLocation;
use util::geo::Location;

/// Hard ceiling on how long we wait for a device fix.
pub const DEVICE_TIMEOUT: Duration = Duration::from_secs(15);
/// A fix older than this is treated as unavailable rather than trusted.
pub const MAX_FIX_AGE: Duration = Duration::from_secs(300);

#[derive(Debug, Error, PartialEq)]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("device position unavailable")]
    PositionUnavailable,
    #[error("timed out waiting for a device fix")]
    Timeout,
    #[error("platform location error: {0}")]
    Platform(String),
    #[error("{0}")]
    InvalidInput(String),
    #[error("unknown preset location '{0}'")]
    UnknownPreset(String),
}

/// One positioning readout from the device.
#[derive(Debug, Clone, Copy)]
pub struct DeviceFix {
    pub location: Location,
    /// How old the fix was when the device reported it.
    pub age: Duration,
}

/// Platform positioning backend. Implementations wrap whatever the host
/// offers (GPSd, CoreLocation, a browser bridge); tests supply canned
/// fixes.
#[async_trait]
pub trait DeviceLocationProvider: Send + Sync {
    async fn current_fix(&self, max_age: Duration) -> Result<DeviceFix, LocationError>;
}

/// Resolves the device position under [`DEVICE_TIMEOUT`], rejecting fixes
/// older than [`MAX_FIX_AGE`].
pub async fn resolve_via_device(
    provider: &dyn DeviceLocationProvider,
) -> Result<Location, LocationError> {
    resolve_via_device_within(provider, DEVICE_TIMEOUT).await
}

async fn resolve_via_device_within(
    provider: &dyn DeviceLocationProvider,
    timeout: Duration,
) -> Result<Location, LocationError> {
    let fix = tokio::time::timeout(timeout, provider.current_fix(MAX_FIX_AGE))
        .await
        .map_err(|_| LocationError::Timeout)??;

    if fix.age > MAX_FIX_AGE {
        return Err(LocationError::PositionUnavailable);
    }
    Ok(fix.location)
}

/// Parses user-typed coordinates. Accuracy is 0 (unknown) by definition.
pub fn resolve_manually(lat_text: &str, lng_text: &str) -> Result<Location, LocationError> {
    Location::parse(lat_text, lng_text).map_err(|e| LocationError::InvalidInput(e.to_string()))
}

/// Where to fall back when the device cannot produce a usable fix.
#[derive(Debug, Clone)]
pub enum Fallback {
    Coordinates {
        lat: String,
        lng: String,
    },
    Preset {
        presets: HashMap<String, PresetLocation>,
        name: String,
    },
    None,
}

/// The full resolution chain: device fix first (when a provider is
/// available), then the fallback. Any device failure triggers the
/// fallback, not just timeouts; with `Fallback::None` the device error
/// propagates unchanged.
pub async fn resolve(
    provider: Option<&dyn DeviceLocationProvider>,
    fallback: &Fallback,
) -> Result<Location, LocationError> {
    if let Some(provider) = provider {
        match resolve_via_device(provider).await {
            Ok(location) => return Ok(location),
            Err(err) => {
                if matches!(fallback, Fallback::None) {
                    return Err(err);
                }
                warn!(%err, "device fix failed, falling back");
            }
        }
    }

    match fallback {
        Fallback::Coordinates { lat, lng } => resolve_manually(lat, lng),
        Fallback::Preset { presets, name } => resolve_from_preset(presets, name),
        Fallback::None => Err(LocationError::PositionUnavailable),
    }
}

/// Looks a named campus landmark up in the preset table.
pub fn resolve_from_preset(
    presets: &HashMap<String, PresetLocation>,
    name: &str,
) -> Result<Location, LocationError> {
    let preset = presets
        .get(name)
        .ok_or_else(|| LocationError::UnknownPreset(name.to_owned()))?;
    Location::new(preset.lat, preset.lng, 0.0)
        .map_err(|e| LocationError::InvalidInput(e.to_string()))
}
