use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use services::attendance::AttendanceRecord;

/// Geofence radius bounds enforced at the API boundary; out-of-range
/// requests are clamped rather than rejected.
pub const MIN_RADIUS_M: f64 = 10.0;
pub const MAX_RADIUS_M: f64 = 1000.0;
pub const DEFAULT_RADIUS_M: f64 = 100.0;

#[derive(Debug, Deserialize)]
pub struct CreateSessionReq {
    pub course_id: i64,
    pub title: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_m: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct MarkAttendanceReq {
    pub session_id: i64,
    /// Captured frame as a `data:image/...;base64,...` URL.
    pub image_data: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Reported GPS accuracy in meters, if the device provides one.
    #[serde(default)]
    pub accuracy_m: f64,
}

#[derive(Debug, Serialize)]
pub struct MarkResponse {
    pub record: AttendanceRecord,
    pub distance_m: f64,
}
