use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};
use crate::geo_math::{self, GeoPoint};
use crate::session::{SessionTracker, Status};

/// Calendar date format used for stored runs (day.month.year, no padding).
/// The date is taken in UTC; start and end clock times are local.
pub const DEFAULT_DATE_FORMAT: &str = "%-d.%-m.%Y";
const CLOCK_FORMAT: &str = "%H:%M:%S";

/// Immutable record of a completed session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Assigned by the history store on insert
    pub id: Option<i64>,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub distance_km: String,
    pub duration: String,
    pub pace_min_per_km: String,
    pub avg_speed_kmh: f64,
    pub path: Vec<GeoPoint>,
}

impl SessionSummary {
    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }
}

pub fn build(tracker: &SessionTracker) -> Result<SessionSummary> {
    build_with_format(tracker, DEFAULT_DATE_FORMAT)
}

/// Build the summary of a stopped session, formatting its date with `date_format`
pub fn build_with_format(tracker: &SessionTracker, date_format: &str) -> Result<SessionSummary> {
    let invalid = || TrackerError::InvalidTransition {
        action: "build summary",
        status: tracker.status(),
    };

    if tracker.status() != Status::Stopped {
        return Err(invalid());
    }
    let (started_at, ended_at) = match (tracker.started_at(), tracker.ended_at()) {
        (Some(s), Some(e)) => (s, e),
        _ => return Err(invalid()),
    };

    let distance = tracker.distance_meters();
    let elapsed = tracker.elapsed_seconds();

    Ok(SessionSummary {
        id: None,
        date: started_at.with_timezone(&Utc).format(date_format).to_string(),
        start_time: started_at.format(CLOCK_FORMAT).to_string(),
        end_time: ended_at.format(CLOCK_FORMAT).to_string(),
        distance_km: geo_math::format_km(distance),
        duration: geo_math::format_duration(elapsed),
        pace_min_per_km: geo_math::pace_min_per_km(distance, elapsed),
        avg_speed_kmh: geo_math::round2(tracker.avg_speed_kmh()),
        path: tracker.path().to_vec(),
    })
}
