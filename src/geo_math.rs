use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// Mean Earth radius used by the haversine formula, in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Region padding applied around a recorded path when centering a view on it
const REGION_PADDING: f64 = 1.1;

/// A single geographic position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Great-circle distance between two points in meters.
///
/// `h` is clamped to `[0, 1]` so rounding noise on identical or antipodal points
/// cannot push `sqrt(1 - h)` into NaN territory.
pub fn distance_meters(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    let d_phi = (b.latitude - a.latitude).to_radians();
    let d_lambda = (b.longitude - a.longitude).to_radians();

    let h = (d_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let h = h.clamp(0.0, 1.0);

    2.0 * EARTH_RADIUS_M * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Sum of the distances between consecutive points
pub fn path_length(path: &[GeoPoint]) -> f64 {
    path.iter()
        .tuple_windows()
        .map(|(a, b)| distance_meters(a, b))
        .sum()
}

/// `HH:MM:SS`, hours are not wrapped at 24
pub fn format_duration(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

/// Pace as `M:SS` minutes per kilometer.
///
/// Seconds that round up to 60 carry into the minutes field, so the result never
/// reads `M:60`.
pub fn pace_min_per_km(distance_meters: f64, elapsed_seconds: u64) -> String {
    if distance_meters <= 0.0 {
        return "0:00".to_string();
    }

    let minutes_per_km = (elapsed_seconds as f64 / 60.0) / (distance_meters / 1000.0);
    let mut minutes = minutes_per_km.floor() as u64;
    let mut seconds = ((minutes_per_km - minutes as f64) * 60.0).round() as u64;
    if seconds >= 60 {
        minutes += 1;
        seconds -= 60;
    }

    format!("{}:{:02}", minutes, seconds)
}

/// Average speed in km/h, unrounded
pub fn avg_speed_kmh(distance_meters: f64, elapsed_seconds: u64) -> f64 {
    if elapsed_seconds == 0 {
        return 0.0;
    }
    (distance_meters / elapsed_seconds as f64 / 1000.0) * 3600.0
}

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Meters to kilometers as a two-decimal string, e.g. `"1.00"`
pub fn format_km(distance_meters: f64) -> String {
    format!("{:.2}", distance_meters / 1000.0)
}

/// Center and span of a recorded path, used to frame it for review
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathRegion {
    pub center: GeoPoint,
    pub latitude_delta: f64,
    pub longitude_delta: f64,
}

impl PathRegion {
    pub fn from_path(path: &[GeoPoint]) -> Option<Self> {
        let first = path.first()?;
        let (mut min_lat, mut max_lat) = (first.latitude, first.latitude);
        let (mut min_lng, mut max_lng) = (first.longitude, first.longitude);

        for p in &path[1..] {
            min_lat = min_lat.min(p.latitude);
            max_lat = max_lat.max(p.latitude);
            min_lng = min_lng.min(p.longitude);
            max_lng = max_lng.max(p.longitude);
        }

        Some(Self {
            center: GeoPoint::new((min_lat + max_lat) / 2.0, (min_lng + max_lng) / 2.0),
            latitude_delta: (max_lat - min_lat) * REGION_PADDING,
            longitude_delta: (max_lng - min_lng) * REGION_PADDING,
        })
    }
}
