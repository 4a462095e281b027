use chrono::{DateTime, Local};

use crate::error::{Result, TrackerError};
use crate::geo_math::{self, GeoPoint};

/// Lifecycle of a single tracked session
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Status {
    Idle,
    Running,
    Paused,
    Stopped,
}

/// Which user controls are offered in a given status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Controls {
    pub start: bool,
    pub pause: bool,
    pub resume: bool,
    pub stop: bool,
    pub save: bool,
    pub discard: bool,
}

impl Status {
    pub fn controls(self) -> Controls {
        match self {
            Status::Idle => Controls {
                start: true,
                ..Controls::default()
            },
            Status::Running => Controls {
                pause: true,
                stop: true,
                ..Controls::default()
            },
            Status::Paused => Controls {
                resume: true,
                stop: true,
                ..Controls::default()
            },
            Status::Stopped => Controls {
                save: true,
                discard: true,
                ..Controls::default()
            },
        }
    }
}

/// Point-in-time view of a session for display
#[derive(Debug, Clone, PartialEq)]
pub struct LiveMetrics {
    pub status: Status,
    pub elapsed_seconds: u64,
    pub distance_meters: f64,
    pub duration: String,
    pub pace_min_per_km: String,
    pub avg_speed_kmh: f64,
    pub point_count: usize,
}

/// Owns the state of one in-progress session.
///
/// Fixes and ticks only count while [`Status::Running`]. `last_fix` is kept across a
/// pause, so the first fix after resuming is measured from the last fix taken before
/// the pause.
#[derive(Debug, Clone)]
pub struct SessionTracker {
    status: Status,
    started_at: Option<DateTime<Local>>,
    ended_at: Option<DateTime<Local>>,
    elapsed_seconds: u64,
    distance_meters: f64,
    last_fix: Option<GeoPoint>,
    path: Vec<GeoPoint>,
    avg_speed_kmh: f64,
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionTracker {
    pub fn new() -> Self {
        Self {
            status: Status::Idle,
            started_at: None,
            ended_at: None,
            elapsed_seconds: 0,
            distance_meters: 0.0,
            last_fix: None,
            path: Vec::new(),
            avg_speed_kmh: 0.0,
        }
    }

    fn reject(&self, action: &'static str) -> TrackerError {
        log::warn!("rejected {} while {}", action, self.status);
        TrackerError::InvalidTransition {
            action,
            status: self.status,
        }
    }

    pub fn start(&mut self) -> Result<()> {
        self.start_at(Local::now())
    }

    pub fn start_at(&mut self, now: DateTime<Local>) -> Result<()> {
        if self.status != Status::Idle {
            return Err(self.reject("start"));
        }

        self.started_at = Some(now);
        self.ended_at = None;
        self.elapsed_seconds = 0;
        self.distance_meters = 0.0;
        self.last_fix = None;
        self.path.clear();
        self.avg_speed_kmh = 0.0;
        self.status = Status::Running;
        log::info!("session started at {}", now.format("%H:%M:%S"));
        Ok(())
    }

    pub fn pause(&mut self) -> Result<()> {
        if self.status != Status::Running {
            return Err(self.reject("pause"));
        }
        self.status = Status::Paused;
        log::info!("session paused after {}s", self.elapsed_seconds);
        Ok(())
    }

    pub fn resume(&mut self) -> Result<()> {
        if self.status != Status::Paused {
            return Err(self.reject("resume"));
        }
        self.status = Status::Running;
        log::info!("session resumed");
        Ok(())
    }

    /// Feed one position fix. Returns whether the fix was accepted.
    ///
    /// Fixes with non-finite or out-of-range coordinates are rejected and leave the
    /// session untouched.
    pub fn on_fix(&mut self, point: GeoPoint) -> bool {
        if self.status != Status::Running {
            log::debug!("dropping fix while {}", self.status);
            return false;
        }
        if !point.is_valid() {
            log::warn!("rejecting invalid fix {:?}", point);
            return false;
        }

        if let Some(prev) = self.last_fix {
            self.distance_meters += geo_math::distance_meters(&prev, &point);
        }
        self.path.push(point);
        self.last_fix = Some(point);
        log::debug!(
            "fix {:.6},{:.6} total {:.1}m",
            point.latitude,
            point.longitude,
            self.distance_meters
        );
        true
    }

    /// Advance elapsed time by one second
    pub fn tick(&mut self) -> Result<()> {
        if self.status != Status::Running {
            return Err(self.reject("tick"));
        }
        self.elapsed_seconds += 1;
        Ok(())
    }

    pub fn stop(&mut self) -> Result<()> {
        self.stop_at(Local::now())
    }

    pub fn stop_at(&mut self, now: DateTime<Local>) -> Result<()> {
        if !matches!(self.status, Status::Running | Status::Paused) {
            return Err(self.reject("stop"));
        }

        self.ended_at = Some(now);
        self.avg_speed_kmh = geo_math::avg_speed_kmh(self.distance_meters, self.elapsed_seconds);
        self.status = Status::Stopped;
        log::info!(
            "session stopped: {:.1}m in {}s",
            self.distance_meters,
            self.elapsed_seconds
        );
        Ok(())
    }

    pub fn reset(&mut self) -> Result<()> {
        if !matches!(self.status, Status::Idle | Status::Stopped) {
            return Err(self.reject("reset"));
        }
        *self = Self::new();
        Ok(())
    }

    pub fn metrics(&self) -> LiveMetrics {
        let avg_speed_kmh = if self.status == Status::Stopped {
            self.avg_speed_kmh
        } else {
            geo_math::avg_speed_kmh(self.distance_meters, self.elapsed_seconds)
        };

        LiveMetrics {
            status: self.status,
            elapsed_seconds: self.elapsed_seconds,
            distance_meters: self.distance_meters,
            duration: geo_math::format_duration(self.elapsed_seconds),
            pace_min_per_km: geo_math::pace_min_per_km(self.distance_meters, self.elapsed_seconds),
            avg_speed_kmh,
            point_count: self.path.len(),
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn started_at(&self) -> Option<DateTime<Local>> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Local>> {
        self.ended_at
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    pub fn distance_meters(&self) -> f64 {
        self.distance_meters
    }

    pub fn last_fix(&self) -> Option<GeoPoint> {
        self.last_fix
    }

    pub fn path(&self) -> &[GeoPoint] {
        &self.path
    }

    /// Average speed sampled when the session was stopped
    pub fn avg_speed_kmh(&self) -> f64 {
        self.avg_speed_kmh
    }
}
