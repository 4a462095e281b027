// Library surface for the runlog binary and integration tests.
// Presentation lives outside the crate; everything here is headless.
pub mod app_dirs;
pub mod config;
pub mod controller;
pub mod error;
pub mod geo_math;
pub mod history;
pub mod location;
pub mod runtime;
pub mod session;
pub mod summary;

pub use error::{Result, TrackerError};
pub use geo_math::GeoPoint;
pub use session::{SessionTracker, Status};
pub use summary::SessionSummary;
