use std::sync::mpsc::Sender;

use crate::error::{Result, TrackerError};
use crate::geo_math::GeoPoint;
use crate::history::HistoryStore;
use crate::location::{LocationSource, WatchId, WatchOptions};
use crate::runtime::TrackerEvent;
use crate::session::{LiveMetrics, SessionTracker, Status};
use crate::summary::{self, SessionSummary, DEFAULT_DATE_FORMAT};

/// Drives one [`SessionTracker`] from user commands and incoming events.
///
/// Holds at most one location watch at a time. The watch is acquired when a session
/// starts, kept across pauses, and released on stop or when the controller is dropped.
/// Ticks only reach the tracker while it is running, and location events are only
/// applied when they come from the current watch.
pub struct TrackingController<L: LocationSource> {
    tracker: SessionTracker,
    source: L,
    options: WatchOptions,
    sink: Sender<TrackerEvent>,
    watch: Option<WatchId>,
    date_format: String,
    location_error: Option<TrackerError>,
}

impl<L: LocationSource> TrackingController<L> {
    pub fn new(source: L, options: WatchOptions, sink: Sender<TrackerEvent>) -> Self {
        Self {
            tracker: SessionTracker::new(),
            source,
            options,
            sink,
            watch: None,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            location_error: None,
        }
    }

    pub fn with_date_format(mut self, date_format: impl Into<String>) -> Self {
        self.date_format = date_format.into();
        self
    }

    /// One-shot position for the initial view
    pub fn current_position(&mut self) -> Result<GeoPoint> {
        self.source.current_position().map_err(|e| {
            log::warn!("{}", e);
            e
        })
    }

    pub fn start(&mut self) -> Result<()> {
        self.tracker.start()?;
        self.release_watch();
        self.location_error = None;

        match self.source.watch_position(&self.options, self.sink.clone()) {
            Ok(id) => self.watch = Some(id),
            Err(e) => {
                // Time keeps running without fixes
                log::warn!("tracking without location updates: {}", e);
                self.location_error = Some(e);
            }
        }
        Ok(())
    }

    pub fn pause(&mut self) -> Result<()> {
        self.tracker.pause()
    }

    pub fn resume(&mut self) -> Result<()> {
        self.tracker.resume()
    }

    pub fn stop(&mut self) -> Result<()> {
        self.tracker.stop()?;
        self.release_watch();
        Ok(())
    }

    /// Apply one event from the runtime loop
    pub fn handle_event(&mut self, event: TrackerEvent) {
        match event {
            TrackerEvent::Tick => {
                if self.tracker.status() == Status::Running {
                    if let Err(e) = self.tracker.tick() {
                        log::error!("tick lost: {}", e);
                    }
                }
            }
            TrackerEvent::Fix(id, point) => {
                if self.is_current(id) {
                    self.tracker.on_fix(point);
                } else {
                    log::debug!("dropping fix from stale watch {:?}", id);
                }
            }
            TrackerEvent::LocationError(id, message) => {
                if self.is_current(id) {
                    log::warn!("location error: {}", message);
                    self.location_error = Some(TrackerError::LocationUnavailable { message });
                } else {
                    log::debug!("dropping error from stale watch {:?}: {}", id, message);
                }
            }
        }
    }

    pub fn summary(&self) -> Result<SessionSummary> {
        summary::build_with_format(&self.tracker, &self.date_format)
    }

    /// Persist the stopped session and return to idle.
    ///
    /// On a store failure the tracker stays stopped so the save can be retried.
    pub fn save<S: HistoryStore + ?Sized>(&mut self, store: &mut S) -> Result<SessionSummary> {
        let summary = self.summary()?;
        let id = store.save(&summary)?;
        self.tracker.reset()?;
        Ok(summary.with_id(id))
    }

    /// Drop a stopped session without saving it
    pub fn discard(&mut self) -> Result<()> {
        if self.tracker.status() != Status::Stopped {
            return Err(TrackerError::InvalidTransition {
                action: "discard",
                status: self.tracker.status(),
            });
        }
        log::info!("session discarded");
        self.tracker.reset()
    }

    pub fn tracker(&self) -> &SessionTracker {
        &self.tracker
    }

    pub fn metrics(&self) -> LiveMetrics {
        self.tracker.metrics()
    }

    pub fn is_watching(&self) -> bool {
        self.watch.is_some()
    }

    /// Id of the watch feeding the current session, if any
    pub fn watch_id(&self) -> Option<WatchId> {
        self.watch
    }

    pub fn location_error(&self) -> Option<&TrackerError> {
        self.location_error.as_ref()
    }

    pub fn source(&self) -> &L {
        &self.source
    }

    fn is_current(&self, id: WatchId) -> bool {
        self.watch == Some(id)
    }

    fn release_watch(&mut self) {
        if let Some(id) = self.watch.take() {
            self.source.clear_watch(id);
        }
    }
}

impl<L: LocationSource> Drop for TrackingController<L> {
    fn drop(&mut self) {
        self.release_watch();
    }
}
