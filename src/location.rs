use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{Result, TrackerError};
use crate::geo_math::{self, GeoPoint};
use crate::runtime::TrackerEvent;

/// How often and how finely a watch should report fixes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WatchOptions {
    /// Fixes closer than this to the previous one are not reported
    pub min_distance_meters: f64,
    pub update_interval_ms: u64,
    pub fastest_interval_ms: u64,
    pub timeout_ms: u64,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            min_distance_meters: 1.0,
            update_interval_ms: 5000,
            fastest_interval_ms: 2000,
            timeout_ms: 30000,
        }
    }
}

/// Keeps the fixes a watch with `min_distance_meters` would report: each kept fix is
/// at least that far from the previously kept one.
pub fn distance_filtered(fixes: &[GeoPoint], min_distance_meters: f64) -> Vec<GeoPoint> {
    let mut kept: Vec<GeoPoint> = Vec::with_capacity(fixes.len());
    for fix in fixes {
        match kept.last() {
            Some(prev) if geo_math::distance_meters(prev, fix) < min_distance_meters => {}
            _ => kept.push(*fix),
        }
    }
    kept
}

/// Handle to an active position subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(pub u64);

/// Supplier of position fixes
pub trait LocationSource {
    /// One-shot position, used to center the initial view
    fn current_position(&mut self) -> Result<GeoPoint>;

    /// Start delivering fixes (and location errors) into `sink` until cleared
    fn watch_position(&mut self, options: &WatchOptions, sink: Sender<TrackerEvent>)
        -> Result<WatchId>;

    fn clear_watch(&mut self, id: WatchId);
}

/// Plays back a recorded sequence of fixes from a background thread
#[derive(Debug)]
pub struct ReplayLocationSource {
    fixes: Vec<GeoPoint>,
    interval: Duration,
    next_id: u64,
    watches: HashMap<WatchId, Arc<AtomicBool>>,
}

#[derive(Debug, Deserialize)]
struct FixRecord {
    latitude: f64,
    longitude: f64,
}

impl ReplayLocationSource {
    pub fn new(fixes: Vec<GeoPoint>, interval: Duration) -> Self {
        Self {
            fixes,
            interval,
            next_id: 1,
            watches: HashMap::new(),
        }
    }

    /// Read fixes from CSV with a `latitude,longitude` header
    pub fn read_csv<R: Read>(reader: R) -> Result<Vec<GeoPoint>> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let mut fixes = Vec::new();
        for (line, record) in rdr.deserialize::<FixRecord>().enumerate() {
            let record = record?;
            let point = GeoPoint::new(record.latitude, record.longitude);
            if !point.is_valid() {
                return Err(TrackerError::Config {
                    message: format!("fix {} is out of range: {:?}", line + 1, point),
                });
            }
            fixes.push(point);
        }
        Ok(fixes)
    }

    pub fn from_csv_path<P: AsRef<Path>>(path: P, interval: Duration) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref()).map_err(|e| TrackerError::Config {
            message: format!("cannot open {}: {}", path.as_ref().display(), e),
        })?;
        Ok(Self::new(Self::read_csv(file)?, interval))
    }

    pub fn fixes(&self) -> &[GeoPoint] {
        &self.fixes
    }

    pub fn active_watches(&self) -> usize {
        self.watches.len()
    }
}

impl LocationSource for ReplayLocationSource {
    fn current_position(&mut self) -> Result<GeoPoint> {
        self.fixes
            .first()
            .copied()
            .ok_or_else(|| TrackerError::LocationUnavailable {
                message: "no recorded fixes".to_string(),
            })
    }

    fn watch_position(
        &mut self,
        options: &WatchOptions,
        sink: Sender<TrackerEvent>,
    ) -> Result<WatchId> {
        let id = WatchId(self.next_id);
        self.next_id += 1;

        let cancelled = Arc::new(AtomicBool::new(false));
        self.watches.insert(id, Arc::clone(&cancelled));

        let fixes = distance_filtered(&self.fixes, options.min_distance_meters);
        let interval = self.interval;
        std::thread::spawn(move || {
            for fix in fixes {
                if cancelled.load(Ordering::Relaxed) {
                    break;
                }
                if sink.send(TrackerEvent::Fix(id, fix)).is_err() {
                    break;
                }
                std::thread::sleep(interval);
            }
        });

        log::debug!("replay watch {:?} started", id);
        Ok(id)
    }

    fn clear_watch(&mut self, id: WatchId) {
        if let Some(cancelled) = self.watches.remove(&id) {
            cancelled.store(true, Ordering::Relaxed);
            log::debug!("replay watch {:?} cleared", id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn read_csv_with_header() {
        let data = "latitude,longitude\n60.1700, 24.9400\n60.1710,24.9410\n";
        let fixes = ReplayLocationSource::read_csv(data.as_bytes()).unwrap();
        assert_eq!(
            fixes,
            vec![GeoPoint::new(60.17, 24.94), GeoPoint::new(60.171, 24.941)]
        );
    }

    #[test]
    fn read_csv_rejects_out_of_range() {
        let data = "latitude,longitude\n95.0,24.0\n";
        assert!(matches!(
            ReplayLocationSource::read_csv(data.as_bytes()),
            Err(TrackerError::Config { .. })
        ));
    }

    #[test]
    fn read_csv_rejects_garbage() {
        let data = "latitude,longitude\nabc,24.0\n";
        assert!(ReplayLocationSource::read_csv(data.as_bytes()).is_err());
    }

    #[test]
    fn current_position_is_first_fix() {
        let mut source = ReplayLocationSource::new(
            vec![GeoPoint::new(1.0, 2.0), GeoPoint::new(3.0, 4.0)],
            Duration::ZERO,
        );
        assert_eq!(source.current_position().unwrap(), GeoPoint::new(1.0, 2.0));

        let mut empty = ReplayLocationSource::new(vec![], Duration::ZERO);
        assert!(matches!(
            empty.current_position(),
            Err(TrackerError::LocationUnavailable { .. })
        ));
    }

    #[test]
    fn watch_delivers_fixes_in_order() {
        let fixes = vec![
            GeoPoint::new(1.0, 1.0),
            GeoPoint::new(2.0, 2.0),
            GeoPoint::new(3.0, 3.0),
        ];
        let mut source = ReplayLocationSource::new(fixes.clone(), Duration::ZERO);
        let (tx, rx) = mpsc::channel();

        let id = source.watch_position(&WatchOptions::default(), tx).unwrap();
        assert_eq!(source.active_watches(), 1);

        let received: Vec<GeoPoint> = rx
            .iter()
            .map(|ev| match ev {
                TrackerEvent::Fix(from, p) if from == id => p,
                other => panic!("unexpected event {:?}", other),
            })
            .collect();
        assert_eq!(received, fixes);

        source.clear_watch(id);
        assert_eq!(source.active_watches(), 0);
    }

    #[test]
    fn watch_skips_fixes_below_min_distance() {
        let fixes = vec![
            GeoPoint::new(60.0, 24.0),
            GeoPoint::new(60.0, 24.0),
            GeoPoint::new(60.001, 24.0),
        ];
        let mut source = ReplayLocationSource::new(fixes, Duration::ZERO);
        let (tx, rx) = mpsc::channel();
        source.watch_position(&WatchOptions::default(), tx).unwrap();
        assert_eq!(rx.iter().count(), 2);
    }

    #[test]
    fn distance_filter_measures_from_last_kept_fix() {
        // Three 0.6 m steps: the second is dropped, the third is 1.2 m from the first
        let step = (0.6 / geo_math::EARTH_RADIUS_M).to_degrees();
        let fixes: Vec<GeoPoint> = (0..3)
            .map(|i| GeoPoint::new(0.0, step * i as f64))
            .collect();
        assert_eq!(distance_filtered(&fixes, 1.0), vec![fixes[0], fixes[2]]);
        assert_eq!(distance_filtered(&fixes, 0.0), fixes);
        assert!(distance_filtered(&[], 1.0).is_empty());
    }

    #[test]
    fn each_watch_tags_its_own_fixes() {
        let mut source = ReplayLocationSource::new(vec![GeoPoint::new(1.0, 1.0)], Duration::ZERO);
        let (tx, rx) = mpsc::channel();
        let first = source.watch_position(&WatchOptions::default(), tx.clone()).unwrap();
        let second = source.watch_position(&WatchOptions::default(), tx).unwrap();
        assert_ne!(first, second);

        let mut ids: Vec<WatchId> = rx
            .iter()
            .filter_map(|ev| match ev {
                TrackerEvent::Fix(id, _) => Some(id),
                _ => None,
            })
            .collect();
        ids.sort_by_key(|id| id.0);
        assert_eq!(ids, vec![first, second]);
    }

    #[test]
    fn cleared_watch_stops_delivery() {
        let fixes: Vec<GeoPoint> = (0..1000)
            .map(|i| GeoPoint::new(0.0, i as f64 * 0.001))
            .collect();
        let mut source = ReplayLocationSource::new(fixes, Duration::from_millis(5));
        let (tx, rx) = mpsc::channel();

        let id = source.watch_position(&WatchOptions::default(), tx).unwrap();
        rx.recv_timeout(Duration::from_secs(1)).unwrap();
        source.clear_watch(id);

        // The sender thread notices the flag within one interval and drops the sink
        let remaining = rx.iter().count();
        assert!(remaining < 1000);
    }
}
