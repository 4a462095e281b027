use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use crate::geo_math::GeoPoint;
use crate::location::WatchId;

/// Unified event type consumed by the tracking loop.
///
/// Location events carry the id of the watch that produced them, so events still
/// queued from a cleared watch can be told apart from the current one.
#[derive(Clone, Debug, PartialEq)]
pub enum TrackerEvent {
    Fix(WatchId, GeoPoint),
    LocationError(WatchId, String),
    Tick,
}

/// Source of fix/location events
pub trait TrackerEventSource: Send + 'static {
    /// Block for up to `timeout` waiting for an event.
    /// Returns Ok(event) if an event arrives before the timeout, or Err(Timeout) if it expires.
    fn recv_timeout(&self, timeout: Duration) -> Result<TrackerEvent, RecvTimeoutError>;
}

/// Event source fed through an mpsc channel, typically by a location watch
pub struct ChannelEventSource {
    rx: Receiver<TrackerEvent>,
}

impl ChannelEventSource {
    pub fn new(rx: Receiver<TrackerEvent>) -> Self {
        Self { rx }
    }
}

impl TrackerEventSource for ChannelEventSource {
    fn recv_timeout(&self, timeout: Duration) -> Result<TrackerEvent, RecvTimeoutError> {
        self.rx.recv_timeout(timeout)
    }
}

/// Configurable ticker interface
pub trait Ticker: Send + Sync + 'static {
    fn interval(&self) -> Duration;
}

/// Fixed interval ticker
#[derive(Clone, Copy, Debug)]
pub struct FixedTicker {
    interval: Duration,
}

impl FixedTicker {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Ticker for FixedTicker {
    fn interval(&self) -> Duration {
        self.interval
    }
}

/// Runner that interleaves incoming events with ticks on a fixed schedule.
///
/// Ticks are due every `interval` from the previous deadline, so a steady stream of
/// fixes cannot starve the clock.
pub struct Runner<E: TrackerEventSource, T: Ticker> {
    event_source: E,
    ticker: T,
    next_tick: Instant,
}

impl<E: TrackerEventSource, T: Ticker> Runner<E, T> {
    pub fn new(event_source: E, ticker: T) -> Self {
        let next_tick = Instant::now() + ticker.interval();
        Self {
            event_source,
            ticker,
            next_tick,
        }
    }

    /// Blocks until the next event or the next tick deadline, whichever comes first
    pub fn step(&mut self) -> TrackerEvent {
        let now = Instant::now();
        if now >= self.next_tick {
            return self.fire_tick(now);
        }

        match self.event_source.recv_timeout(self.next_tick - now) {
            Ok(ev) => ev,
            Err(RecvTimeoutError::Timeout) => self.fire_tick(Instant::now()),
            Err(RecvTimeoutError::Disconnected) => {
                let now = Instant::now();
                if self.next_tick > now {
                    std::thread::sleep(self.next_tick - now);
                }
                self.fire_tick(Instant::now())
            }
        }
    }

    fn fire_tick(&mut self, now: Instant) -> TrackerEvent {
        self.next_tick += self.ticker.interval();
        // After a long stall, don't burst out the missed ticks
        if self.next_tick < now {
            self.next_tick = now + self.ticker.interval();
        }
        TrackerEvent::Tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn step_returns_tick_on_timeout() {
        let (_tx, rx) = mpsc::channel();
        let es = ChannelEventSource::new(rx);
        let ticker = FixedTicker::new(Duration::from_millis(1));
        let mut runner = Runner::new(es, ticker);

        assert_eq!(runner.step(), TrackerEvent::Tick);
    }

    #[test]
    fn step_passes_through_events() {
        let (tx, rx) = mpsc::channel();
        tx.send(TrackerEvent::Fix(WatchId(1), GeoPoint::new(1.0, 2.0)))
            .unwrap();
        let es = ChannelEventSource::new(rx);
        let ticker = FixedTicker::new(Duration::from_millis(200));
        let mut runner = Runner::new(es, ticker);

        assert_eq!(
            runner.step(),
            TrackerEvent::Fix(WatchId(1), GeoPoint::new(1.0, 2.0))
        );
    }

    #[test]
    fn busy_source_still_ticks() {
        let (tx, rx) = mpsc::channel();
        for _ in 0..10_000 {
            tx.send(TrackerEvent::LocationError(WatchId(1), "noise".into())).unwrap();
        }
        let es = ChannelEventSource::new(rx);
        let ticker = FixedTicker::new(Duration::from_millis(1));
        let mut runner = Runner::new(es, ticker);

        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(runner.step(), TrackerEvent::Tick);
    }

    #[test]
    fn disconnected_source_keeps_ticking() {
        let (tx, rx) = mpsc::channel::<TrackerEvent>();
        drop(tx);
        let es = ChannelEventSource::new(rx);
        let ticker = FixedTicker::new(Duration::from_millis(1));
        let mut runner = Runner::new(es, ticker);

        for _ in 0..3 {
            assert_eq!(runner.step(), TrackerEvent::Tick);
        }
    }
}
