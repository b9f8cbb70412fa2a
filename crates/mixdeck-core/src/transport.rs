//! Virtual transport: a wall-clock playback cursor per job.
//!
//! Nothing is decoded here. Position is integrated from elapsed time and rate, which
//! is close enough to drive a UI playhead over the exported mix. Every operation has an
//! `_at` form taking the current instant so behaviour can be tested without sleeping.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, instrument};
use uuid::Uuid;

pub const TICK_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq)]
struct TransportState {
    is_playing: bool,
    position_seconds: f64,
    rate: f64,
    duration_seconds: f64,
    last_update: Instant,
}

impl TransportState {
    fn new(now: Instant) -> Self {
        Self {
            is_playing: false,
            position_seconds: 0.0,
            rate: 1.0,
            duration_seconds: 0.0,
            last_update: now,
        }
    }

    /// Integrates elapsed time into the position, stopping at the end.
    fn settle(&mut self, now: Instant) {
        if self.is_playing {
            let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();
            self.position_seconds += elapsed * self.rate;
            if self.position_seconds >= self.duration_seconds {
                self.position_seconds = self.duration_seconds;
                self.is_playing = false;
            }
        }
        self.last_update = now;
    }

    fn status(&self) -> TransportStatus {
        TransportStatus {
            is_playing: self.is_playing,
            position: self.position_seconds,
            duration: self.duration_seconds,
            rate: self.rate,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct TransportStatus {
    pub is_playing: bool,
    pub position: f64,
    pub duration: f64,
    pub rate: f64,
}

#[derive(Debug)]
pub struct TransportController {
    cursors: Mutex<HashMap<Uuid, TransportState>>,
    idle_timeout: Duration,
}

impl Default for TransportController {
    fn default() -> Self {
        Self::new(Duration::from_secs(3_600))
    }
}

impl TransportController {
    #[must_use]
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            cursors: Mutex::new(HashMap::new()),
            idle_timeout,
        }
    }

    fn with_cursor<T>(
        &self,
        job_id: Uuid,
        now: Instant,
        update: impl FnOnce(&mut TransportState) -> T,
    ) -> T {
        let mut cursors = self.cursors.lock();
        let cursor = cursors
            .entry(job_id)
            .or_insert_with(|| TransportState::new(now));
        update(cursor)
    }

    pub fn status(&self, job_id: Uuid) -> TransportStatus {
        self.status_at(job_id, Instant::now())
    }

    pub fn status_at(&self, job_id: Uuid, now: Instant) -> TransportStatus {
        self.with_cursor(job_id, now, |cursor| {
            cursor.settle(now);
            cursor.status()
        })
    }

    pub fn play(&self, job_id: Uuid) -> TransportStatus {
        self.play_at(job_id, Instant::now())
    }

    /// Starts playback. A cursor parked at the end of a known mix rewinds first.
    #[instrument(skip(self, now))]
    pub fn play_at(&self, job_id: Uuid, now: Instant) -> TransportStatus {
        self.with_cursor(job_id, now, |cursor| {
            cursor.settle(now);
            if cursor.duration_seconds > 0.0 && cursor.position_seconds >= cursor.duration_seconds
            {
                cursor.position_seconds = 0.0;
            }
            cursor.is_playing = true;
            cursor.status()
        })
    }

    pub fn pause(&self, job_id: Uuid) -> TransportStatus {
        self.pause_at(job_id, Instant::now())
    }

    #[instrument(skip(self, now))]
    pub fn pause_at(&self, job_id: Uuid, now: Instant) -> TransportStatus {
        self.with_cursor(job_id, now, |cursor| {
            cursor.settle(now);
            cursor.is_playing = false;
            cursor.status()
        })
    }

    pub fn stop(&self, job_id: Uuid) -> TransportStatus {
        self.stop_at(job_id, Instant::now())
    }

    #[instrument(skip(self, now))]
    pub fn stop_at(&self, job_id: Uuid, now: Instant) -> TransportStatus {
        self.with_cursor(job_id, now, |cursor| {
            cursor.is_playing = false;
            cursor.position_seconds = 0.0;
            cursor.last_update = now;
            cursor.status()
        })
    }

    pub fn seek(&self, job_id: Uuid, position: f64) -> TransportStatus {
        self.seek_at(job_id, position, Instant::now())
    }

    /// Clamped to `[0, duration]`; non-finite positions go to 0.
    #[instrument(skip(self, now))]
    pub fn seek_at(&self, job_id: Uuid, position: f64, now: Instant) -> TransportStatus {
        self.with_cursor(job_id, now, |cursor| {
            let position = if position.is_finite() { position } else { 0.0 };
            cursor.position_seconds = position.clamp(0.0, cursor.duration_seconds);
            cursor.last_update = now;
            cursor.status()
        })
    }

    pub fn set_rate(&self, job_id: Uuid, rate: f64) -> TransportStatus {
        self.set_rate_at(job_id, rate, Instant::now())
    }

    /// Negative or non-finite rates are ignored.
    #[instrument(skip(self, now))]
    pub fn set_rate_at(&self, job_id: Uuid, rate: f64, now: Instant) -> TransportStatus {
        self.with_cursor(job_id, now, |cursor| {
            cursor.settle(now);
            if rate.is_finite() && rate >= 0.0 {
                cursor.rate = rate;
            } else {
                debug!(rate, "ignoring invalid transport rate");
            }
            cursor.status()
        })
    }

    /// Called once the final mix length is known.
    pub fn set_duration(&self, job_id: Uuid, duration_seconds: f64) -> TransportStatus {
        let now = Instant::now();
        self.with_cursor(job_id, now, |cursor| {
            cursor.settle(now);
            cursor.duration_seconds = duration_seconds.max(0.0);
            cursor.position_seconds = cursor.position_seconds.min(cursor.duration_seconds);
            cursor.status()
        })
    }

    /// Recreates a pruned cursor with its known duration. Live cursors are left alone.
    pub fn restore(&self, job_id: Uuid, duration_seconds: f64) {
        let now = Instant::now();
        self.cursors
            .lock()
            .entry(job_id)
            .or_insert_with(|| TransportState {
                duration_seconds: duration_seconds.max(0.0),
                ..TransportState::new(now)
            });
    }

    pub fn tick_at(&self, job_id: Uuid, now: Instant) -> Option<TransportStatus> {
        let mut cursors = self.cursors.lock();
        cursors.get_mut(&job_id).map(|cursor| {
            cursor.settle(now);
            cursor.status()
        })
    }

    pub fn tick_all_at(&self, now: Instant) {
        let mut cursors = self.cursors.lock();
        for cursor in cursors.values_mut().filter(|cursor| cursor.is_playing) {
            cursor.settle(now);
        }
    }

    /// Drops stopped cursors untouched for longer than the idle timeout.
    pub fn prune_idle_at(&self, now: Instant) -> usize {
        let mut cursors = self.cursors.lock();
        let before = cursors.len();
        cursors.retain(|_, cursor| {
            cursor.is_playing
                || now.saturating_duration_since(cursor.last_update) < self.idle_timeout
        });
        before - cursors.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cursors.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cursors.lock().is_empty()
    }

    /// Settles playing cursors and prunes idle ones on a tokio interval. Must be called inside a runtime.
    pub fn spawn_ticker(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let now = Instant::now();
                controller.tick_all_at(now);
                let pruned = controller.prune_idle_at(now);
                if pruned > 0 {
                    debug!(pruned, "pruned idle transport cursors");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn play_pause_integrates_elapsed_time_times_rate() {
        let transport = TransportController::default();
        let job_id = Uuid::new_v4();
        let start = Instant::now();
        transport.set_duration(job_id, 10.0);
        transport.set_rate_at(job_id, 2.0, start);
        transport.play_at(job_id, start);
        let status = transport.pause_at(job_id, start + Duration::from_secs(2));
        assert!(!status.is_playing);
        assert!((status.position - 4.0).abs() < 1e-9);
    }

    #[test]
    fn tick_clamps_at_duration_and_stops() {
        let transport = TransportController::default();
        let job_id = Uuid::new_v4();
        let start = Instant::now();
        transport.set_duration(job_id, 3.0);
        transport.play_at(job_id, start);
        let status = transport
            .tick_at(job_id, start + Duration::from_secs(5))
            .expect("cursor should exist");
        assert!(!status.is_playing);
        assert!((status.position - 3.0).abs() < 1e-9);
    }

    #[test]
    fn seek_clamps_and_stop_rewinds() {
        let transport = TransportController::default();
        let job_id = Uuid::new_v4();
        let now = Instant::now();
        assert!(transport.seek_at(job_id, 5.0, now).position.abs() < f64::EPSILON);
        transport.set_duration(job_id, 8.0);
        assert!((transport.seek_at(job_id, 12.0, now).position - 8.0).abs() < 1e-9);
        assert!(transport.seek_at(job_id, -1.0, now).position.abs() < f64::EPSILON);
        transport.seek_at(job_id, 4.0, now);
        assert!(transport.stop_at(job_id, now).position.abs() < f64::EPSILON);
    }

    #[test]
    fn idle_cursors_are_pruned() {
        let transport = TransportController::new(Duration::from_secs(1));
        let now = Instant::now();
        transport.stop_at(Uuid::new_v4(), now);
        assert_eq!(transport.prune_idle_at(now), 0);
        assert_eq!(transport.prune_idle_at(now + Duration::from_secs(2)), 1);
        assert!(transport.is_empty());
    }

    #[test]
    fn restore_only_seeds_missing_cursors() {
        let transport = TransportController::default();
        let job_id = Uuid::new_v4();
        transport.restore(job_id, 4.0);
        assert!((transport.seek(job_id, 3.0).position - 3.0).abs() < 1e-9);

        transport.restore(job_id, 9.0);
        let status = transport.status(job_id);
        assert!((status.duration - 4.0).abs() < 1e-9);
        assert!((status.position - 3.0).abs() < 1e-9);
    }
}
