//! Time-driven work: frame flushes, deferred reconfiguration and the sleep
//! timer.
//!
//! The session never sleeps on its own; whoever drives it asks for the next
//! deadline and calls back when it passes.

use std::time::Duration;

use readaloud_core::PlaybackStatus;
use tokio::time::Instant;
use tracing::info;

use super::NarrationSession;

impl NarrationSession {
    /// Paint highlight work coalesced since the last frame.
    pub fn on_frame(&mut self) -> bool {
        self.highlights.flush_frame()
    }

    /// Earliest pending deadline, if any.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.throttle.deadline(), self.sleep_deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Run everything whose deadline is at or before `now`.
    pub fn fire_due_timers(&mut self, now: Instant) {
        if let Some(request) = self.throttle.take_due(now) {
            self.apply_live(request);
        }

        if self.sleep_deadline.is_some_and(|deadline| deadline <= now) {
            self.sleep_deadline = None;
            if self.state.status == PlaybackStatus::Playing {
                info!("Sleep timer elapsed, pausing");
                self.pause();
            }
        }
    }

    /// Pause playback once `after` has elapsed; `None` clears the timer.
    pub fn set_sleep_timer(&mut self, after: Option<Duration>) {
        self.sleep_deadline = after.map(|d| Instant::now() + d);
    }

    pub fn clear_sleep_timer(&mut self) {
        self.sleep_deadline = None;
    }

    #[must_use]
    pub fn sleep_remaining(&self) -> Option<Duration> {
        self.sleep_deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}
