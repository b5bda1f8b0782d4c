//! Throttling for live rate/voice changes.
//!
//! Restarting synthesis is audible, so changes made while speaking are
//! coalesced: within one window every change merges into a single pending
//! request that is applied once, at the window boundary.

use std::time::Duration;

use tokio::time::Instant;

/// What a pending reconfiguration has to touch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconfigureRequest {
    /// Rate or pitch changed; same engine, new prosody.
    pub rate_changed: bool,
    /// Voice changed; may require switching engines.
    pub voice_changed: bool,
}

impl ReconfigureRequest {
    pub const RATE: Self = Self {
        rate_changed: true,
        voice_changed: false,
    };

    pub const VOICE: Self = Self {
        rate_changed: false,
        voice_changed: true,
    };

    #[must_use]
    pub const fn merge(self, other: Self) -> Self {
        Self {
            rate_changed: self.rate_changed || other.rate_changed,
            voice_changed: self.voice_changed || other.voice_changed,
        }
    }
}

/// Outcome of submitting a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrottleDecision {
    /// Apply right away.
    ApplyNow(ReconfigureRequest),
    /// Merged into the pending request, applied at `due`.
    Deferred { due: Instant },
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    request: ReconfigureRequest,
    due: Instant,
}

/// Coalescing throttle for live reconfiguration.
///
/// A change is applied immediately only when a previous change was applied
/// at least one window ago and nothing is pending. Otherwise it waits for
/// the window boundary: one window after the last applied change, or one
/// window after the first change if none was applied yet this session.
#[derive(Debug)]
pub struct ReconfigureThrottle {
    window: Duration,
    last_applied: Option<Instant>,
    pending: Option<Pending>,
}

impl ReconfigureThrottle {
    pub const fn new(window: Duration) -> Self {
        Self {
            window,
            last_applied: None,
            pending: None,
        }
    }

    pub fn submit(&mut self, request: ReconfigureRequest, now: Instant) -> ThrottleDecision {
        if let Some(pending) = self.pending.as_mut() {
            pending.request = pending.request.merge(request);
            return ThrottleDecision::Deferred { due: pending.due };
        }

        let due = match self.last_applied {
            Some(at) if now.saturating_duration_since(at) >= self.window => {
                self.last_applied = Some(now);
                return ThrottleDecision::ApplyNow(request);
            }
            Some(at) => at + self.window,
            None => now + self.window,
        };
        self.pending = Some(Pending { request, due });
        ThrottleDecision::Deferred { due }
    }

    /// Take the pending request if its deadline has passed.
    pub fn take_due(&mut self, now: Instant) -> Option<ReconfigureRequest> {
        let pending = self.pending.filter(|p| p.due <= now)?;
        self.pending = None;
        self.last_applied = Some(now);
        Some(pending.request)
    }

    /// Take the pending request regardless of its deadline, without
    /// counting it as a live apply.
    pub fn take_pending(&mut self) -> Option<ReconfigureRequest> {
        self.pending.take().map(|p| p.request)
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.map(|p| p.due)
    }

    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }
}
