//! Engine signal handling: boundaries, ends, errors and section handoff.

use readaloud_core::{
    BoundaryKind, EngineEvent, EngineSignal, FallbackInfo, NarrationError, NarrationEvent,
    PlaybackStatus, SynthesisFailure, WordSpan, codes,
};
use tracing::{debug, info, trace, warn};

use super::NarrationSession;
use crate::registry::REASON_RUNTIME_FALLBACK;

impl NarrationSession {
    /// Take the engine signal receiver, for callers that multiplex it with
    /// other sources. Hand it back with
    /// [`restore_signals`](Self::restore_signals).
    pub fn take_signals(
        &mut self,
    ) -> Option<tokio::sync::mpsc::UnboundedReceiver<EngineEvent>> {
        self.signals.take()
    }

    pub fn restore_signals(&mut self, signals: tokio::sync::mpsc::UnboundedReceiver<EngineEvent>) {
        self.signals = Some(signals);
    }

    /// Handle every engine signal queued so far, including signals queued
    /// while handling. Returns how many were handled.
    pub async fn pump(&mut self) -> usize {
        let Some(mut signals) = self.signals.take() else {
            return 0;
        };
        let mut handled = 0;
        while let Ok(event) = signals.try_recv() {
            self.handle_event(event).await;
            handled += 1;
        }
        self.signals = Some(signals);
        handled
    }

    /// Route one engine signal.
    ///
    /// Utterance signals are dropped unless they come from the active
    /// engine and carry the live utterance id; anything spoken before the
    /// last cancel fails that check.
    pub async fn handle_event(&mut self, event: EngineEvent) {
        if let EngineSignal::Diag(diag) = event.signal {
            debug!(engine = %event.engine, code = %diag.code, "Engine diagnostic");
            self.last_diag = Some(diag);
            return;
        }

        let live = event.utterance.is_some_and(|id| self.state.clock.is_live(id));
        if !live || !self.registry.is_active(&event.engine) {
            trace!(
                engine = %event.engine,
                utterance = ?event.utterance,
                "Discarding signal for cancelled utterance"
            );
            return;
        }

        match event.signal {
            EngineSignal::Boundary {
                char_index,
                char_length,
                kind,
            } => self.handle_boundary(char_index, char_length, kind),
            EngineSignal::End => self.handle_end().await,
            EngineSignal::Error(failure) => self.handle_error(failure).await,
            EngineSignal::Diag(_) => {}
        }
    }

    fn handle_boundary(&mut self, char_index: usize, char_length: usize, kind: BoundaryKind) {
        if kind != BoundaryKind::Word || self.state.status != PlaybackStatus::Playing {
            return;
        }
        let Some(item) = self.state.position().and_then(|i| self.queue.get(i)) else {
            return;
        };

        self.state.word = WordSpan::from_boundary(&item.text, char_index, char_length);
        if let Some(anchor) = item.anchor_at(char_index) {
            self.highlights.schedule(anchor);
        }
        self.emit_progress();
    }

    async fn handle_end(&mut self) {
        if self.state.status != PlaybackStatus::Playing {
            return;
        }
        self.state.consecutive_errors = 0;
        self.advance(true).await;
    }

    async fn handle_error(&mut self, failure: SynthesisFailure) {
        if self.state.status != PlaybackStatus::Playing {
            return;
        }

        if failure.is_transient(&self.config.transient_error_codes) {
            debug!(code = %failure.code, "Transient synthesis error, skipping item");
            self.last_error = Some(NarrationError::TransientSynthesis(failure).to_info());
            self.advance(false).await;
            return;
        }

        self.state.consecutive_errors += 1;
        let count = self.state.consecutive_errors;
        let code = failure.code.clone();
        self.record_error(&NarrationError::Synthesis(failure));

        if count >= self.config.max_consecutive_errors {
            warn!(count, "Too many consecutive synthesis errors, stopping");
            self.stop();
            let err = NarrationError::MaxErrorsReached { count };
            self.last_error = Some(err.to_info());
            self.record_diag(codes::MAX_ERRORS_REACHED, err.to_string());
            return;
        }

        if self.try_runtime_fallback(&code) {
            return;
        }
        self.advance(false).await;
    }

    /// Switch to the next usable lower-priority engine, once per session,
    /// and re-speak the current item on it.
    fn try_runtime_fallback(&mut self, reason: &str) -> bool {
        let Some(to) = self.registry.fallback_candidate() else {
            return false;
        };
        let Some(from) = self.registry.active_id() else {
            return false;
        };
        let Some(index) = self.state.position() else {
            return false;
        };

        self.state.clock.cancel();
        let settings = self.voice_settings();
        if !self.registry.switch_engine(&to, &settings) {
            return false;
        }
        self.registry.mark_fallback_used();
        info!(%from, %to, reason, "Falling back to next engine");

        self.selection_reason = Some(REASON_RUNTIME_FALLBACK.to_string());
        self.record_diag(codes::ENGINE_FALLBACK, format!("{from} -> {to}: {reason}"));
        self.fallback_info = Some(FallbackInfo::new(from, to, reason));
        self.start_item(index);
        true
    }

    /// Speak the next item, or hand over to the next section when the
    /// queue is exhausted.
    async fn advance(&mut self, gapless: bool) {
        let next = self.state.position().map_or(0, |i| i + 1);
        if next < self.queue.len() {
            self.speak_item(next, 0, gapless);
            return;
        }
        self.finish_section().await;
    }

    async fn finish_section(&mut self) {
        self.state.clock.cancel();
        self.set_status(PlaybackStatus::SectionTransition);
        self.highlights.forget_section();

        if self.enter_next_section().await {
            if self.state.status == PlaybackStatus::SectionTransition {
                self.start_item(0);
            }
            return;
        }
        if self.is_destroyed() {
            return;
        }

        info!("Reached end of document");
        let exhausted = NarrationError::NavigationExhausted;
        self.record_diag(codes::NAVIGATION_EXHAUSTED, exhausted.to_string());
        let locator = self.document.locator().await;
        self.observers.notify(&NarrationEvent::DocumentEnd {
            snapshot: self.snapshot(),
            locator,
        });
        self.stop();
    }
}
