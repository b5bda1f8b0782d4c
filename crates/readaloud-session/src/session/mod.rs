//! The narration session: one reading session's playback state machine.
//!
//! A [`NarrationSession`] owns everything mutable about narration (queue,
//! position, engines, highlight layers, observers) and is driven by method
//! calls plus the engine signals it drains from its channel. Nothing is
//! shared between sessions.
//!
//! Public operations never return errors. Failures are recorded in the
//! snapshot (`lastError` / `lastDiag`), logged, and turned into a no-op or a
//! stop.

mod callbacks;
mod reconfigure;
mod timers;
mod transport;

use std::sync::Arc;

use readaloud_core::{
    Diagnostic, DocumentIntegration, EngineDescriptor, EngineEvent, EngineFactory, EngineId,
    ErrorInfo, FallbackInfo, HighlightSurface, Locator, NarrationConfig, NarrationError,
    NarrationEvent, NarrationObserver, NarrationSnapshot, PlaybackQueue, PlaybackStatus,
    ProbeRequest, SegmentPreview, SegmentWindow, VoiceInfo, WORDS_PER_MINUTE, build_queue,
};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::highlight::HighlightCoordinator;
use crate::observers::{ObserverSet, SubscriptionId};
use crate::registry::{EngineRegistry, VoiceSettings};
use crate::state::PlaybackState;
use crate::throttle::ReconfigureThrottle;

/// Sections skipped in a row because they produced no speakable blocks.
const MAX_EMPTY_SECTIONS: usize = 16;

pub struct NarrationSession {
    config: NarrationConfig,
    document: Box<dyn DocumentIntegration>,
    registry: EngineRegistry,
    highlights: HighlightCoordinator,
    observers: ObserverSet,
    state: PlaybackState,
    queue: PlaybackQueue,
    throttle: ReconfigureThrottle,
    signals: Option<mpsc::UnboundedReceiver<EngineEvent>>,
    probe: ProbeRequest,
    sleep_deadline: Option<Instant>,
    selection_reason: Option<String>,
    last_error: Option<ErrorInfo>,
    last_diag: Option<Diagnostic>,
    fallback_info: Option<FallbackInfo>,
    shutdown: CancellationToken,
}

impl NarrationSession {
    /// Create a session. `factories` are in priority order, highest first.
    ///
    /// Engines are not created until [`init`](Self::init).
    pub fn new(
        config: NarrationConfig,
        factories: Vec<Arc<dyn EngineFactory>>,
        document: Box<dyn DocumentIntegration>,
        surface: Box<dyn HighlightSurface>,
    ) -> Self {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let highlights = HighlightCoordinator::new(
            surface,
            config.highlight_style,
            config.highlight_color,
            config.highlight_granularity,
        );
        let probe = ProbeRequest {
            voice: config.voice.clone(),
            ..ProbeRequest::default()
        };
        Self {
            throttle: ReconfigureThrottle::new(config.reconfigure_throttle),
            registry: EngineRegistry::new(factories, signal_tx),
            highlights,
            document,
            observers: ObserverSet::default(),
            state: PlaybackState::default(),
            queue: PlaybackQueue::default(),
            signals: Some(signal_rx),
            probe,
            sleep_deadline: None,
            selection_reason: None,
            last_error: None,
            last_diag: None,
            fallback_info: None,
            shutdown: CancellationToken::new(),
            config,
        }
    }

    /// Probe engines and select the active one. Returns whether an engine
    /// is active.
    ///
    /// Repeat calls return the existing selection. If the session's
    /// shutdown token is cancelled while a probe is in flight, init stops
    /// after that probe and returns `false`.
    pub async fn init(&mut self) -> bool {
        if self.registry.is_initialized() {
            return self.registry.active_id().is_some();
        }

        let prefer = self.config.prefer_engine.as_deref().map(EngineId::from);
        let report = match self
            .registry
            .init(&self.probe, prefer.as_ref(), &self.shutdown)
            .await
        {
            Ok(report) => report,
            Err(err) => {
                debug!(error = %err, "Init aborted");
                return false;
            }
        };

        if let Some(diag) = report.diagnostics.into_iter().last() {
            self.last_diag = Some(diag);
        }
        self.selection_reason = report.selection_reason;

        if let Some(active) = report.active {
            info!(engine = %active, reason = ?self.selection_reason, "Narration engine selected");
            self.registry.apply_settings(&self.voice_settings());
            true
        } else {
            self.record_error(&NarrationError::NoUsableEngine);
            false
        }
    }

    /// Stop playback, drop all engines and observers. The session is inert
    /// afterwards.
    pub fn destroy(&mut self) {
        self.shutdown.cancel();
        self.stop();
        self.registry.destroy();
        self.observers.clear();
        info!("Narration session destroyed");
    }

    /// Token cancelled by [`destroy`](Self::destroy); cancel it from
    /// elsewhere to abort an in-flight init.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    // ── Observers ──────────────────────────────────────────────────

    pub fn subscribe(&mut self, observer: Arc<dyn NarrationObserver>) -> SubscriptionId {
        self.observers.subscribe(observer)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    // ── Queries ────────────────────────────────────────────────────

    #[must_use]
    pub const fn status(&self) -> PlaybackStatus {
        self.state.status
    }

    #[must_use]
    pub const fn queue_index(&self) -> i64 {
        self.state.queue_index
    }

    #[must_use]
    pub const fn queue(&self) -> &PlaybackQueue {
        &self.queue
    }

    #[must_use]
    pub const fn config(&self) -> &NarrationConfig {
        &self.config
    }

    #[must_use]
    pub fn engines(&self) -> Vec<EngineDescriptor> {
        self.registry.descriptors()
    }

    /// Voices of every usable engine, in engine priority order.
    #[must_use]
    pub fn voices(&self) -> Vec<VoiceInfo> {
        self.registry.voices()
    }

    /// Current position descriptor from the document.
    pub async fn current_locator(&mut self) -> Option<Locator> {
        self.document.locator().await
    }

    #[must_use]
    pub fn snapshot(&self) -> NarrationSnapshot {
        NarrationSnapshot {
            status: self.state.status,
            text: self.state.current_text.clone(),
            word_start: self.state.word.start,
            word_end: self.state.word.end,
            block_idx: self.state.queue_index,
            block_count: self.queue.len(),
            rate: self.config.rate,
            pitch: self.config.pitch,
            volume: self.config.volume,
            voice: self.config.voice.clone(),
            preset: self.config.preset.clone(),
            engine_id: self.registry.active_id(),
            selection_reason: self.selection_reason.clone(),
            last_error: self.last_error.clone(),
            last_diag: self.last_diag.clone(),
            fallback_info: self.fallback_info.clone(),
            sleep_remaining_secs: self.sleep_remaining().map(|d| d.as_secs()),
            estimated_remaining_secs: self.estimated_remaining_secs(),
        }
    }

    /// Up to `radius` items before and after the current one.
    #[must_use]
    pub fn segment_window(&self, radius: usize) -> SegmentWindow {
        let center = self.state.position().unwrap_or(0);
        let first = center.saturating_sub(radius);
        let items = self
            .queue
            .items()
            .iter()
            .enumerate()
            .skip(first)
            .take(center.saturating_add(radius).saturating_add(1) - first)
            .map(|(index, item)| SegmentPreview {
                index,
                text: item.text.clone(),
            })
            .collect();
        SegmentWindow {
            current: self.state.queue_index,
            total: self.queue.len(),
            items,
        }
    }

    /// Words left after the current item at the current rate.
    fn estimated_remaining_secs(&self) -> Option<u64> {
        let index = self.state.position()?;
        let words = self.queue.words_after(index);
        let words_per_sec = WORDS_PER_MINUTE * f64::from(self.config.rate) / 60.0;
        #[allow(
            clippy::cast_precision_loss,
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss
        )]
        let secs = (words as f64 / words_per_sec).round() as u64;
        Some(secs)
    }

    // ── Internal helpers ───────────────────────────────────────────

    fn voice_settings(&self) -> VoiceSettings {
        VoiceSettings {
            rate: self.config.rate,
            pitch: self.config.pitch,
            volume: self.config.volume,
            voice: self.config.voice.clone(),
        }
    }

    fn set_status(&mut self, status: PlaybackStatus) {
        if self.state.status == status {
            return;
        }
        debug!(from = ?self.state.status, to = ?status, "Playback status changed");
        self.state.status = status;
        self.observers.notify(&NarrationEvent::StateChanged {
            status,
            snapshot: self.snapshot(),
        });
    }

    fn emit_progress(&self) {
        self.observers.notify(&NarrationEvent::Progress {
            snapshot: self.snapshot(),
        });
    }

    fn record_error(&mut self, err: &NarrationError) {
        warn!(code = %err.code(), error = %err, "Narration error");
        self.last_error = Some(err.to_info());
    }

    fn record_diag(&mut self, code: &str, detail: impl Into<String>) {
        self.last_diag = Some(Diagnostic::new(code, detail));
    }

    /// Rebuild the queue from the document's active section.
    fn rebuild_queue(&mut self) {
        self.queue = self.build_active_queue();
    }

    fn build_active_queue(&mut self) -> PlaybackQueue {
        let section = self.document.active_section();
        let build = build_queue(self.document.as_mut(), section, self.config.max_queue_items);
        if let Some(err) = build.error {
            self.record_error(&err);
        }
        build.queue
    }

    /// Advance the document to the next section with speakable content and
    /// switch to its queue, positioned before the first item. Returns
    /// `false` at the end of the document, leaving queue and position as
    /// they were.
    async fn enter_next_section(&mut self) -> bool {
        for _ in 0..MAX_EMPTY_SECTIONS {
            if !self.document.advance_section().await {
                return false;
            }
            if self.shutdown.is_cancelled() {
                return false;
            }
            let queue = self.build_active_queue();
            if !queue.is_empty() {
                info!(section = ?queue.section(), items = queue.len(), "Entered next section");
                self.queue = queue;
                self.state.clear_position();
                return true;
            }
            debug!(section = ?queue.section(), "Skipping empty section");
        }
        warn!(limit = MAX_EMPTY_SECTIONS, "Too many empty sections in a row");
        false
    }
}

impl std::fmt::Debug for NarrationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NarrationSession")
            .field("status", &self.state.status)
            .field("queue_index", &self.state.queue_index)
            .field("queue_len", &self.queue.len())
            .field("registry", &self.registry)
            .field("highlights", &self.highlights)
            .field("observers", &self.observers)
            .finish_non_exhaustive()
    }
}
