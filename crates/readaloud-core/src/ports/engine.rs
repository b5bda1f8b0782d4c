//! Speech engine port: the contract every synthesis backend implements.
//!
//! The session drives engines through [`SpeechEngine`]; engines report back
//! through the [`SignalSink`] handed to them by [`SpeechEngine::bind`].
//! Every signal for an utterance carries the [`UtteranceId`] it was spoken
//! with, so the session can discard output from cancelled utterances.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::domain::{EngineCapabilities, EngineId, VoiceInfo};
use crate::error::{Diagnostic, SynthesisFailure};

// ── Utterances ─────────────────────────────────────────────────────

/// Identifies one `speak` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UtteranceId(pub u64);

/// A request to speak one queue item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Utterance<'a> {
    pub id: UtteranceId,
    pub text: &'a str,
    /// Best-effort resume offset in chars. Engines that cannot start
    /// mid-text ignore it and speak from the beginning.
    pub start_hint: usize,
}

impl<'a> Utterance<'a> {
    #[must_use]
    pub const fn new(id: UtteranceId, text: &'a str) -> Self {
        Self {
            id,
            text,
            start_hint: 0,
        }
    }

    #[must_use]
    pub const fn with_start_hint(mut self, start_hint: usize) -> Self {
        self.start_hint = start_hint;
        self
    }
}

// ── Signals ────────────────────────────────────────────────────────

/// Granularity of a boundary callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BoundaryKind {
    Word,
    Sentence,
    Other,
}

/// A callback from an engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineSignal {
    /// A word (or sentence) started at `char_index` within the utterance text.
    Boundary {
        char_index: usize,
        char_length: usize,
        kind: BoundaryKind,
    },

    /// The utterance finished playing.
    End,

    /// The utterance failed.
    Error(SynthesisFailure),

    /// Informational diagnostic; not tied to an utterance.
    Diag(Diagnostic),
}

/// A signal tagged with its origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineEvent {
    pub engine: EngineId,
    /// `None` for diagnostics.
    pub utterance: Option<UtteranceId>,
    pub signal: EngineSignal,
}

/// Callback channel handed to an engine when it is bound.
///
/// Cloneable and cheap; engines typically keep one copy and move clones into
/// their synthesis tasks. Sending never blocks; if the session is gone the
/// signal is dropped.
#[derive(Debug, Clone)]
pub struct SignalSink {
    engine: EngineId,
    tx: mpsc::UnboundedSender<EngineEvent>,
}

impl SignalSink {
    pub const fn new(engine: EngineId, tx: mpsc::UnboundedSender<EngineEvent>) -> Self {
        Self { engine, tx }
    }

    #[must_use]
    pub const fn engine(&self) -> &EngineId {
        &self.engine
    }

    pub fn boundary(
        &self,
        utterance: UtteranceId,
        char_index: usize,
        char_length: usize,
        kind: BoundaryKind,
    ) {
        self.send(
            Some(utterance),
            EngineSignal::Boundary {
                char_index,
                char_length,
                kind,
            },
        );
    }

    pub fn end(&self, utterance: UtteranceId) {
        self.send(Some(utterance), EngineSignal::End);
    }

    pub fn error(&self, utterance: UtteranceId, failure: SynthesisFailure) {
        self.send(Some(utterance), EngineSignal::Error(failure));
    }

    pub fn diag(&self, code: impl Into<String>, detail: impl Into<String>) {
        self.send(None, EngineSignal::Diag(Diagnostic::new(code, detail)));
    }

    fn send(&self, utterance: Option<UtteranceId>, signal: EngineSignal) {
        let event = EngineEvent {
            engine: self.engine.clone(),
            utterance,
            signal,
        };
        if self.tx.send(event).is_err() {
            tracing::debug!(engine = %self.engine, "Signal receiver dropped");
        }
    }
}

// ── Probe ──────────────────────────────────────────────────────────

/// Sample synthesis request used to health-check an engine at init.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeRequest {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    /// Require real synthesis rather than a reachability check.
    pub require_synthesis: bool,
}

impl Default for ProbeRequest {
    fn default() -> Self {
        Self {
            text: "Narration probe".to_string(),
            voice: None,
            require_synthesis: true,
        }
    }
}

// ── Engine trait ───────────────────────────────────────────────────

/// Backend-agnostic speech engine.
///
/// Only `speak`, `cancel`, the setters, `voices` and `probe` are required.
/// The optional methods default to no-ops and are only called when the
/// matching [`EngineCapabilities`] flag is set.
#[async_trait]
pub trait SpeechEngine: Send {
    /// Stable engine identifier.
    fn id(&self) -> EngineId;

    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities::default()
    }

    /// Install the callback channel. Called again whenever the engine
    /// becomes the active engine.
    fn bind(&mut self, sink: SignalSink);

    /// Start speaking, replacing anything in flight.
    fn speak(&mut self, utterance: Utterance<'_>);

    /// Speak chained onto the previous utterance without a gap.
    fn speak_gapless(&mut self, utterance: Utterance<'_>) {
        self.speak(utterance);
    }

    /// Stop speaking. Late signals for cancelled utterances are tolerated.
    fn cancel(&mut self);

    /// Suspend audio (only with `true_pause`).
    fn pause(&mut self) {}

    /// Continue suspended audio (only with `true_pause`).
    fn resume(&mut self) {}

    /// Best-effort background synthesis of upcoming text.
    fn preload(&mut self, _text: &str) {}

    /// Hint that `text` is the next utterance.
    fn prepare_next(&mut self, _text: &str) {}

    /// Drop anything cached by `preload`.
    fn clear_preload_cache(&mut self) {}

    fn set_rate(&mut self, rate: f32);

    fn set_pitch(&mut self, _pitch: f32) {}

    fn set_volume(&mut self, _volume: f32) {}

    fn set_voice(&mut self, voice_id: &str);

    fn voices(&self) -> Vec<VoiceInfo>;

    /// Health check; `true` when the engine can synthesize.
    async fn probe(&mut self, request: &ProbeRequest) -> bool;
}

/// Creates an engine instance for a session.
pub trait EngineFactory: Send + Sync {
    fn id(&self) -> EngineId;

    fn create(&self) -> Result<Box<dyn SpeechEngine>, SynthesisFailure>;
}
