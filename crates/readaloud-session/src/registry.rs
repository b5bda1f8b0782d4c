//! Engine registry and selector.
//!
//! Owns one instance of every registered engine, probes them in priority
//! order at init and keeps exactly one active. Only the active engine is
//! bound to the session's signal channel; switching cancels the previous
//! engine before anything is sent to the next one.

use std::sync::Arc;

use readaloud_core::{
    Diagnostic, EngineCapabilities, EngineDescriptor, EngineEvent, EngineFactory, EngineId,
    NarrationError, ProbeRequest, SignalSink, SpeechEngine, VoiceInfo, codes,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Selection reason recorded when the preferred engine was unusable.
pub const REASON_INIT_FALLBACK: &str = "init_fallback";
/// Selection reason recorded after an error-driven engine switch.
pub const REASON_RUNTIME_FALLBACK: &str = "runtime_fallback";
/// Selection reason recorded for an explicit switch or voice selection.
pub const REASON_USER_SWITCH: &str = "user_switch";

/// Settings reapplied to an engine whenever it becomes active.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceSettings {
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
    pub voice: Option<String>,
}

/// Result of [`EngineRegistry::init`].
#[derive(Debug, Default)]
pub struct InitReport {
    pub active: Option<EngineId>,
    pub selection_reason: Option<String>,
    /// One entry per engine that failed to construct or probe.
    pub diagnostics: Vec<Diagnostic>,
}

struct EngineSlot {
    descriptor: EngineDescriptor,
    engine: Box<dyn SpeechEngine>,
}

/// Registered engines in priority order.
pub struct EngineRegistry {
    factories: Vec<Arc<dyn EngineFactory>>,
    slots: Vec<EngineSlot>,
    active: Option<usize>,
    signal_tx: mpsc::UnboundedSender<EngineEvent>,
    initialized: bool,
    fallback_used: bool,
}

impl EngineRegistry {
    /// `factories` are in priority order, highest first.
    pub fn new(
        factories: Vec<Arc<dyn EngineFactory>>,
        signal_tx: mpsc::UnboundedSender<EngineEvent>,
    ) -> Self {
        Self {
            factories,
            slots: Vec::new(),
            active: None,
            signal_tx,
            initialized: false,
            fallback_used: false,
        }
    }

    /// Instantiate and probe every engine, then select one.
    ///
    /// Probes run one at a time in priority order. `shutdown` is checked
    /// after every probe; once cancelled, init stops and returns
    /// [`NarrationError::Destroyed`]. Calling init again after it completed
    /// returns the existing selection.
    pub async fn init(
        &mut self,
        probe: &ProbeRequest,
        prefer: Option<&EngineId>,
        shutdown: &CancellationToken,
    ) -> Result<InitReport, NarrationError> {
        if self.initialized {
            return Ok(InitReport {
                active: self.active_id(),
                ..InitReport::default()
            });
        }

        let mut diagnostics = Vec::new();
        for factory in self.factories.clone() {
            if shutdown.is_cancelled() {
                return Err(NarrationError::Destroyed);
            }
            let id = factory.id();
            let mut engine = match factory.create() {
                Ok(engine) => engine,
                Err(failure) => {
                    warn!(engine = %id, error = %failure, "Engine failed to construct");
                    diagnostics.push(Diagnostic::new(
                        codes::PROBE_FAILED,
                        format!("{id}: {failure}"),
                    ));
                    continue;
                }
            };

            let usable = engine.probe(probe).await;
            if shutdown.is_cancelled() {
                debug!(engine = %id, "Session destroyed during probe, aborting init");
                return Err(NarrationError::Destroyed);
            }

            if usable {
                info!(engine = %id, "Engine probe succeeded");
            } else {
                warn!(engine = %id, "Engine probe failed, marking unusable");
                diagnostics.push(Diagnostic::new(codes::PROBE_FAILED, id.to_string()));
            }
            self.slots.push(EngineSlot {
                descriptor: EngineDescriptor {
                    id,
                    usable,
                    capabilities: engine.capabilities(),
                },
                engine,
            });
        }
        self.initialized = true;

        let preferred = prefer.and_then(|id| self.usable_index(id));
        let selected = preferred.or_else(|| self.slots.iter().position(|s| s.descriptor.usable));
        let selection_reason = match (prefer, preferred, selected) {
            (_, _, None) => None,
            (Some(_), None, Some(_)) => Some(REASON_INIT_FALLBACK.to_string()),
            (_, _, Some(index)) => Some(format!("selected_{}", self.slots[index].descriptor.id)),
        };

        if let Some(index) = selected {
            self.activate(index);
        } else {
            warn!(registered = self.slots.len(), "No usable speech engine");
        }

        Ok(InitReport {
            active: self.active_id(),
            selection_reason,
            diagnostics,
        })
    }

    #[must_use]
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    #[must_use]
    pub fn active_id(&self) -> Option<EngineId> {
        self.active.map(|i| self.slots[i].descriptor.id.clone())
    }

    #[must_use]
    pub fn is_active(&self, id: &EngineId) -> bool {
        self.active.is_some_and(|i| &self.slots[i].descriptor.id == id)
    }

    #[must_use]
    pub fn active_capabilities(&self) -> EngineCapabilities {
        self.active
            .map(|i| self.slots[i].descriptor.capabilities)
            .unwrap_or_default()
    }

    pub fn active_engine(&mut self) -> Option<&mut Box<dyn SpeechEngine>> {
        let index = self.active?;
        self.slots.get_mut(index).map(|slot| &mut slot.engine)
    }

    #[must_use]
    pub fn descriptors(&self) -> Vec<EngineDescriptor> {
        self.slots.iter().map(|s| s.descriptor.clone()).collect()
    }

    /// Whether [`switch_engine`](Self::switch_engine) would do anything.
    #[must_use]
    pub fn can_switch_to(&self, id: &EngineId) -> bool {
        !self.is_active(id) && self.usable_index(id).is_some()
    }

    /// Make `id` the active engine.
    ///
    /// Returns `false` (and does nothing) when `id` is already active,
    /// unknown, or unusable. Otherwise the current engine is cancelled,
    /// the new engine is bound to the signal channel and `settings` are
    /// applied to it.
    pub fn switch_engine(&mut self, id: &EngineId, settings: &VoiceSettings) -> bool {
        if self.is_active(id) {
            return false;
        }
        let Some(index) = self.usable_index(id) else {
            debug!(engine = %id, "Ignoring switch to unknown or unusable engine");
            return false;
        };

        if let Some(current) = self.active_engine() {
            current.cancel();
        }
        info!(from = ?self.active_id(), to = %id, "Switching speech engine");
        self.activate(index);
        self.apply_settings(settings);
        true
    }

    /// Push rate, pitch, volume and voice onto the active engine.
    pub fn apply_settings(&mut self, settings: &VoiceSettings) {
        let Some(engine) = self.active_engine() else {
            return;
        };
        engine.set_rate(settings.rate);
        engine.set_pitch(settings.pitch);
        engine.set_volume(settings.volume);
        if let Some(ref voice) = settings.voice {
            engine.set_voice(voice);
        }
    }

    /// Cancel every engine, not just the active one.
    pub fn cancel_all(&mut self) {
        for slot in &mut self.slots {
            slot.engine.cancel();
        }
    }

    /// Voices of every usable engine in priority order, tagged with the
    /// engine that offers them.
    #[must_use]
    pub fn voices(&self) -> Vec<VoiceInfo> {
        self.slots
            .iter()
            .filter(|s| s.descriptor.usable)
            .flat_map(|s| {
                let engine = s.descriptor.id.clone();
                s.engine.voices().into_iter().map(move |mut voice| {
                    voice.engine = Some(engine.clone());
                    voice
                })
            })
            .collect()
    }

    /// Highest-priority usable engine offering `voice_id`.
    #[must_use]
    pub fn engine_for_voice(&self, voice_id: &str) -> Option<EngineId> {
        self.slots
            .iter()
            .filter(|s| s.descriptor.usable)
            .find(|s| s.engine.voices().iter().any(|v| v.id == voice_id))
            .map(|s| s.descriptor.id.clone())
    }

    /// Next usable engine below the active one, once per session.
    #[must_use]
    pub fn fallback_candidate(&self) -> Option<EngineId> {
        if self.fallback_used {
            return None;
        }
        let start = self.active.map_or(0, |i| i + 1);
        self.slots
            .iter()
            .skip(start)
            .find(|s| s.descriptor.usable)
            .map(|s| s.descriptor.id.clone())
    }

    pub fn mark_fallback_used(&mut self) {
        self.fallback_used = true;
    }

    /// Cancel and drop every engine.
    pub fn destroy(&mut self) {
        self.cancel_all();
        self.active = None;
        self.slots.clear();
        debug!("Engine registry torn down");
    }

    fn usable_index(&self, id: &EngineId) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| &s.descriptor.id == id && s.descriptor.usable)
    }

    fn activate(&mut self, index: usize) {
        let sink = SignalSink::new(self.slots[index].descriptor.id.clone(), self.signal_tx.clone());
        self.slots[index].engine.bind(sink);
        self.active = Some(index);
    }
}

impl std::fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineRegistry")
            .field("engines", &self.descriptors())
            .field("active", &self.active_id())
            .field("initialized", &self.initialized)
            .finish_non_exhaustive()
    }
}
