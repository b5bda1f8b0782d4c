//! Shared fakes for session integration tests.
//!
//! Every fake keeps its observable state behind an `Arc<Mutex<_>>` so the
//! test can inspect it after the session took ownership of the fake.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use readaloud_core::{
    AnchorRef, BlockSource, ChannelObserver, DocumentError, DocumentIntegration,
    EngineCapabilities, EngineFactory, EngineId, HighlightKind, HighlightPaint, HighlightSurface,
    Locator, NarrationConfig, NarrationEvent, PlaybackStatus, ProbeRequest, SectionKey,
    SignalSink, SpeechEngine, SynthesisFailure, Utterance, UtteranceId, VoiceInfo, parse_markup,
    voice_info,
};
use readaloud_session::NarrationSession;
use tokio::sync::mpsc;
use tokio::time::Instant;

// ── Engine ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Spoken {
    pub id: UtteranceId,
    pub text: String,
    pub start_hint: usize,
    pub gapless: bool,
    pub at: Instant,
}

#[derive(Debug, Default)]
pub struct EngineLog {
    pub spoken: Vec<Spoken>,
    pub cancels: usize,
    pub pauses: usize,
    pub rates: Vec<f32>,
    pub volumes: Vec<f32>,
    pub voices: Vec<String>,
    pub preloads: Vec<String>,
    pub probes: usize,
}

/// Test-side view of a fake engine.
#[derive(Clone)]
pub struct EngineProbe {
    pub id: EngineId,
    pub log: Arc<Mutex<EngineLog>>,
    sink: Arc<Mutex<Option<SignalSink>>>,
}

impl EngineProbe {
    pub fn spoken_texts(&self) -> Vec<String> {
        self.log.lock().unwrap().spoken.iter().map(|s| s.text.clone()).collect()
    }

    pub fn speak_count(&self) -> usize {
        self.log.lock().unwrap().spoken.len()
    }

    pub fn last_spoken(&self) -> Option<Spoken> {
        self.log.lock().unwrap().spoken.last().cloned()
    }

    pub fn last_id(&self) -> UtteranceId {
        self.last_spoken().expect("engine spoke at least once").id
    }

    pub fn cancels(&self) -> usize {
        self.log.lock().unwrap().cancels
    }

    fn sink(&self) -> SignalSink {
        self.sink
            .lock()
            .unwrap()
            .clone()
            .expect("engine was bound to the session")
    }

    /// Report a word boundary for the most recent utterance.
    pub fn boundary(&self, char_index: usize, char_length: usize) {
        self.boundary_for(self.last_id(), char_index, char_length);
    }

    pub fn boundary_for(&self, id: UtteranceId, char_index: usize, char_length: usize) {
        self.sink()
            .boundary(id, char_index, char_length, readaloud_core::BoundaryKind::Word);
    }

    pub fn end(&self) {
        self.sink().end(self.last_id());
    }

    pub fn end_for(&self, id: UtteranceId) {
        self.sink().end(id);
    }

    pub fn error(&self, code: &str) {
        self.sink()
            .error(self.last_id(), SynthesisFailure::new(code, "fake failure"));
    }
}

#[derive(Clone)]
pub struct FakeEngineConfig {
    pub usable: bool,
    pub capabilities: EngineCapabilities,
    /// Report `End` as soon as an utterance is spoken.
    pub auto_end: bool,
    pub voices: Vec<VoiceInfo>,
    pub probe_delay: Option<Duration>,
}

impl Default for FakeEngineConfig {
    fn default() -> Self {
        Self {
            usable: true,
            capabilities: EngineCapabilities::default(),
            auto_end: false,
            voices: Vec::new(),
            probe_delay: None,
        }
    }
}

pub struct FakeEngine {
    id: EngineId,
    config: FakeEngineConfig,
    log: Arc<Mutex<EngineLog>>,
    sink: Arc<Mutex<Option<SignalSink>>>,
}

#[async_trait]
impl SpeechEngine for FakeEngine {
    fn id(&self) -> EngineId {
        self.id.clone()
    }

    fn capabilities(&self) -> EngineCapabilities {
        self.config.capabilities
    }

    fn bind(&mut self, sink: SignalSink) {
        *self.sink.lock().unwrap() = Some(sink);
    }

    fn speak(&mut self, utterance: Utterance<'_>) {
        self.record(utterance, false);
    }

    fn speak_gapless(&mut self, utterance: Utterance<'_>) {
        self.record(utterance, true);
    }

    fn cancel(&mut self) {
        self.log.lock().unwrap().cancels += 1;
    }

    fn pause(&mut self) {
        self.log.lock().unwrap().pauses += 1;
    }

    fn preload(&mut self, text: &str) {
        self.log.lock().unwrap().preloads.push(text.to_string());
    }

    fn set_rate(&mut self, rate: f32) {
        self.log.lock().unwrap().rates.push(rate);
    }

    fn set_volume(&mut self, volume: f32) {
        self.log.lock().unwrap().volumes.push(volume);
    }

    fn set_voice(&mut self, voice_id: &str) {
        self.log.lock().unwrap().voices.push(voice_id.to_string());
    }

    fn voices(&self) -> Vec<VoiceInfo> {
        self.config.voices.clone()
    }

    async fn probe(&mut self, _request: &ProbeRequest) -> bool {
        self.log.lock().unwrap().probes += 1;
        if let Some(delay) = self.config.probe_delay {
            tokio::time::sleep(delay).await;
        }
        self.config.usable
    }
}

impl FakeEngine {
    fn record(&mut self, utterance: Utterance<'_>, gapless: bool) {
        self.log.lock().unwrap().spoken.push(Spoken {
            id: utterance.id,
            text: utterance.text.to_string(),
            start_hint: utterance.start_hint,
            gapless,
            at: Instant::now(),
        });
        if self.config.auto_end {
            if let Some(sink) = self.sink.lock().unwrap().as_ref() {
                sink.end(utterance.id);
            }
        }
    }
}

pub struct FakeEngineFactory {
    id: EngineId,
    config: FakeEngineConfig,
    log: Arc<Mutex<EngineLog>>,
    sink: Arc<Mutex<Option<SignalSink>>>,
}

impl EngineFactory for FakeEngineFactory {
    fn id(&self) -> EngineId {
        self.id.clone()
    }

    fn create(&self) -> Result<Box<dyn SpeechEngine>, SynthesisFailure> {
        Ok(Box::new(FakeEngine {
            id: self.id.clone(),
            config: self.config.clone(),
            log: Arc::clone(&self.log),
            sink: Arc::clone(&self.sink),
        }))
    }
}

pub fn fake_engine(id: &str, config: FakeEngineConfig) -> (Arc<dyn EngineFactory>, EngineProbe) {
    let log = Arc::new(Mutex::new(EngineLog::default()));
    let sink = Arc::new(Mutex::new(None));
    let factory = FakeEngineFactory {
        id: EngineId::new(id),
        config,
        log: Arc::clone(&log),
        sink: Arc::clone(&sink),
    };
    let probe = EngineProbe {
        id: EngineId::new(id),
        log,
        sink,
    };
    (Arc::new(factory), probe)
}

pub fn voices(names: &[&str]) -> Vec<VoiceInfo> {
    names.iter().map(|n| voice_info(*n, *n, "en-US")).collect()
}

// ── Document ───────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct DocumentLog {
    pub polls: usize,
    pub starts: usize,
    pub advances: usize,
    pub section: usize,
}

/// A document of sections, each a list of block markups. Anchors are
/// numbered `section * 1000 + block * 10 + mark`.
pub struct FakeDocument {
    sections: Vec<Vec<String>>,
    section: usize,
    cursor: Option<usize>,
    current: HashMap<String, AnchorRef>,
    not_ready_polls: usize,
    log: Arc<Mutex<DocumentLog>>,
}

impl FakeDocument {
    pub fn new(sections: &[&[&str]]) -> (Self, Arc<Mutex<DocumentLog>>) {
        let log = Arc::new(Mutex::new(DocumentLog::default()));
        let doc = Self {
            sections: sections
                .iter()
                .map(|blocks| blocks.iter().map(|b| (*b).to_string()).collect())
                .collect(),
            section: 0,
            cursor: None,
            current: HashMap::new(),
            not_ready_polls: 0,
            log: Arc::clone(&log),
        };
        (doc, log)
    }

    /// Plain sentences, each wrapped with one mark per word.
    pub fn from_sentences(sections: &[&[&str]]) -> (Self, Arc<Mutex<DocumentLog>>) {
        let marked: Vec<Vec<String>> = sections
            .iter()
            .map(|blocks| blocks.iter().map(|b| mark_words(b)).collect())
            .collect();
        let refs: Vec<Vec<&str>> = marked
            .iter()
            .map(|blocks| blocks.iter().map(String::as_str).collect())
            .collect();
        let slices: Vec<&[&str]> = refs.iter().map(Vec::as_slice).collect();
        Self::new(&slices)
    }

    /// Report "not ready" for the first `polls` readiness checks.
    pub fn not_ready_for(mut self, polls: usize) -> Self {
        self.not_ready_polls = polls;
        self
    }

    fn emit(&mut self, index: usize) -> Result<Option<String>, DocumentError> {
        self.cursor = Some(index);
        self.current.clear();
        let Some(markup) = self.sections.get(self.section).and_then(|s| s.get(index)).cloned()
        else {
            return Ok(None);
        };
        for (mark_index, mark) in parse_markup(&markup).marks.into_iter().enumerate() {
            let id = (self.section * 1000 + index * 10 + mark_index) as u64;
            self.current.insert(mark.name, AnchorRef(id));
        }
        Ok(Some(markup))
    }
}

pub fn mark_words(sentence: &str) -> String {
    sentence
        .split(' ')
        .enumerate()
        .map(|(i, word)| format!(r#"<mark name="w{i}"/>{word}"#))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn anchor(section: usize, block: usize, mark: usize) -> AnchorRef {
    AnchorRef((section * 1000 + block * 10 + mark) as u64)
}

impl BlockSource for FakeDocument {
    fn start(&mut self) -> Result<Option<String>, DocumentError> {
        self.log.lock().unwrap().starts += 1;
        self.emit(0)
    }

    fn next(&mut self) -> Result<Option<String>, DocumentError> {
        let index = self.cursor.map_or(0, |c| c + 1);
        self.emit(index)
    }

    fn snapshot_ranges(&self) -> HashMap<String, AnchorRef> {
        self.current.clone()
    }
}

#[async_trait]
impl DocumentIntegration for FakeDocument {
    fn active_section(&self) -> Option<SectionKey> {
        let mut log = self.log.lock().unwrap();
        log.polls += 1;
        if log.polls <= self.not_ready_polls {
            return None;
        }
        Some(SectionKey::new(format!("section-{}", self.section)))
    }

    async fn locator(&self) -> Option<Locator> {
        Some(Locator {
            section: SectionKey::new(format!("section-{}", self.section)),
            position: format!("block-{}", self.cursor.unwrap_or(0)),
            fraction: None,
        })
    }

    async fn advance_section(&mut self) -> bool {
        if self.section + 1 >= self.sections.len() {
            return false;
        }
        self.section += 1;
        self.cursor = None;
        let mut log = self.log.lock().unwrap();
        log.advances += 1;
        log.section = self.section;
        true
    }
}

// ── Surface ────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct SurfaceLog {
    /// Every paint call in order.
    pub applied: Vec<(AnchorRef, HighlightKind, HighlightPaint)>,
    /// What is currently painted per layer.
    pub layers: HashMap<HighlightKind, AnchorRef>,
    pub clears: usize,
    pub scrolled: Vec<AnchorRef>,
    pub wrapped: Option<AnchorRef>,
    pub unwraps: usize,
    pub visible: HashSet<AnchorRef>,
    pub first_visible: Option<usize>,
}

pub struct RecordingSurface {
    log: Arc<Mutex<SurfaceLog>>,
}

impl RecordingSurface {
    pub fn new() -> (Self, Arc<Mutex<SurfaceLog>>) {
        let log = Arc::new(Mutex::new(SurfaceLog::default()));
        (Self { log: Arc::clone(&log) }, log)
    }
}

impl HighlightSurface for RecordingSurface {
    fn apply_highlight(&mut self, anchor: AnchorRef, kind: HighlightKind, paint: &HighlightPaint) {
        let mut log = self.log.lock().unwrap();
        log.applied.push((anchor, kind, *paint));
        log.layers.insert(kind, anchor);
    }

    fn clear_highlight(&mut self, kind: HighlightKind) {
        let mut log = self.log.lock().unwrap();
        log.clears += 1;
        log.layers.remove(&kind);
    }

    fn scroll_into_view(&mut self, anchor: AnchorRef) {
        self.log.lock().unwrap().scrolled.push(anchor);
    }

    fn is_adequately_visible(&self, anchor: AnchorRef) -> bool {
        self.log.lock().unwrap().visible.contains(&anchor)
    }

    fn block_container(&self, anchor: AnchorRef) -> Option<AnchorRef> {
        // Block container of a word anchor is the block's first mark.
        Some(AnchorRef(anchor.0 - anchor.0 % 10))
    }

    fn wrap_enlarged(&mut self, anchor: AnchorRef) -> bool {
        let mut log = self.log.lock().unwrap();
        assert!(log.wrapped.is_none(), "enlarge wrap must be reverted first");
        log.wrapped = Some(anchor);
        true
    }

    fn unwrap_enlarged(&mut self) {
        let mut log = self.log.lock().unwrap();
        log.wrapped = None;
        log.unwraps += 1;
    }

    fn first_visible_block(&self) -> Option<usize> {
        self.log.lock().unwrap().first_visible
    }
}

// ── Session helpers ────────────────────────────────────────────────

pub struct Harness {
    pub session: NarrationSession,
    pub engines: Vec<EngineProbe>,
    pub document: Arc<Mutex<DocumentLog>>,
    pub surface: Arc<Mutex<SurfaceLog>>,
    pub events: mpsc::UnboundedReceiver<NarrationEvent>,
}

impl Harness {
    pub fn engine(&self) -> &EngineProbe {
        &self.engines[0]
    }

    /// Everything observers received since the last call.
    pub fn drain_events(&mut self) -> Vec<NarrationEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

pub struct HarnessBuilder {
    config: NarrationConfig,
    engines: Vec<(String, FakeEngineConfig)>,
    document: Option<FakeDocument>,
    doc_log: Option<Arc<Mutex<DocumentLog>>>,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            config: NarrationConfig::default(),
            engines: Vec::new(),
            document: None,
            doc_log: None,
        }
    }

    pub fn config(mut self, config: NarrationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn engine(mut self, id: &str, config: FakeEngineConfig) -> Self {
        self.engines.push((id.to_string(), config));
        self
    }

    pub fn document(mut self, document: (FakeDocument, Arc<Mutex<DocumentLog>>)) -> Self {
        self.document = Some(document.0);
        self.doc_log = Some(document.1);
        self
    }

    /// Build and initialize the session.
    pub async fn build(self) -> Harness {
        let (factories, engines): (Vec<_>, Vec<_>) = self
            .engines
            .into_iter()
            .map(|(id, config)| fake_engine(&id, config))
            .unzip();
        let (document, doc_log) = match (self.document, self.doc_log) {
            (Some(doc), Some(log)) => (doc, log),
            _ => three_blocks(),
        };
        let (surface, surface_log) = RecordingSurface::new();

        let mut session =
            NarrationSession::new(self.config, factories, Box::new(document), Box::new(surface));
        let (observer, events) = ChannelObserver::channel();
        session.subscribe(Arc::new(observer));
        session.init().await;

        Harness {
            session,
            engines,
            document: doc_log,
            surface: surface_log,
            events,
        }
    }
}

/// The three-block section used throughout the tests.
pub fn three_blocks() -> (FakeDocument, Arc<Mutex<DocumentLog>>) {
    FakeDocument::from_sentences(&[&["Hello world.", "Second sentence here.", "Done."]])
}

/// Statuses from `StateChanged` events, in order.
pub fn statuses(events: &[NarrationEvent]) -> Vec<PlaybackStatus> {
    events
        .iter()
        .filter_map(|e| match e {
            NarrationEvent::StateChanged { status, .. } => Some(*status),
            _ => None,
        })
        .collect()
}

/// Block indices reported by `Progress` events, deduplicated in order.
pub fn progress_indices(events: &[NarrationEvent]) -> Vec<i64> {
    let mut indices: Vec<i64> = Vec::new();
    for event in events {
        if let NarrationEvent::Progress { snapshot } = event {
            if indices.last() != Some(&snapshot.block_idx) {
                indices.push(snapshot.block_idx);
            }
        }
    }
    indices
}
