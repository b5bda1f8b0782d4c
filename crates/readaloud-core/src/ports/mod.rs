//! Port definitions: the interfaces narration consumes and exposes.
//!
//! - [`SpeechEngine`] / [`EngineFactory`]: synthesis backends
//! - [`DocumentIntegration`] / [`BlockSource`]: the host document
//! - [`HighlightSurface`]: the host rendering surface
//! - [`NarrationObserver`]: UI-facing event sink

mod document;
mod engine;
mod observer;
mod surface;

pub use document::{BlockSource, DocumentIntegration};
pub use engine::{
    BoundaryKind, EngineEvent, EngineFactory, EngineSignal, ProbeRequest, SignalSink,
    SpeechEngine, Utterance, UtteranceId,
};
pub use observer::{ChannelObserver, NarrationObserver, NoopObserver};
pub use surface::{HighlightKind, HighlightPaint, HighlightSurface, PaintDecoration};

#[cfg(test)]
pub use document::MockBlockSource;
