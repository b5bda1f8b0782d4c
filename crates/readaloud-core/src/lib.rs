#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unused_crate_dependencies)]

pub mod domain;
pub mod error;
pub mod events;
pub mod ports;
pub mod settings;

pub use domain::{
    AnchorRef, EngineCapabilities, EngineDescriptor, EngineId, Locator, Mark, ParsedMarkup,
    PlaybackQueue, PlaybackStatus, QueueBuild, QueueItem, SectionKey, VoiceGender, VoiceInfo,
    WORDS_PER_MINUTE, WordSpan, build_queue, find_nearest_mark, parse_markup, voice_info,
};
pub use error::{
    ConfigError, Diagnostic, DocumentError, ErrorInfo, NarrationError, SynthesisFailure, codes,
};
pub use events::{FallbackInfo, NarrationEvent, NarrationSnapshot, SegmentPreview, SegmentWindow};
pub use ports::{
    BlockSource, BoundaryKind, ChannelObserver, DocumentIntegration, EngineEvent, EngineFactory,
    EngineSignal, HighlightKind, HighlightPaint, HighlightSurface, NarrationObserver, NoopObserver,
    PaintDecoration, ProbeRequest, SignalSink, SpeechEngine, Utterance, UtteranceId,
};
pub use settings::{
    DEFAULT_MAX_CONSECUTIVE_ERRORS, DEFAULT_RECONFIGURE_THROTTLE, HighlightColor,
    HighlightGranularity, HighlightStyle, NarrationConfig, PRESETS, PaletteEntry, Preset,
    clamp_pitch, clamp_rate, clamp_volume, preset, validate_config,
};

