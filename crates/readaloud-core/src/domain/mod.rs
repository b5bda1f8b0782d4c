//! Domain types for narration.
//!
//! Pure data and pure functions: no timers, no engine handles, no host
//! references beyond opaque [`AnchorRef`] handles.

mod anchor;
mod marks;
mod queue;
mod status;
mod voice;

pub use anchor::{AnchorRef, Locator, SectionKey};
pub use marks::{Mark, ParsedMarkup, find_nearest_mark, parse_markup};
pub use queue::{PlaybackQueue, QueueBuild, QueueItem, WORDS_PER_MINUTE, build_queue};
pub use status::{PlaybackStatus, WordSpan};
pub use voice::{
    EngineCapabilities, EngineDescriptor, EngineId, VoiceGender, VoiceInfo, voice_info,
};
