//! Playback status values.

use serde::{Deserialize, Serialize};

/// Current state of narration.
///
/// ```text
///   Idle → Playing → { Paused | StopPaused | BackwardPaused
///                     | ForwardPaused | RateOrVoicePaused } → Playing → Idle
///            │                                                 ▲
///            └──────────── SectionTransition ──────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackStatus {
    /// Nothing queued for speech; queue index is -1.
    #[default]
    Idle,

    /// An item is being synthesized/spoken.
    Playing,

    /// The engine truly paused its audio.
    Paused,

    /// The engine cannot pause; it was cancelled and the item restarts on resume.
    StopPaused,

    /// Moved backwards while paused, without audio.
    BackwardPaused,

    /// Moved forwards while paused, without audio.
    ForwardPaused,

    /// Interrupted by a live rate/voice reconfiguration.
    RateOrVoicePaused,

    /// Waiting for the document to hand over the next section.
    SectionTransition,
}

impl PlaybackStatus {
    /// Whether this is one of the paused sub-states.
    #[must_use]
    pub const fn is_paused(self) -> bool {
        matches!(
            self,
            Self::Paused
                | Self::StopPaused
                | Self::BackwardPaused
                | Self::ForwardPaused
                | Self::RateOrVoicePaused
        )
    }

    /// Whether playback is active or about to continue on its own.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Playing | Self::SectionTransition)
    }
}

/// Half-open `[start, end)` span of the word being spoken, in chars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WordSpan {
    pub start: usize,
    pub end: usize,
}

impl WordSpan {
    /// Span for a boundary event; zero-length boundaries extend to the end of
    /// the non-whitespace run starting at `char_index`. Both ends are clamped
    /// to the length of `text`.
    #[must_use]
    pub fn from_boundary(text: &str, char_index: usize, char_length: usize) -> Self {
        let len = text.chars().count();
        let start = char_index.min(len);
        let end = if char_length > 0 {
            char_index.saturating_add(char_length)
        } else {
            let run = text
                .chars()
                .skip(start)
                .take_while(|c| !c.is_whitespace())
                .count();
            start.saturating_add(run.max(1))
        };
        Self {
            start,
            end: end.clamp(start, len),
        }
    }
}
