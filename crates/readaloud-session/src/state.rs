//! Mutable playback state owned by the session.

use readaloud_core::{PlaybackStatus, UtteranceId, WordSpan};

/// Issues utterance ids and tracks which one is live.
///
/// Cancelling clears the live id; every later `issue` hands out a fresh id,
/// so signals for anything spoken before the cancel can never match again.
/// While no id is live, all utterance signals are discarded.
#[derive(Debug, Default)]
pub struct UtteranceClock {
    issued: u64,
    live: Option<UtteranceId>,
}

impl UtteranceClock {
    /// Mark the in-flight utterance as cancelled. Call before telling the
    /// engine to stop.
    pub fn cancel(&mut self) {
        self.live = None;
    }

    /// Allocate the id for the next `speak` and make it live.
    pub fn issue(&mut self) -> UtteranceId {
        self.issued += 1;
        let id = UtteranceId(self.issued);
        self.live = Some(id);
        id
    }

    #[must_use]
    pub fn is_live(&self, id: UtteranceId) -> bool {
        self.live == Some(id)
    }

    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        self.live.is_none()
    }

    #[must_use]
    pub const fn live(&self) -> Option<UtteranceId> {
        self.live
    }
}

/// Position and progress of playback.
#[derive(Debug)]
pub struct PlaybackState {
    pub status: PlaybackStatus,
    /// Index into the queue; -1 while idle or before the first item of a
    /// freshly built queue.
    pub queue_index: i64,
    pub current_text: String,
    pub word: WordSpan,
    pub consecutive_errors: u32,
    pub clock: UtteranceClock,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            status: PlaybackStatus::Idle,
            queue_index: -1,
            current_text: String::new(),
            word: WordSpan::default(),
            consecutive_errors: 0,
            clock: UtteranceClock::default(),
        }
    }
}

impl PlaybackState {
    /// Current index as a queue position, `None` while idle.
    #[must_use]
    pub fn position(&self) -> Option<usize> {
        usize::try_from(self.queue_index).ok()
    }

    pub fn set_position(&mut self, index: usize, text: &str) {
        self.queue_index = i64::try_from(index).unwrap_or(i64::MAX);
        text.clone_into(&mut self.current_text);
        self.word = WordSpan::default();
    }

    /// Forget the position in a queue that was just replaced. The error
    /// count carries over.
    pub fn clear_position(&mut self) {
        self.queue_index = -1;
        self.current_text.clear();
        self.word = WordSpan::default();
    }

    /// Drop position and text. Status is left to the caller so the
    /// transition can be reported. The clock is cancelled; ids keep
    /// increasing so older signals stay stale.
    pub fn reset(&mut self) {
        self.queue_index = -1;
        self.current_text.clear();
        self.word = WordSpan::default();
        self.consecutive_errors = 0;
        self.clock.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_ids_never_become_live_again() {
        let mut clock = UtteranceClock::default();
        let first = clock.issue();
        assert!(clock.is_live(first));

        clock.cancel();
        assert!(clock.is_cancelled());
        assert!(!clock.is_live(first));

        let second = clock.issue();
        assert_ne!(first, second);
        assert!(!clock.is_live(first));
        assert!(clock.is_live(second));
    }

    #[test]
    fn reset_clears_position() {
        let mut state = PlaybackState::default();
        state.set_position(3, "Done.");
        state.status = PlaybackStatus::Playing;
        state.clock.issue();

        state.reset();

        assert_eq!(state.queue_index, -1);
        assert_eq!(state.position(), None);
        assert!(state.current_text.is_empty());
        assert!(state.clock.is_cancelled());
    }

    #[test]
    fn clear_position_keeps_error_count() {
        let mut state = PlaybackState::default();
        state.set_position(2, "Three.");
        state.consecutive_errors = 2;

        state.clear_position();

        assert_eq!(state.position(), None);
        assert!(state.current_text.is_empty());
        assert_eq!(state.consecutive_errors, 2);
    }
}
