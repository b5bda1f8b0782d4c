//! Transport controls: play, pause, resume, stop and navigation.

use readaloud_core::{NarrationError, PlaybackStatus, Utterance, codes};
use tracing::{debug, info, warn};

use super::NarrationSession;

/// Characters per second spoken at rate 1.0, for approximate time jumps.
const CHARS_PER_SECOND: f64 = 15.0;

impl NarrationSession {
    /// Start playback.
    ///
    /// From a paused state this is [`resume`](Self::resume). Otherwise the
    /// queue is (re)built when needed and playback starts at `start`, the
    /// first visible block when `from_visible` is set and the surface knows
    /// it, or the first item. While already playing, a `start` seeks there.
    ///
    /// Returns `false` without changing state when there is no usable
    /// engine, the document never became ready, or there is nothing to
    /// read.
    pub async fn play(&mut self, start: Option<usize>, from_visible: bool) -> bool {
        if self.is_destroyed() {
            return false;
        }
        let status = self.state.status;
        if status.is_paused() {
            return self.resume();
        }
        if status.is_active() {
            if let Some(index) = start.and_then(|i| self.queue.clamp_index(index_to_i64(i))) {
                self.restart_at(index);
            }
            return true;
        }

        if self.registry.active_id().is_none() {
            self.record_error(&NarrationError::NoUsableEngine);
            return false;
        }
        if !self.wait_for_section().await {
            return false;
        }
        let section = self.document.active_section();
        if self.queue.is_empty() || self.queue.section() != section.as_ref() {
            self.rebuild_queue();
        }
        if self.queue.is_empty() && !self.enter_next_section().await {
            debug!("Nothing to narrate");
            return false;
        }

        let visible = from_visible
            .then(|| self.highlights.first_visible_block())
            .flatten();
        let target = start.or(visible).unwrap_or(0);
        let Some(index) = self.queue.clamp_index(index_to_i64(target)) else {
            return false;
        };

        info!(index, items = self.queue.len(), "Starting narration");
        self.state.consecutive_errors = 0;
        self.start_item(index);
        true
    }

    /// Pause playback. Only valid while playing.
    ///
    /// Engines with true pause suspend audio (`Paused`); others are
    /// cancelled and the item restarts on resume (`StopPaused`). Highlights
    /// stay on screen.
    pub fn pause(&mut self) -> bool {
        if self.state.status != PlaybackStatus::Playing {
            return false;
        }
        self.state.clock.cancel();

        if let Some(pending) = self.throttle.take_pending() {
            debug!(?pending, "Applying pending reconfiguration on pause");
            self.apply_engine_settings(pending);
        }

        let true_pause = self.registry.active_capabilities().true_pause;
        if let Some(engine) = self.registry.active_engine() {
            if true_pause {
                engine.pause();
            } else {
                engine.cancel();
            }
        }
        self.set_status(if true_pause {
            PlaybackStatus::Paused
        } else {
            PlaybackStatus::StopPaused
        });
        true
    }

    /// Resume from any paused state, restarting the current item from its
    /// beginning.
    pub fn resume(&mut self) -> bool {
        if !self.state.status.is_paused() {
            return false;
        }
        let Some(index) = self.state.position() else {
            return false;
        };
        if let Some(engine) = self.registry.active_engine() {
            engine.cancel();
        }
        self.start_item(index);
        true
    }

    /// Stop playback from any state and clear all highlights.
    ///
    /// A throttled settings change still reaches the engine so the next
    /// play uses it.
    pub fn stop(&mut self) {
        self.state.clock.cancel();
        if let Some(pending) = self.throttle.take_pending() {
            debug!(?pending, "Applying pending reconfiguration on stop");
            self.apply_engine_settings(pending);
        }
        self.sleep_deadline = None;

        if let Some(engine) = self.registry.active_engine() {
            engine.cancel();
            engine.clear_preload_cache();
        }
        self.registry.cancel_all();
        self.highlights.clear_all();

        self.state.reset();
        self.set_status(PlaybackStatus::Idle);
    }

    /// Move `delta` items relative to the current one.
    pub async fn step_item(&mut self, delta: i64) -> bool {
        let base = self.state.position().map_or(0, index_to_i64);
        self.seek(base.saturating_add(delta), false).await
    }

    /// Move to `target`, clamped into the queue.
    ///
    /// While playing, the current utterance is cancelled and the target is
    /// spoken. While paused, only position and highlight move, unless
    /// `autoplay` is set. While idle, `autoplay` starts playback there and
    /// anything else is a no-op.
    pub async fn seek(&mut self, target: i64, autoplay: bool) -> bool {
        match self.state.status {
            PlaybackStatus::Idle => {
                if !autoplay {
                    return false;
                }
                let start = usize::try_from(target.max(0)).unwrap_or(0);
                self.play(Some(start), false).await
            }
            PlaybackStatus::Playing => {
                let Some(index) = self.queue.clamp_index(target) else {
                    return false;
                };
                self.restart_at(index);
                true
            }
            PlaybackStatus::SectionTransition => false,
            paused => {
                let Some(index) = self.queue.clamp_index(target) else {
                    return false;
                };
                if autoplay {
                    self.restart_at(index);
                    return true;
                }
                self.move_while_paused(paused, index);
                true
            }
        }
    }

    /// Jump by roughly `delta_ms` of speech, moving at least one item.
    ///
    /// The distance is converted to chars at the current rate and measured
    /// from the start of the current item; the item containing that point
    /// becomes current.
    pub async fn jump_approx(&mut self, delta_ms: i64) -> bool {
        let Some(current) = self.state.position() else {
            return false;
        };
        if delta_ms == 0 || self.queue.is_empty() {
            return false;
        }

        #[allow(clippy::cast_precision_loss)]
        let seconds = delta_ms.unsigned_abs() as f64 / 1000.0;
        let budget = seconds * CHARS_PER_SECOND * f64::from(self.config.rate);
        let last = self.queue.len() - 1;
        let index = if delta_ms > 0 {
            let mut index = current;
            let mut next_start = char_len(self, current);
            while index < last && next_start <= budget {
                index += 1;
                next_start += char_len(self, index);
            }
            index.max(current + 1).min(last)
        } else {
            let mut index = current;
            let mut covered = 0.0;
            while index > 0 && covered < budget {
                index -= 1;
                covered += char_len(self, index);
            }
            index
        };
        debug!(delta_ms, from = current, to = index, "Approximate jump");
        self.seek(index_to_i64(index), false).await
    }

    /// Start playback at the first item containing `needle`, ignoring case.
    /// Returns whether a match was found.
    pub async fn play_from_text(&mut self, needle: &str) -> bool {
        if self.queue.is_empty() && self.document.active_section().is_some() {
            self.rebuild_queue();
        }
        let Some(index) = self.queue.find_text(needle, 0) else {
            debug!(needle, "No item matches text");
            return false;
        };
        if self.state.status == PlaybackStatus::Idle {
            self.play(Some(index), false).await
        } else {
            self.seek(index_to_i64(index), true).await
        }
    }

    /// Speak `index` from its start and enter `Playing`.
    pub(super) fn start_item(&mut self, index: usize) {
        self.speak_item(index, 0, false);
    }

    /// Cancel whatever is in flight and speak `index` from its start.
    fn restart_at(&mut self, index: usize) {
        self.state.clock.cancel();
        if let Some(engine) = self.registry.active_engine() {
            engine.cancel();
        }
        self.start_item(index);
    }

    /// Issue a fresh utterance for `index` on the active engine.
    ///
    /// `start_hint` is a best-effort char offset to resume from. With
    /// `gapless`, engines that support it chain onto the previous item.
    pub(super) fn speak_item(&mut self, index: usize, start_hint: usize, gapless: bool) {
        let Some(item) = self.queue.get(index) else {
            warn!(index, len = self.queue.len(), "Speak requested past end of queue");
            self.stop();
            return;
        };
        let text = item.text.clone();
        let next_text = self.queue.get(index + 1).map(|next| next.text.clone());

        self.state.set_position(index, &text);
        let id = self.state.clock.issue();
        let caps = self.registry.active_capabilities();
        let Some(engine) = self.registry.active_engine() else {
            self.record_error(&NarrationError::NoUsableEngine);
            self.stop();
            return;
        };

        let utterance = Utterance::new(id, &text).with_start_hint(start_hint);
        if gapless && caps.gapless {
            engine.speak_gapless(utterance);
        } else {
            engine.speak(utterance);
        }
        if caps.prefetch {
            if let Some(ref next) = next_text {
                engine.prepare_next(next);
                engine.preload(next);
            }
        }

        self.set_status(PlaybackStatus::Playing);
        self.emit_progress();
    }

    /// Wait for the document to report an active section, retrying with
    /// linear backoff. Gives up silently, recording a diagnostic.
    async fn wait_for_section(&mut self) -> bool {
        if self.document.active_section().is_some() {
            return true;
        }
        let attempts = self.config.ready_retry_attempts;
        for attempt in 1..=attempts {
            tokio::time::sleep(self.config.ready_retry_backoff * attempt).await;
            if self.is_destroyed() {
                return false;
            }
            if self.document.active_section().is_some() {
                debug!(attempt, "Section became ready");
                return true;
            }
        }
        warn!(attempts, "Document section not ready, giving up");
        let err = NarrationError::SectionNotReady { attempts };
        self.record_diag(codes::SECTION_NOT_READY, err.to_string());
        false
    }

    fn move_while_paused(&mut self, paused: PlaybackStatus, index: usize) {
        let current = self.state.position().unwrap_or(0);
        let status = match index.cmp(&current) {
            std::cmp::Ordering::Less => PlaybackStatus::BackwardPaused,
            std::cmp::Ordering::Greater => PlaybackStatus::ForwardPaused,
            std::cmp::Ordering::Equal => paused,
        };
        let Some(item) = self.queue.get(index) else {
            return;
        };
        let text = item.text.clone();
        let anchor = item.block_anchor();

        self.state.set_position(index, &text);
        if let Some(anchor) = anchor {
            self.highlights.apply_anchor_highlight(anchor);
        }
        self.set_status(status);
        self.emit_progress();
    }
}

#[allow(clippy::cast_precision_loss)]
fn char_len(session: &NarrationSession, index: usize) -> f64 {
    session.queue.get(index).map_or(0.0, |item| item.char_len() as f64)
}

fn index_to_i64(index: usize) -> i64 {
    i64::try_from(index).unwrap_or(i64::MAX)
}
