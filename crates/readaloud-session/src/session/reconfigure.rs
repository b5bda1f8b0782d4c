//! Settings changes: rate, pitch, volume, voice, presets and highlights.
//!
//! Rate and voice changes during playback go through the throttle; when
//! one is applied the current item is restarted near the word being spoken.

use readaloud_core::{
    EngineId, HighlightColor, HighlightGranularity, HighlightStyle, PlaybackStatus, clamp_pitch,
    clamp_rate, clamp_volume, preset,
};
use tokio::time::Instant;
use tracing::{debug, info};

use super::NarrationSession;
use crate::registry::REASON_USER_SWITCH;
use crate::throttle::{ReconfigureRequest, ThrottleDecision};

impl NarrationSession {
    pub fn set_rate(&mut self, rate: f32) {
        let rate = clamp_rate(rate);
        if (self.config.rate - rate).abs() < f32::EPSILON {
            return;
        }
        self.config.rate = rate;
        self.config.preset = None;
        self.request_reconfigure(ReconfigureRequest::RATE);
    }

    pub fn set_pitch(&mut self, pitch: f32) {
        let pitch = clamp_pitch(pitch);
        if (self.config.pitch - pitch).abs() < f32::EPSILON {
            return;
        }
        self.config.pitch = pitch;
        self.config.preset = None;
        self.request_reconfigure(ReconfigureRequest::RATE);
    }

    /// Volume applies to the engine right away; it needs no restart.
    pub fn set_volume(&mut self, volume: f32) {
        self.config.volume = clamp_volume(volume);
        let volume = self.config.volume;
        if let Some(engine) = self.registry.active_engine() {
            engine.set_volume(volume);
        }
    }

    /// Select a voice. If another engine offers it, that engine becomes
    /// active when the change is applied.
    pub fn set_voice(&mut self, voice_id: &str) {
        if self.config.voice.as_deref() == Some(voice_id) {
            return;
        }
        self.config.voice = Some(voice_id.to_string());
        self.request_reconfigure(ReconfigureRequest::VOICE);
    }

    /// Apply a named preset's rate and pitch as one change.
    pub fn set_preset(&mut self, name: &str) -> bool {
        let Some(preset) = preset(name) else {
            debug!(name, "Unknown preset");
            return false;
        };
        self.config.rate = preset.rate;
        self.config.pitch = preset.pitch;
        self.config.preset = Some(preset.id.to_string());
        self.request_reconfigure(ReconfigureRequest::RATE);
        true
    }

    pub fn set_highlight_style(&mut self, style: HighlightStyle) {
        self.config.highlight_style = style;
        self.highlights.set_style(style);
    }

    pub fn set_highlight_color(&mut self, color: HighlightColor) {
        self.config.highlight_color = color;
        self.highlights.set_color(color);
    }

    pub fn set_highlight_granularity(&mut self, granularity: HighlightGranularity) {
        self.config.highlight_granularity = granularity;
        self.highlights.set_granularity(granularity);
    }

    /// Make `id` the active engine. No-op when it is already active or not
    /// usable. A playing item restarts on the new engine.
    pub fn switch_engine(&mut self, id: &EngineId) -> bool {
        if !self.registry.can_switch_to(id) {
            return false;
        }
        let playing = self.state.status == PlaybackStatus::Playing;
        if playing {
            self.state.clock.cancel();
        }
        let settings = self.voice_settings();
        self.registry.switch_engine(id, &settings);
        self.selection_reason = Some(REASON_USER_SWITCH.to_string());
        if playing {
            self.resume_in_place(0);
        }
        true
    }

    fn request_reconfigure(&mut self, request: ReconfigureRequest) {
        if self.state.status != PlaybackStatus::Playing {
            self.apply_engine_settings(request);
            return;
        }
        match self.throttle.submit(request, Instant::now()) {
            ThrottleDecision::ApplyNow(request) => self.apply_live(request),
            ThrottleDecision::Deferred { due } => {
                let wait_ms = due.saturating_duration_since(Instant::now()).as_millis();
                debug!(?request, wait_ms, "Reconfiguration deferred");
            }
        }
    }

    /// Restart the current item with new settings, resuming near the word
    /// that was being spoken.
    pub(super) fn apply_live(&mut self, request: ReconfigureRequest) {
        if self.state.status != PlaybackStatus::Playing {
            self.apply_engine_settings(request);
            return;
        }
        let offset = self.state.word.start;
        info!(?request, index = self.state.queue_index, offset, "Applying live reconfiguration");

        self.set_status(PlaybackStatus::RateOrVoicePaused);
        self.state.clock.cancel();
        if let Some(engine) = self.registry.active_engine() {
            engine.cancel();
        }
        self.apply_engine_settings(request);
        self.resume_in_place(offset);
    }

    /// Push the configured settings to the engine, switching engines first
    /// when the selected voice belongs to another one.
    pub(super) fn apply_engine_settings(&mut self, request: ReconfigureRequest) {
        let settings = self.voice_settings();
        if request.voice_changed {
            let owner = settings
                .voice
                .as_deref()
                .and_then(|voice| self.registry.engine_for_voice(voice));
            if let Some(owner) = owner {
                if self.registry.switch_engine(&owner, &settings) {
                    self.selection_reason = Some(REASON_USER_SWITCH.to_string());
                    return;
                }
            }
        }
        self.registry.apply_settings(&settings);
    }

    fn resume_in_place(&mut self, start_hint: usize) {
        if let Some(index) = self.state.position() {
            self.speak_item(index, start_hint, false);
        }
    }
}
