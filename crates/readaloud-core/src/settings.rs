//! Narration configuration types and validation.
//!
//! Pure data with serde support so the host can persist and restore them.
//! Runtime setters on the session clamp values into range; `validate_config`
//! is for configuration loaded from storage, where silently clamping would
//! hide a corrupt file.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const RATE_MIN: f32 = 0.5;
pub const RATE_MAX: f32 = 2.0;
pub const PITCH_MIN: f32 = 0.5;
pub const PITCH_MAX: f32 = 2.0;
pub const VOLUME_MIN: f32 = 0.0;
pub const VOLUME_MAX: f32 = 1.0;

/// Minimum quiet time between two applied live reconfigurations.
pub const DEFAULT_RECONFIGURE_THROTTLE: Duration = Duration::from_millis(3000);

/// Consecutive non-transient synthesis errors before playback is force-stopped.
pub const DEFAULT_MAX_CONSECUTIVE_ERRORS: u32 = 3;

pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);

pub const DEFAULT_MAX_QUEUE_ITEMS: usize = 20_000;

// ── Highlight appearance ───────────────────────────────────────────

/// How the spoken text is marked on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HighlightStyle {
    /// Filled background.
    #[default]
    Plain,
    Underline,
    Squiggly,
    Strikethrough,
    /// Word is wrapped in a scaled inline element (mutates the document).
    Enlarge,
}

/// Which regions are highlighted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HighlightGranularity {
    Sentence,
    Word,
    #[default]
    Both,
}

impl HighlightGranularity {
    #[must_use]
    pub const fn includes_sentence(self) -> bool {
        matches!(self, Self::Sentence | Self::Both)
    }

    #[must_use]
    pub const fn includes_word(self) -> bool {
        matches!(self, Self::Word | Self::Both)
    }
}

/// Fixed highlight palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HighlightColor {
    #[default]
    Grey,
    Blue,
    Yellow,
    Green,
    Pink,
    Orange,
}

/// CSS colors for one palette entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaletteEntry {
    /// Fill behind the whole sentence.
    pub sentence: &'static str,
    /// Fill behind the current word.
    pub word: &'static str,
    /// Stroke for underline, squiggly and strikethrough styles.
    pub line: &'static str,
}

impl HighlightColor {
    pub const ALL: [Self; 6] = [
        Self::Grey,
        Self::Blue,
        Self::Yellow,
        Self::Green,
        Self::Pink,
        Self::Orange,
    ];

    #[must_use]
    pub const fn palette(self) -> PaletteEntry {
        match self {
            Self::Grey => PaletteEntry {
                sentence: "rgba(140,140,155,0.35)",
                word: "rgba(130,130,145,0.6)",
                line: "#9a9aa8",
            },
            Self::Blue => PaletteEntry {
                sentence: "rgba(100,160,255,0.25)",
                word: "rgba(90,150,255,0.55)",
                line: "#5a96ff",
            },
            Self::Yellow => PaletteEntry {
                sentence: "rgba(255,230,100,0.3)",
                word: "rgba(255,220,50,0.5)",
                line: "#e6c800",
            },
            Self::Green => PaletteEntry {
                sentence: "rgba(100,200,120,0.25)",
                word: "rgba(80,180,100,0.5)",
                line: "#50b464",
            },
            Self::Pink => PaletteEntry {
                sentence: "rgba(255,130,170,0.25)",
                word: "rgba(255,110,150,0.5)",
                line: "#ff6e96",
            },
            Self::Orange => PaletteEntry {
                sentence: "rgba(255,180,80,0.25)",
                word: "rgba(255,160,50,0.5)",
                line: "#ffa032",
            },
        }
    }
}

// ── Presets ────────────────────────────────────────────────────────

/// A named rate/pitch combination.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Preset {
    pub id: &'static str,
    pub label: &'static str,
    pub rate: f32,
    pub pitch: f32,
}

pub const PRESETS: [Preset; 4] = [
    Preset {
        id: "natural",
        label: "Natural",
        rate: 1.0,
        pitch: 1.0,
    },
    Preset {
        id: "clear",
        label: "Clear",
        rate: 0.9,
        pitch: 1.05,
    },
    Preset {
        id: "fast",
        label: "Fast Study",
        rate: 1.4,
        pitch: 1.0,
    },
    Preset {
        id: "slow",
        label: "Slow & Steady",
        rate: 0.7,
        pitch: 0.95,
    },
];

/// Look up a preset by id.
#[must_use]
pub fn preset(id: &str) -> Option<&'static Preset> {
    PRESETS.iter().find(|p| p.id == id)
}

// ── Config ─────────────────────────────────────────────────────────

/// Narration session configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NarrationConfig {
    /// Speaking rate multiplier, [0.5, 2.0].
    pub rate: f32,

    /// Pitch multiplier, [0.5, 2.0].
    pub pitch: f32,

    /// Output volume, [0, 1].
    pub volume: f32,

    /// Selected voice id; selecting a voice may switch engines.
    pub voice: Option<String>,

    /// Engine to select at init when usable, ahead of priority order.
    pub prefer_engine: Option<String>,

    /// Last applied preset id, informational.
    pub preset: Option<String>,

    pub highlight_style: HighlightStyle,
    pub highlight_color: HighlightColor,
    pub highlight_granularity: HighlightGranularity,

    /// Quiet period between two applied live reconfigurations.
    #[serde(with = "duration_ms")]
    pub reconfigure_throttle: Duration,

    /// Consecutive non-transient errors that force a stop.
    pub max_consecutive_errors: u32,

    /// Engine error codes that skip the item without counting.
    pub transient_error_codes: Vec<String>,

    /// How many times `play` waits for the section to become ready.
    pub ready_retry_attempts: u32,

    /// Backoff for the first readiness retry; later retries wait
    /// `base * attempt`.
    #[serde(with = "duration_ms")]
    pub ready_retry_backoff: Duration,

    /// Rendering frame interval for coalesced highlight work.
    #[serde(with = "duration_ms")]
    pub frame_interval: Duration,

    /// Upper bound on items materialized for one section.
    pub max_queue_items: usize,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
            voice: None,
            prefer_engine: None,
            preset: None,
            highlight_style: HighlightStyle::default(),
            highlight_color: HighlightColor::default(),
            highlight_granularity: HighlightGranularity::default(),
            reconfigure_throttle: DEFAULT_RECONFIGURE_THROTTLE,
            max_consecutive_errors: DEFAULT_MAX_CONSECUTIVE_ERRORS,
            transient_error_codes: vec![
                "interrupted".to_string(),
                "canceled".to_string(),
                "audio-busy".to_string(),
            ],
            ready_retry_attempts: 3,
            ready_retry_backoff: Duration::from_millis(300),
            frame_interval: DEFAULT_FRAME_INTERVAL,
            max_queue_items: DEFAULT_MAX_QUEUE_ITEMS,
        }
    }
}

/// Clamp a rate into range; non-finite input falls back to 1.0.
#[must_use]
pub fn clamp_rate(rate: f32) -> f32 {
    clamp_or_default(rate, RATE_MIN, RATE_MAX, 1.0)
}

#[must_use]
pub fn clamp_pitch(pitch: f32) -> f32 {
    clamp_or_default(pitch, PITCH_MIN, PITCH_MAX, 1.0)
}

#[must_use]
pub fn clamp_volume(volume: f32) -> f32 {
    clamp_or_default(volume, VOLUME_MIN, VOLUME_MAX, 1.0)
}

fn clamp_or_default(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}

/// Validate a configuration loaded from storage.
pub fn validate_config(config: &NarrationConfig) -> Result<(), ConfigError> {
    check_range("rate", config.rate, RATE_MIN, RATE_MAX)?;
    check_range("pitch", config.pitch, PITCH_MIN, PITCH_MAX)?;
    check_range("volume", config.volume, VOLUME_MIN, VOLUME_MAX)?;

    if let Some(ref id) = config.preset {
        if preset(id).is_none() {
            return Err(ConfigError::UnknownPreset(id.clone()));
        }
    }
    if config.max_consecutive_errors == 0 {
        return Err(ConfigError::Zero("maxConsecutiveErrors"));
    }
    if config.frame_interval.is_zero() {
        return Err(ConfigError::Zero("frameInterval"));
    }
    if config.max_queue_items == 0 {
        return Err(ConfigError::Zero("maxQueueItems"));
    }
    Ok(())
}

fn check_range(field: &'static str, value: f32, min: f32, max: f32) -> Result<(), ConfigError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            min,
            max,
            value,
        })
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::cast_possible_truncation)]
    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = NarrationConfig::default();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.reconfigure_throttle, Duration::from_millis(3000));
        assert_eq!(config.max_consecutive_errors, 3);
    }

    #[test]
    fn out_of_range_rate_is_rejected() {
        let config = NarrationConfig {
            rate: 3.0,
            ..NarrationConfig::default()
        };
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::OutOfRange { field: "rate", .. })
        ));
    }

    #[test]
    fn unknown_preset_is_rejected() {
        let config = NarrationConfig {
            preset: Some("turbo".to_string()),
            ..NarrationConfig::default()
        };
        assert_eq!(
            validate_config(&config),
            Err(ConfigError::UnknownPreset("turbo".to_string()))
        );
    }

    #[test]
    fn clamping() {
        assert!((clamp_rate(5.0) - 2.0).abs() < f32::EPSILON);
        assert!((clamp_rate(0.1) - 0.5).abs() < f32::EPSILON);
        assert!((clamp_rate(f32::NAN) - 1.0).abs() < f32::EPSILON);
        assert!((clamp_volume(-1.0)).abs() < f32::EPSILON);
    }

    #[test]
    fn presets_resolve() {
        let fast = preset("fast").unwrap();
        assert!((fast.rate - 1.4).abs() < f32::EPSILON);
        assert!(preset("nope").is_none());
    }

    #[test]
    fn config_round_trips_through_json_with_partial_input() {
        let json = r#"{"rate":1.5,"highlightStyle":"enlarge","reconfigureThrottle":1000}"#;
        let config: NarrationConfig = serde_json::from_str(json).unwrap();
        assert!((config.rate - 1.5).abs() < f32::EPSILON);
        assert_eq!(config.highlight_style, HighlightStyle::Enlarge);
        assert_eq!(config.reconfigure_throttle, Duration::from_millis(1000));
        assert_eq!(config.max_consecutive_errors, 3);
    }

    #[test]
    fn granularity_flags() {
        assert!(HighlightGranularity::Both.includes_sentence());
        assert!(HighlightGranularity::Both.includes_word());
        assert!(!HighlightGranularity::Sentence.includes_word());
        assert!(!HighlightGranularity::Word.includes_sentence());
    }
}
