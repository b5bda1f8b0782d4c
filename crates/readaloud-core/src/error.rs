//! Error taxonomy for narration.
//!
//! Public session operations never return these to callers; they are
//! recorded in the snapshot (`lastError` / `lastDiag`) and logged. Internal
//! helpers use them with `?` for early exits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Stable error codes surfaced to observers.
pub mod codes {
    pub const NO_USABLE_ENGINE: &str = "no_usable_engine";
    pub const MAX_ERRORS_REACHED: &str = "max_errors_reached";
    pub const SECTION_NOT_READY: &str = "section_not_ready";
    pub const QUEUE_BUILD_FAILED: &str = "queue_build_failed";
    pub const NAVIGATION_EXHAUSTED: &str = "navigation_exhausted";
    pub const ENGINE_FALLBACK: &str = "engine_fallback";
    pub const PROBE_FAILED: &str = "probe_failed";
    pub const DESTROYED: &str = "destroyed";
}

/// Errors that can occur while narrating a document.
#[derive(Debug, Clone, thiserror::Error)]
pub enum NarrationError {
    /// No engine passed its health probe.
    #[error("No usable speech engine")]
    NoUsableEngine,

    /// A known-recoverable synthesis error; the item is skipped.
    #[error("Transient synthesis error: {0}")]
    TransientSynthesis(SynthesisFailure),

    /// Any other synthesis error; counted towards the consecutive limit.
    #[error("Speech synthesis failed: {0}")]
    Synthesis(SynthesisFailure),

    /// Too many consecutive synthesis errors; playback was force-stopped.
    #[error("Stopped after {count} consecutive synthesis errors")]
    MaxErrorsReached { count: u32 },

    /// There is no further section to read.
    #[error("No further section to narrate")]
    NavigationExhausted,

    /// The section iterator failed part way; the queue was truncated.
    #[error("Queue build stopped early after {built} items: {source}")]
    QueueBuild { built: usize, source: DocumentError },

    /// The host document was never ready to provide blocks.
    #[error("Document section not ready after {attempts} attempts")]
    SectionNotReady { attempts: u32 },

    /// The session was torn down while an operation was in flight.
    #[error("Narration session destroyed")]
    Destroyed,
}

impl NarrationError {
    /// Stable machine-readable code for this error.
    #[must_use]
    pub fn code(&self) -> String {
        match self {
            Self::NoUsableEngine => codes::NO_USABLE_ENGINE.to_string(),
            Self::TransientSynthesis(f) | Self::Synthesis(f) => f.code.clone(),
            Self::MaxErrorsReached { .. } => codes::MAX_ERRORS_REACHED.to_string(),
            Self::NavigationExhausted => codes::NAVIGATION_EXHAUSTED.to_string(),
            Self::QueueBuild { .. } => codes::QUEUE_BUILD_FAILED.to_string(),
            Self::SectionNotReady { .. } => codes::SECTION_NOT_READY.to_string(),
            Self::Destroyed => codes::DESTROYED.to_string(),
        }
    }

    /// Convert into the observer-facing error record.
    #[must_use]
    pub fn to_info(&self) -> ErrorInfo {
        ErrorInfo::new(self.code(), self.to_string())
    }
}

/// Error payload reported by a speech engine through its error callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisFailure {
    /// Engine error code (e.g. `"interrupted"`, `"network"`).
    pub code: String,
    /// Free-form detail for diagnostics.
    #[serde(default)]
    pub detail: String,
}

impl SynthesisFailure {
    pub fn new(code: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            detail: detail.into(),
        }
    }

    /// Whether the code is in the given transient list.
    #[must_use]
    pub fn is_transient(&self, transient_codes: &[String]) -> bool {
        transient_codes.iter().any(|c| c.eq_ignore_ascii_case(&self.code))
    }
}

impl std::fmt::Display for SynthesisFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.detail.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{} ({})", self.code, self.detail)
        }
    }
}

/// Errors raised by the host's block iterator.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentError {
    /// The iterator failed while producing a block.
    #[error("Block iteration failed: {0}")]
    Iteration(String),
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be within [{min}, {max}], got {value}")]
    OutOfRange {
        field: &'static str,
        min: f32,
        max: f32,
        value: f32,
    },

    #[error("Unknown preset: {0}")]
    UnknownPreset(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Last error as exposed in snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorInfo {
    pub code: String,
    pub detail: String,
    pub at: DateTime<Utc>,
}

impl ErrorInfo {
    pub fn new(code: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            detail: detail.into(),
            at: Utc::now(),
        }
    }
}

/// Last diagnostic as exposed in snapshots.
///
/// Diagnostics are informational (probe results, fallbacks, terminal
/// stops); they do not by themselves change playback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub code: String,
    pub detail: String,
    pub at: DateTime<Utc>,
}

impl Diagnostic {
    pub fn new(code: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            detail: detail.into(),
            at: Utc::now(),
        }
    }
}
