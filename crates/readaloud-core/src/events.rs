//! Narration events and snapshots.
//!
//! # Wire Format
//!
//! Events are serialized with a `type` tag so UI code can switch on them:
//!
//! ```json
//! { "type": "state_changed", "status": "playing", "snapshot": { "blockIdx": 0, ... } }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{EngineId, Locator, PlaybackStatus};
use crate::error::{Diagnostic, ErrorInfo};

/// Record of the last runtime engine fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FallbackInfo {
    pub from: EngineId,
    pub to: EngineId,
    /// Error code that triggered the fallback.
    pub reason: String,
    pub at: DateTime<Utc>,
}

impl FallbackInfo {
    pub fn new(from: EngineId, to: EngineId, reason: impl Into<String>) -> Self {
        Self {
            from,
            to,
            reason: reason.into(),
            at: Utc::now(),
        }
    }
}

/// Point-in-time view of a narration session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NarrationSnapshot {
    pub status: PlaybackStatus,

    /// Text of the current item; empty when idle.
    pub text: String,

    /// Current word span within `text`, in chars.
    pub word_start: usize,
    pub word_end: usize,

    /// Index into the queue, -1 when idle.
    pub block_idx: i64,
    pub block_count: usize,

    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
    pub voice: Option<String>,
    pub preset: Option<String>,

    pub engine_id: Option<EngineId>,
    pub selection_reason: Option<String>,

    pub last_error: Option<ErrorInfo>,
    pub last_diag: Option<Diagnostic>,
    pub fallback_info: Option<FallbackInfo>,

    /// Seconds until the sleep timer stops playback.
    pub sleep_remaining_secs: Option<u64>,

    /// Rough time left in the section at the current rate.
    pub estimated_remaining_secs: Option<u64>,
}

impl Default for NarrationSnapshot {
    fn default() -> Self {
        Self {
            status: PlaybackStatus::Idle,
            text: String::new(),
            word_start: 0,
            word_end: 0,
            block_idx: -1,
            block_count: 0,
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
            voice: None,
            preset: None,
            engine_id: None,
            selection_reason: None,
            last_error: None,
            last_diag: None,
            fallback_info: None,
            sleep_remaining_secs: None,
            estimated_remaining_secs: None,
        }
    }
}

/// Preview of one queue item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentPreview {
    pub index: usize,
    pub text: String,
}

/// Items around the current position, for list UIs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentWindow {
    pub current: i64,
    pub total: usize,
    pub items: Vec<SegmentPreview>,
}

/// Events delivered to narration observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NarrationEvent {
    /// The playback status changed.
    StateChanged {
        status: PlaybackStatus,
        snapshot: NarrationSnapshot,
    },

    /// The spoken word advanced.
    Progress { snapshot: NarrationSnapshot },

    /// The last item of the last section finished.
    DocumentEnd {
        snapshot: NarrationSnapshot,
        #[serde(skip_serializing_if = "Option::is_none")]
        locator: Option<Locator>,
    },
}

impl NarrationEvent {
    #[must_use]
    pub const fn snapshot(&self) -> &NarrationSnapshot {
        match self {
            Self::StateChanged { snapshot, .. }
            | Self::Progress { snapshot }
            | Self::DocumentEnd { snapshot, .. } => snapshot,
        }
    }

    /// Event type name as used in the wire format.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::StateChanged { .. } => "state_changed",
            Self::Progress { .. } => "progress",
            Self::DocumentEnd { .. } => "document_end",
        }
    }
}
