//! Engine and voice descriptors.

use serde::{Deserialize, Serialize};

/// Identifier of a registered speech engine (e.g. `"neural"`, `"system"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EngineId(pub String);

impl EngineId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EngineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EngineId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Optional behaviours an engine may support.
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineCapabilities {
    /// `pause()` actually suspends audio; without it pause is cancel + remember.
    pub true_pause: bool,
    /// `preload()` / `prepare_next()` do background synthesis.
    pub prefetch: bool,
    /// `speak_gapless()` chains into the previous utterance without silence.
    pub gapless: bool,
}

/// Registry view of one engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineDescriptor {
    pub id: EngineId,
    /// Set by the health probe during init.
    pub usable: bool,
    pub capabilities: EngineCapabilities,
}

/// Voice gender, when the engine reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VoiceGender {
    Female,
    Male,
}

/// Information about a voice offered by an engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceInfo {
    /// Voice identifier, unique within its engine.
    pub id: String,

    /// Human-readable display name.
    pub name: String,

    /// BCP 47 language tag (e.g. `"en-US"`).
    pub language: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<VoiceGender>,

    /// Engine offering this voice; filled in by the registry when aggregating.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<EngineId>,
}

/// Convenience constructor for [`VoiceInfo`].
pub fn voice_info(id: &str, name: &str, language: &str) -> VoiceInfo {
    VoiceInfo {
        id: id.to_string(),
        name: name.to_string(),
        language: language.to_string(),
        gender: None,
        engine: None,
    }
}
