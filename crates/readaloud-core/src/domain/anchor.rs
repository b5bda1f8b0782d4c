//! Handles into the host document.

use serde::{Deserialize, Serialize};

/// Opaque reference into the host document.
///
/// Only the host rendering surface knows what the handle points at; the
/// narration core merely carries it from the block iterator to the
/// highlight surface. A handle is valid for the section it was snapshotted
/// from and must not be used after the section changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnchorRef(pub u64);

/// Identity of a document section, as reported by the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SectionKey(pub String);

impl SectionKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }
}

impl std::fmt::Display for SectionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Position descriptor for progress persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Locator {
    /// Section the position belongs to.
    pub section: SectionKey,
    /// Host-specific position string (CFI, page reference, offset).
    pub position: String,
    /// Fraction of the whole document read, when the host can compute it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fraction: Option<f64>,
}
