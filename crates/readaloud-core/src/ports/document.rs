//! Document integration port: what the host reader exposes to narration.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::domain::{AnchorRef, Locator, SectionKey};
use crate::error::DocumentError;

/// Single-pass iterator over the blocks of the active section.
///
/// `start` rewinds to the first block; `next` advances. Both return the
/// block's narration markup, or `None` when the section is exhausted.
#[cfg_attr(test, mockall::automock)]
pub trait BlockSource: Send {
    fn start(&mut self) -> Result<Option<String>, DocumentError>;

    fn next(&mut self) -> Result<Option<String>, DocumentError>;

    /// Mark name → anchor for the block just emitted. Only valid until the
    /// iterator moves again, which is why callers snapshot immediately.
    fn snapshot_ranges(&self) -> HashMap<String, AnchorRef>;
}

/// The host document: a block source for the active section plus
/// navigation between sections.
#[async_trait]
pub trait DocumentIntegration: BlockSource + Sync {
    /// Key of the section currently laid out, or `None` while the host is
    /// not ready to iterate it yet.
    fn active_section(&self) -> Option<SectionKey>;

    /// Position descriptor for the current reading position.
    async fn locator(&self) -> Option<Locator>;

    /// Switch to the next section. Returns `false` at the end of the
    /// document. On `true` the block source iterates the new section.
    async fn advance_section(&mut self) -> bool;
}
