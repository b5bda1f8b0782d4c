//! Highlight surface port: how narration paints the host document.

use serde::{Deserialize, Serialize};

use crate::domain::AnchorRef;
use crate::settings::{HighlightColor, HighlightStyle};

/// Which of the two highlight layers a paint call targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HighlightKind {
    Sentence,
    Word,
}

/// Decoration for one highlight layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaintDecoration {
    /// Background fill.
    Fill,
    Underline,
    Squiggly,
    Strikethrough,
    /// Inline element scaled up around the word.
    Enlarge,
}

/// Fully resolved appearance of one highlight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HighlightPaint {
    pub decoration: PaintDecoration,
    /// CSS color.
    pub color: &'static str,
    /// Stroke width in px for line decorations, 0 for fills.
    pub width: u8,
}

impl HighlightPaint {
    /// Resolve the paint for a layer from the user's style and color.
    ///
    /// Sentence highlights always use a fill or a line; enlarging only
    /// applies to words, so an enlarged sentence falls back to a fill.
    #[must_use]
    pub const fn resolve(
        style: HighlightStyle,
        color: HighlightColor,
        kind: HighlightKind,
    ) -> Self {
        let palette = color.palette();
        let fill = match kind {
            HighlightKind::Sentence => palette.sentence,
            HighlightKind::Word => palette.word,
        };
        let line_width = match kind {
            HighlightKind::Sentence => 2,
            HighlightKind::Word => 3,
        };
        match (style, kind) {
            (HighlightStyle::Plain, _) | (HighlightStyle::Enlarge, HighlightKind::Sentence) => {
                Self {
                    decoration: PaintDecoration::Fill,
                    color: fill,
                    width: 0,
                }
            }
            (HighlightStyle::Enlarge, HighlightKind::Word) => Self {
                decoration: PaintDecoration::Enlarge,
                color: fill,
                width: 0,
            },
            (HighlightStyle::Underline, _) => Self {
                decoration: PaintDecoration::Underline,
                color: palette.line,
                width: line_width,
            },
            (HighlightStyle::Strikethrough, _) => Self {
                decoration: PaintDecoration::Strikethrough,
                color: palette.line,
                width: line_width,
            },
            (HighlightStyle::Squiggly, _) => Self {
                decoration: PaintDecoration::Squiggly,
                color: palette.line,
                width: line_width,
            },
        }
    }
}

/// The host's rendering surface.
///
/// Implementations draw highlights in a layer that does not mutate the
/// document, except for the enlarge wrap, which the coordinator keeps to at
/// most one wrapped word at a time.
pub trait HighlightSurface: Send {
    /// Paint `anchor` on the given layer, replacing that layer's previous
    /// highlight.
    fn apply_highlight(&mut self, anchor: AnchorRef, kind: HighlightKind, paint: &HighlightPaint);

    /// Remove the highlight on one layer. Must be idempotent.
    fn clear_highlight(&mut self, kind: HighlightKind);

    fn scroll_into_view(&mut self, anchor: AnchorRef);

    /// Whether the anchor is on screen enough that no scroll is needed.
    fn is_adequately_visible(&self, anchor: AnchorRef) -> bool;

    /// Anchor of the block container enclosing `anchor`, if distinct.
    fn block_container(&self, anchor: AnchorRef) -> Option<AnchorRef>;

    /// Wrap the word at `anchor` in an enlarged inline element. Returns
    /// `false` when the range cannot be wrapped (e.g. it spans elements).
    fn wrap_enlarged(&mut self, anchor: AnchorRef) -> bool;

    /// Remove the current enlarge wrap, restoring the original nodes.
    fn unwrap_enlarged(&mut self);

    /// Index of the first block at least partly visible, if known.
    fn first_visible_block(&self) -> Option<usize> {
        None
    }
}
