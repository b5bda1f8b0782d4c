//! Highlight coordinator.
//!
//! Turns anchors into sentence and word highlights on the host surface.
//! Boundary events can arrive many times per frame, so they only record the
//! latest anchor; [`HighlightCoordinator::flush_frame`] paints it once per
//! rendering frame.

use readaloud_core::{
    AnchorRef, HighlightColor, HighlightGranularity, HighlightKind, HighlightPaint,
    HighlightStyle, HighlightSurface,
};
use tracing::trace;

pub struct HighlightCoordinator {
    surface: Box<dyn HighlightSurface>,
    style: HighlightStyle,
    color: HighlightColor,
    granularity: HighlightGranularity,
    /// Latest anchor scheduled since the last frame.
    pending: Option<AnchorRef>,
    /// Region painted on each layer.
    sentence: Option<AnchorRef>,
    word: Option<AnchorRef>,
    /// Whether the surface currently holds an enlarge wrap.
    enlarged: bool,
}

impl HighlightCoordinator {
    pub fn new(
        surface: Box<dyn HighlightSurface>,
        style: HighlightStyle,
        color: HighlightColor,
        granularity: HighlightGranularity,
    ) -> Self {
        Self {
            surface,
            style,
            color,
            granularity,
            pending: None,
            sentence: None,
            word: None,
            enlarged: false,
        }
    }

    /// Record `anchor` to be painted on the next frame. Replaces anything
    /// already scheduled.
    pub const fn schedule(&mut self, anchor: AnchorRef) {
        self.pending = Some(anchor);
    }

    #[must_use]
    pub const fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Paint the scheduled anchor, if any. Returns whether anything was
    /// painted.
    pub fn flush_frame(&mut self) -> bool {
        match self.pending.take() {
            Some(anchor) => {
                self.apply_anchor_highlight(anchor);
                true
            }
            None => false,
        }
    }

    /// Paint `anchor` now, at the configured granularity, and scroll to it
    /// if the surface says it is not adequately visible.
    pub fn apply_anchor_highlight(&mut self, anchor: AnchorRef) {
        self.revert_enlarge();

        if self.granularity.includes_sentence() {
            let container = self.surface.block_container(anchor).unwrap_or(anchor);
            if self.sentence != Some(container) {
                self.paint(container, HighlightKind::Sentence);
            }
        }
        if self.granularity.includes_word() {
            self.paint_word(anchor);
        }

        if !self.surface.is_adequately_visible(anchor) {
            self.surface.scroll_into_view(anchor);
        }
        trace!(anchor = anchor.0, "Applied highlight");
    }

    /// Remove both layers and any enlarge wrap. Safe to call repeatedly.
    pub fn clear_all(&mut self) {
        self.pending = None;
        self.revert_enlarge();
        self.surface.clear_highlight(HighlightKind::Sentence);
        self.surface.clear_highlight(HighlightKind::Word);
        self.sentence = None;
        self.word = None;
    }

    /// Drop references into a section that is being replaced.
    ///
    /// Anchors from the old section must not reach the surface again, so
    /// scheduled work is discarded and the enlarge wrap is reverted; the
    /// painted layers are replaced by the first highlight in the new
    /// section.
    pub fn forget_section(&mut self) {
        self.pending = None;
        self.revert_enlarge();
        self.sentence = None;
        self.word = None;
    }

    pub fn set_style(&mut self, style: HighlightStyle) {
        if self.style != style {
            self.style = style;
            self.restyle();
        }
    }

    pub fn set_color(&mut self, color: HighlightColor) {
        if self.color != color {
            self.color = color;
            self.restyle();
        }
    }

    pub fn set_granularity(&mut self, granularity: HighlightGranularity) {
        self.granularity = granularity;
        if !granularity.includes_sentence() && self.sentence.take().is_some() {
            self.surface.clear_highlight(HighlightKind::Sentence);
        }
        if !granularity.includes_word() && self.word.is_some() {
            self.revert_enlarge();
            self.surface.clear_highlight(HighlightKind::Word);
            self.word = None;
        }
    }

    #[must_use]
    pub fn first_visible_block(&self) -> Option<usize> {
        self.surface.first_visible_block()
    }

    #[must_use]
    pub const fn style(&self) -> HighlightStyle {
        self.style
    }

    #[must_use]
    pub const fn color(&self) -> HighlightColor {
        self.color
    }

    /// Redraw whatever is painted with the current style and color.
    fn restyle(&mut self) {
        if let Some(sentence) = self.sentence {
            self.paint(sentence, HighlightKind::Sentence);
        }
        if let Some(word) = self.word {
            self.revert_enlarge();
            self.paint_word(word);
        }
    }

    fn paint_word(&mut self, anchor: AnchorRef) {
        if self.style == HighlightStyle::Enlarge {
            self.surface.clear_highlight(HighlightKind::Word);
            if self.surface.wrap_enlarged(anchor) {
                self.enlarged = true;
                self.word = Some(anchor);
                return;
            }
            // Range could not be wrapped; fall back to a fill.
        }
        self.paint(anchor, HighlightKind::Word);
    }

    fn paint(&mut self, anchor: AnchorRef, kind: HighlightKind) {
        let paint = HighlightPaint::resolve(self.style, self.color, kind);
        self.surface.clear_highlight(kind);
        self.surface.apply_highlight(anchor, kind, &paint);
        match kind {
            HighlightKind::Sentence => self.sentence = Some(anchor),
            HighlightKind::Word => self.word = Some(anchor),
        }
    }

    fn revert_enlarge(&mut self) {
        if self.enlarged {
            self.surface.unwrap_enlarged();
            self.enlarged = false;
        }
    }
}

impl std::fmt::Debug for HighlightCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HighlightCoordinator")
            .field("style", &self.style)
            .field("color", &self.color)
            .field("granularity", &self.granularity)
            .field("sentence", &self.sentence)
            .field("word", &self.word)
            .field("enlarged", &self.enlarged)
            .finish_non_exhaustive()
    }
}
