//! Playback queue: one section's blocks, parsed and materialized up front.
//!
//! The section's block iterator is stateful and single-pass, so the builder
//! drives it to exhaustion once and keeps everything needed to speak and
//! highlight each block. Random-access seek, backward stepping and
//! look-ahead prefetch then work on plain indices.

use std::collections::HashMap;

use super::anchor::{AnchorRef, SectionKey};
use super::marks::{Mark, find_nearest_mark, parse_markup};
use crate::error::NarrationError;
use crate::ports::BlockSource;

/// Speaking rate baseline used for remaining-time estimates.
pub const WORDS_PER_MINUTE: f64 = 150.0;

/// One block, ready to speak.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    /// Plain text handed to the engine.
    pub text: String,
    /// Original narration markup.
    pub markup: String,
    /// Marks in offset order.
    pub marks: Vec<Mark>,
    /// Mark name → anchor, snapshotted when the block was emitted.
    pub anchors: HashMap<String, AnchorRef>,
}

impl QueueItem {
    /// Parse `markup` into an item, attaching the anchor snapshot.
    #[must_use]
    pub fn from_markup(markup: String, anchors: HashMap<String, AnchorRef>) -> Self {
        let parsed = parse_markup(&markup);
        Self {
            text: parsed.plain_text,
            markup,
            marks: parsed.marks,
            anchors,
        }
    }

    /// Anchor of the nearest mark at or before `char_index`.
    #[must_use]
    pub fn anchor_at(&self, char_index: usize) -> Option<AnchorRef> {
        find_nearest_mark(&self.marks, char_index).and_then(|name| self.anchors.get(name).copied())
    }

    /// Anchor representing the block as a whole (its first mark).
    #[must_use]
    pub fn block_anchor(&self) -> Option<AnchorRef> {
        self.marks
            .iter()
            .find_map(|m| self.anchors.get(&m.name).copied())
            .or_else(|| self.anchors.values().min_by_key(|a| a.0).copied())
    }

    /// Every anchor of the item, in mark order.
    pub fn anchors_in_order(&self) -> impl Iterator<Item = AnchorRef> + '_ {
        self.marks.iter().filter_map(|m| self.anchors.get(&m.name).copied())
    }

    #[must_use]
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    #[must_use]
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// The materialized queue for one section.
#[derive(Debug, Clone, Default)]
pub struct PlaybackQueue {
    section: Option<SectionKey>,
    items: Vec<QueueItem>,
}

impl PlaybackQueue {
    #[must_use]
    pub const fn new(section: Option<SectionKey>, items: Vec<QueueItem>) -> Self {
        Self { section, items }
    }

    #[must_use]
    pub const fn section(&self) -> Option<&SectionKey> {
        self.section.as_ref()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&QueueItem> {
        self.items.get(index)
    }

    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    /// Clamp a signed target into `[0, len - 1]`; `None` for an empty queue.
    #[must_use]
    pub fn clamp_index(&self, target: i64) -> Option<usize> {
        let last = self.items.len().checked_sub(1)?;
        let last = i64::try_from(last).unwrap_or(i64::MAX);
        usize::try_from(target.clamp(0, last)).ok()
    }

    /// First item at or after `from` whose text contains `needle`, ignoring case.
    #[must_use]
    pub fn find_text(&self, needle: &str, from: usize) -> Option<usize> {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        self.items
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, item)| item.text.to_lowercase().contains(&needle))
            .map(|(i, _)| i)
    }

    /// Words in items after `index` (the current item excluded).
    #[must_use]
    pub fn words_after(&self, index: usize) -> usize {
        self.items.iter().skip(index + 1).map(QueueItem::word_count).sum()
    }
}

/// Outcome of driving a section's block iterator.
#[derive(Debug)]
pub struct QueueBuild {
    pub queue: PlaybackQueue,
    /// Set when iteration failed part way; `queue` holds what was built.
    pub error: Option<NarrationError>,
}

/// Drive `source` to exhaustion exactly once and materialize its blocks.
///
/// Anchors are snapshotted right after each block is emitted, before the
/// iterator moves on. Whitespace-only blocks are dropped since they produce
/// no speech. On iterator failure the items built so far are kept.
pub fn build_queue<S: BlockSource + ?Sized>(
    source: &mut S,
    section: Option<SectionKey>,
    max_items: usize,
) -> QueueBuild {
    let mut items = Vec::new();
    let mut error = None;

    let mut block = source.start();
    loop {
        match block {
            Ok(Some(markup)) => {
                let anchors = source.snapshot_ranges();
                let item = QueueItem::from_markup(markup, anchors);
                if !item.text.trim().is_empty() {
                    items.push(item);
                }
                if items.len() >= max_items {
                    tracing::warn!(max_items, "Section exceeds queue limit, truncating");
                    break;
                }
            }
            Ok(None) => break,
            Err(source_err) => {
                tracing::warn!(
                    built = items.len(),
                    error = %source_err,
                    "Block iteration failed, keeping partial queue"
                );
                error = Some(NarrationError::QueueBuild {
                    built: items.len(),
                    source: source_err,
                });
                break;
            }
        }
        block = source.next();
    }

    tracing::debug!(items = items.len(), section = ?section, "Built playback queue");

    QueueBuild {
        queue: PlaybackQueue::new(section, items),
        error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DocumentError;
    use crate::ports::MockBlockSource;

    fn anchors(pairs: &[(&str, u64)]) -> HashMap<String, AnchorRef> {
        pairs
            .iter()
            .map(|(name, id)| ((*name).to_string(), AnchorRef(*id)))
            .collect()
    }

    #[test]
    fn builds_items_with_snapshotted_anchors() {
        let mut source = MockBlockSource::new();
        source
            .expect_start()
            .times(1)
            .returning(|| Ok(Some(r#"<mark name="0"/>Hello world."#.to_string())));
        let mut emitted = vec![
            Ok(None),
            Ok(Some(r#"<mark name="1"/>Second sentence here."#.to_string())),
        ];
        source.expect_next().times(2).returning(move || emitted.pop().unwrap());
        let mut snapshots = vec![anchors(&[("1", 20)]), anchors(&[("0", 10)])];
        source
            .expect_snapshot_ranges()
            .times(2)
            .returning(move || snapshots.pop().unwrap());

        let build = build_queue(&mut source, Some(SectionKey::new("ch1")), 100);

        assert!(build.error.is_none());
        let queue = build.queue;
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.get(0).unwrap().text, "Hello world.");
        assert_eq!(queue.get(0).unwrap().anchor_at(0), Some(AnchorRef(10)));
        assert_eq!(queue.get(1).unwrap().anchor_at(3), Some(AnchorRef(20)));
        assert_eq!(queue.section(), Some(&SectionKey::new("ch1")));
    }

    #[test]
    fn iterator_failure_keeps_partial_queue() {
        let mut source = MockBlockSource::new();
        source
            .expect_start()
            .returning(|| Ok(Some("First.".to_string())));
        source
            .expect_next()
            .times(1)
            .returning(|| Err(DocumentError::Iteration("detached node".to_string())));
        source.expect_snapshot_ranges().returning(HashMap::new);

        let build = build_queue(&mut source, None, 100);

        assert_eq!(build.queue.len(), 1);
        assert!(matches!(
            build.error,
            Some(NarrationError::QueueBuild { built: 1, .. })
        ));
    }

    #[test]
    fn whitespace_blocks_are_dropped() {
        let mut source = MockBlockSource::new();
        source.expect_start().returning(|| Ok(Some("<p> </p>".to_string())));
        let mut emitted = vec![Ok(None), Ok(Some("Real text.".to_string()))];
        source.expect_next().returning(move || emitted.pop().unwrap());
        source.expect_snapshot_ranges().returning(HashMap::new);

        let build = build_queue(&mut source, None, 100);
        assert_eq!(build.queue.len(), 1);
        assert_eq!(build.queue.get(0).unwrap().text, "Real text.");
    }

    #[test]
    fn queue_limit_truncates() {
        let mut source = MockBlockSource::new();
        source.expect_start().returning(|| Ok(Some("a".to_string())));
        source.expect_next().returning(|| Ok(Some("b".to_string())));
        source.expect_snapshot_ranges().returning(HashMap::new);

        let build = build_queue(&mut source, None, 5);
        assert_eq!(build.queue.len(), 5);
    }

    #[test]
    fn clamp_and_find() {
        let items = ["Hello world.", "Second sentence here.", "Done."]
            .iter()
            .map(|t| QueueItem::from_markup((*t).to_string(), HashMap::new()))
            .collect();
        let queue = PlaybackQueue::new(None, items);

        assert_eq!(queue.clamp_index(-4), Some(0));
        assert_eq!(queue.clamp_index(9), Some(2));
        assert_eq!(queue.find_text("SENTENCE", 0), Some(1));
        assert_eq!(queue.find_text("hello", 1), None);
        assert_eq!(queue.words_after(0), 4);
        assert_eq!(PlaybackQueue::default().clamp_index(0), None);
    }

    #[test]
    fn block_anchor_prefers_first_mark() {
        let item = QueueItem::from_markup(
            r#"<mark name="a"/>One <mark name="b"/>two"#.to_string(),
            anchors(&[("b", 1), ("a", 7)]),
        );
        assert_eq!(item.block_anchor(), Some(AnchorRef(7)));
        assert_eq!(item.anchors_in_order().collect::<Vec<_>>(), vec![AnchorRef(7), AnchorRef(1)]);
    }
}
