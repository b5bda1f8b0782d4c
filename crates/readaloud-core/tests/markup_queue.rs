//! Integration tests for markup parsing and queue building.
//!
//! A scripted block source stands in for the host document; it snapshots
//! anchors per emitted block the way a real iterator does, and invalidates
//! them as soon as it advances.

use std::collections::HashMap;

use readaloud_core::{
    AnchorRef, BlockSource, DocumentError, NarrationError, SectionKey, build_queue, parse_markup,
};

// ── Scripted document ──────────────────────────────────────────────

struct ScriptedSource {
    blocks: Vec<String>,
    cursor: Option<usize>,
    fail_at: Option<usize>,
    next_anchor: u64,
    current: HashMap<String, AnchorRef>,
    starts: usize,
}

impl ScriptedSource {
    fn new(blocks: &[&str]) -> Self {
        Self {
            blocks: blocks.iter().map(|b| (*b).to_string()).collect(),
            cursor: None,
            fail_at: None,
            next_anchor: 100,
            current: HashMap::new(),
            starts: 0,
        }
    }

    fn failing_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    fn emit(&mut self, index: usize) -> Result<Option<String>, DocumentError> {
        self.current.clear();
        if self.fail_at == Some(index) {
            return Err(DocumentError::Iteration("node detached".to_string()));
        }
        self.cursor = Some(index);
        let Some(block) = self.blocks.get(index).cloned() else {
            return Ok(None);
        };
        for mark in parse_markup(&block).marks {
            self.next_anchor += 1;
            self.current.insert(mark.name, AnchorRef(self.next_anchor));
        }
        Ok(Some(block))
    }
}

impl BlockSource for ScriptedSource {
    fn start(&mut self) -> Result<Option<String>, DocumentError> {
        self.starts += 1;
        self.emit(0)
    }

    fn next(&mut self) -> Result<Option<String>, DocumentError> {
        let index = self.cursor.map_or(0, |c| c + 1);
        self.emit(index)
    }

    fn snapshot_ranges(&self) -> HashMap<String, AnchorRef> {
        self.current.clone()
    }
}

// ── Tests ──────────────────────────────────────────────────────────

#[test]
fn three_block_section_builds_in_order() {
    let mut source = ScriptedSource::new(&[
        r#"<mark name="s0"/>Hello world."#,
        r#"<mark name="s1"/>Second <b>sentence</b> here."#,
        r#"<mark name="s2"/>Done &amp; dusted."#,
    ]);

    let build = build_queue(&mut source, Some(SectionKey::new("chapter-1")), 100);

    assert!(build.error.is_none());
    let queue = build.queue;
    assert_eq!(queue.len(), 3);
    assert_eq!(source.starts, 1);

    let texts: Vec<_> = queue.items().iter().map(|i| i.text.as_str()).collect();
    assert_eq!(texts, vec!["Hello world.", "Second sentence here.", "Done & dusted."]);

    // Anchors were captured per block, before the iterator moved on.
    assert_eq!(queue.get(0).unwrap().anchor_at(7), Some(AnchorRef(101)));
    assert_eq!(queue.get(1).unwrap().anchor_at(0), Some(AnchorRef(102)));
    assert_eq!(queue.get(2).unwrap().block_anchor(), Some(AnchorRef(103)));
}

#[test]
fn boundary_offsets_map_to_nearest_preceding_mark() {
    let mut source = ScriptedSource::new(&[
        r#"<mark name="w0"/>One <mark name="w1"/>two <mark name="w2"/>three"#,
    ]);
    let queue = build_queue(&mut source, None, 100).queue;
    let item = queue.get(0).unwrap();

    assert_eq!(item.text, "One two three");
    assert_eq!(item.anchor_at(0), Some(AnchorRef(101)));
    assert_eq!(item.anchor_at(5), Some(AnchorRef(102)));
    assert_eq!(item.anchor_at(8), Some(AnchorRef(103)));
    assert_eq!(item.anchor_at(40), Some(AnchorRef(103)));
}

#[test]
fn failure_mid_section_keeps_earlier_blocks() {
    let mut source = ScriptedSource::new(&["First.", "Second.", "Third."]).failing_at(2);

    let build = build_queue(&mut source, None, 100);

    assert_eq!(build.queue.len(), 2);
    let err = build.error.expect("iteration error is reported");
    assert!(matches!(err, NarrationError::QueueBuild { built: 2, .. }));
    assert_eq!(err.code(), "queue_build_failed");
}

#[test]
fn empty_section_builds_empty_queue() {
    let mut source = ScriptedSource::new(&[]);
    let build = build_queue(&mut source, None, 100);
    assert!(build.queue.is_empty());
    assert!(build.error.is_none());
}

#[test]
fn blocks_without_marks_have_no_anchor() {
    let mut source = ScriptedSource::new(&["Plain paragraph."]);
    let queue = build_queue(&mut source, None, 100).queue;
    let item = queue.get(0).unwrap();
    assert_eq!(item.anchor_at(3), None);
    assert_eq!(item.block_anchor(), None);
}
