//! Narration markup parsing.
//!
//! A block's narration markup is plain text interleaved with inline tags.
//! `<mark name="..."/>` elements are zero-width markers that align engine
//! boundary offsets with document anchors; every other tag is dropped.
//!
//! Offsets are counted in Unicode scalar values (`char`s) of the emitted
//! plain text, the same unit engines use for boundary events.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Entities are only recognised when the `;` is this close to the `&`.
const MAX_ENTITY_LEN: usize = 10;

static MARK_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^mark\s+name\s*=\s*["']([^"']*)["']"#).expect("mark tag pattern is valid")
});

/// A named zero-width offset into an item's plain text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mark {
    pub name: String,
    /// Offset in chars into the plain text.
    pub offset: usize,
}

impl Mark {
    pub fn new(name: impl Into<String>, offset: usize) -> Self {
        Self {
            name: name.into(),
            offset,
        }
    }
}

/// Result of [`parse_markup`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedMarkup {
    pub plain_text: String,
    /// Marks in document order; offsets are non-decreasing.
    pub marks: Vec<Mark>,
}

/// Strip markup into plain text, recording mark offsets.
///
/// Never fails: an unterminated trailing tag ends parsing and whatever was
/// emitted so far is returned.
#[must_use]
pub fn parse_markup(markup: &str) -> ParsedMarkup {
    let mut plain = String::with_capacity(markup.len());
    let mut plain_chars = 0usize;
    let mut marks = Vec::new();

    let mut rest = markup;
    while let Some(c) = rest.chars().next() {
        match c {
            '<' => {
                let Some(close) = rest.find('>') else {
                    break;
                };
                let tag = &rest[1..close];
                if let Some(name) = MARK_TAG.captures(tag).and_then(|caps| caps.get(1)) {
                    marks.push(Mark::new(name.as_str(), plain_chars));
                }
                rest = &rest[close + 1..];
            }
            '&' => {
                let (decoded, consumed) = decode_entity(rest);
                plain_chars += decoded.chars().count();
                plain.push_str(decoded);
                rest = &rest[consumed..];
            }
            _ => {
                plain.push(c);
                plain_chars += 1;
                rest = &rest[c.len_utf8()..];
            }
        }
    }

    ParsedMarkup {
        plain_text: plain,
        marks,
    }
}

/// Decode an entity at the start of `s` (which begins with `&`).
///
/// Returns the text to emit and the number of bytes consumed. Unknown
/// entities are emitted verbatim; a lone `&` is emitted as itself.
fn decode_entity(s: &str) -> (&str, usize) {
    let Some(semi) = s.find(';').filter(|&i| i > 1 && i < MAX_ENTITY_LEN) else {
        return ("&", 1);
    };
    let decoded = match &s[1..semi] {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "apos" => "'",
        "quot" => "\"",
        _ => &s[..=semi],
    };
    (decoded, semi + 1)
}

/// Name of the last mark at or before `char_index`.
///
/// Some engines report a boundary at 0 before the first mark; when no mark
/// qualifies the first mark is returned instead. `None` only when `marks`
/// is empty.
#[must_use]
pub fn find_nearest_mark(marks: &[Mark], char_index: usize) -> Option<&str> {
    let first = marks.first()?;
    let best = marks
        .iter()
        .take_while(|m| m.offset <= char_index)
        .last()
        .unwrap_or(first);
    Some(best.name.as_str())
}
