//! Citation-marker segmentation for chat answers.
//!
//! Answers reference source papers with inline markers of the exact form
//! `[<digits>]`. [`split_citations`] cuts an answer into plain-text and
//! marker segments; concatenating the segments' source text always
//! reproduces the input.
//!
//! ```rust
//! use paperscope_core::citations::{split_citations, Segment};
//!
//! let segs = split_citations("gaps remain [2] and [12a]");
//! assert_eq!(segs[1], Segment::Marker { index: 2, raw: "[2]" });
//! assert_eq!(segs[2], Segment::Text(" and [12a]"));
//! ```

use std::sync::LazyLock;

use regex::Regex;

/// ASCII digits only: `\d` would also match non-ASCII decimal digits.
static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[([0-9]+)\]").unwrap());

/// A piece of an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    Marker { index: u32, raw: &'a str },
}

impl<'a> Segment<'a> {
    /// The exact source text of this segment.
    pub fn as_source(&self) -> &'a str {
        match self {
            Segment::Text(s) => s,
            Segment::Marker { raw, .. } => raw,
        }
    }

    pub fn marker_index(&self) -> Option<u32> {
        match self {
            Segment::Marker { index, .. } => Some(*index),
            Segment::Text(_) => None,
        }
    }
}

/// Split `text` into plain-text and `[n]` marker segments.
///
/// Empty text segments are never emitted. A bracketed number too large
/// for `u32` stays plain text.
pub fn split_citations(text: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut text_start = 0;

    for caps in MARKER_RE.captures_iter(text) {
        let (Some(whole), Some(digits)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let Ok(index) = digits.as_str().parse::<u32>() else {
            continue;
        };
        if whole.start() > text_start {
            segments.push(Segment::Text(&text[text_start..whole.start()]));
        }
        segments.push(Segment::Marker {
            index,
            raw: whole.as_str(),
        });
        text_start = whole.end();
    }

    if text_start < text.len() {
        segments.push(Segment::Text(&text[text_start..]));
    }
    segments
}

/// Concatenate segments back into source text.
pub fn join_segments(segments: &[Segment<'_>]) -> String {
    segments.iter().map(Segment::as_source).collect()
}

/// Distinct marker indices in order of first appearance.
pub fn cited_indices(text: &str) -> Vec<u32> {
    let mut seen = Vec::new();
    for seg in split_citations(text) {
        if let Some(i) = seg.marker_index() {
            if !seen.contains(&i) {
                seen.push(i);
            }
        }
    }
    seen
}
