//! Overlapping, boundary-preferring text splitter.
//!
//! Divides a document body into segments of at most `chunk_size` bytes
//! where consecutive segments share roughly `chunk_overlap` bytes, so
//! context spanning a cut is never entirely lost to retrieval. Cuts
//! prefer paragraph breaks (`\n\n`), then line breaks, then sentence
//! ends, then word boundaries, and fall back to a hard cut only when a
//! window contains none of those.
//!
//! Segments carry their byte offsets into the source text. The offsets
//! tile the input: the first segment starts at 0, every later segment
//! starts at most `chunk_overlap` bytes before its predecessor ends,
//! and the last segment ends at the input's end, so the original text
//! can be reconstructed by dropping each segment's overlapping prefix.

use serde::Serialize;

/// Splitter tuning. Sizes are byte counts, snapped to UTF-8 character
/// boundaries so a multi-byte character is never split.
#[derive(Debug, Clone)]
pub struct SplitterConfig {
    /// Soft upper bound on segment length.
    pub chunk_size: usize,
    /// Bytes re-read from the end of the previous segment.
    pub chunk_overlap: usize,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 150,
        }
    }
}

/// One split piece, with byte offsets into the source text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// Split `text` into overlapping segments.
///
/// Empty or whitespace-only input yields no segments. Every segment is
/// at most `chunk_size` bytes (a single character wider than the whole
/// window is passed through rather than broken).
pub fn split_text(text: &str, cfg: &SplitterConfig) -> Vec<Segment> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let size = cfg.chunk_size.max(1);
    let overlap = cfg.chunk_overlap.min(size.saturating_sub(1));
    let len = text.len();

    let mut segments = Vec::new();
    let mut start = 0usize;

    loop {
        if len - start <= size {
            segments.push(make_segment(text, start, len));
            break;
        }

        let mut hard_end = snap_back(text, start + size);
        if hard_end <= start {
            // single character wider than the window; take it whole
            hard_end = snap_forward(text, start + 1);
        }

        // the cut must land past the overlap so the next segment advances
        let floor = snap_forward(text, (start + overlap + 1).min(hard_end));
        let cut = find_cut(text, floor, hard_end);
        segments.push(make_segment(text, start, cut));

        let mut next = snap_back(text, cut.saturating_sub(overlap));
        if next <= start {
            next = cut;
        }
        start = next;
    }

    segments
}

fn make_segment(text: &str, start: usize, end: usize) -> Segment {
    Segment {
        text: text[start..end].to_string(),
        start,
        end,
    }
}

/// Pick the best cut position in `(floor, hard_end]`, preferring the
/// rightmost paragraph break, then line break, then sentence end, then
/// space. The boundary characters stay with the left segment.
fn find_cut(text: &str, floor: usize, hard_end: usize) -> usize {
    if floor >= hard_end {
        return hard_end;
    }
    let window = &text[floor..hard_end];

    if let Some(pos) = window.rfind("\n\n") {
        return floor + pos + 2;
    }
    if let Some(pos) = window.rfind('\n') {
        return floor + pos + 1;
    }
    if let Some(pos) = rfind_sentence_end(window) {
        return floor + pos;
    }
    if let Some(pos) = window.rfind(' ') {
        return floor + pos + 1;
    }
    hard_end
}

/// Byte offset just past the last `". "`/`"! "`/`"? "` in `window`.
fn rfind_sentence_end(window: &str) -> Option<usize> {
    [". ", "! ", "? "]
        .iter()
        .filter_map(|pat| window.rfind(pat))
        .max()
        .map(|pos| pos + 2)
}

fn snap_back(s: &str, mut i: usize) -> usize {
    if i >= s.len() {
        return s.len();
    }
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn snap_forward(s: &str, mut i: usize) -> usize {
    while i < s.len() && !s.is_char_boundary(i) {
        i += 1;
    }
    i
}
