//! Partition rich text into formatting-homogeneous runs.
//!
//! Span offsets arrive in UTF-16 code units. Boundaries that fall inside a
//! surrogate pair are snapped forward to the next character boundary.

use crossrelay_traits::{FormattingSpan, RichText};

/// A maximal slice of text covered by the same set of spans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub text: String,
    /// Covering spans, outermost first
    pub spans: Vec<FormattingSpan>,
}

impl Run {
    /// Machine-readable token that must be emitted verbatim.
    pub fn is_protected(&self) -> bool {
        self.spans.iter().any(|span| span.kind.is_protected())
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// UTF-16 offset -> byte offset for every char boundary, ending with the text length.
fn char_boundaries(text: &str) -> Vec<(usize, usize)> {
    let mut boundaries = Vec::with_capacity(text.len() + 1);
    let mut utf16 = 0;
    for (byte, ch) in text.char_indices() {
        boundaries.push((utf16, byte));
        utf16 += ch.len_utf16();
    }
    boundaries.push((utf16, text.len()));
    boundaries
}

/// Snap a UTF-16 offset to the first char boundary at or after it.
fn snap(boundaries: &[(usize, usize)], utf16: usize) -> (usize, usize) {
    let idx = boundaries.partition_point(|(pos, _)| *pos < utf16);
    boundaries
        .get(idx)
        .copied()
        .unwrap_or_else(|| boundaries[boundaries.len() - 1])
}

pub fn partition(rich: &RichText) -> Vec<Run> {
    let text = rich.text.as_str();
    if text.is_empty() {
        return Vec::new();
    }

    let boundaries = char_boundaries(text);
    let total = boundaries[boundaries.len() - 1].0;

    let spans: Vec<&FormattingSpan> = rich
        .spans
        .iter()
        .filter(|span| span.length > 0 && span.offset < total)
        .collect();

    let mut cuts: Vec<(usize, usize)> = vec![(0, 0), (total, text.len())];
    for span in &spans {
        cuts.push(snap(&boundaries, span.offset));
        cuts.push(snap(&boundaries, span.end().min(total)));
    }
    cuts.sort_unstable();
    cuts.dedup_by_key(|(_, byte)| *byte);

    let mut runs = Vec::with_capacity(cuts.len());
    for window in cuts.windows(2) {
        let (start16, start_byte) = window[0];
        let (end16, end_byte) = window[1];
        if start_byte == end_byte {
            continue;
        }

        let mut covering: Vec<(usize, &FormattingSpan)> = spans
            .iter()
            .enumerate()
            .filter(|(_, span)| span.offset <= start16 && span.end() >= end16)
            .map(|(idx, span)| (idx, *span))
            .collect();
        covering.sort_by(|(ia, a), (ib, b)| {
            a.offset
                .cmp(&b.offset)
                .then(b.length.cmp(&a.length))
                .then(ia.cmp(ib))
        });

        runs.push(Run {
            text: text[start_byte..end_byte].to_string(),
            spans: covering.into_iter().map(|(_, span)| span.clone()).collect(),
        });
    }
    runs
}
