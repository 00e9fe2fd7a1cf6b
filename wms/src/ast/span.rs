//! Source location tracking

use serde::{Deserialize, Serialize};

/// A byte range in the source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

impl From<Span> for std::ops::Range<usize> {
    fn from(span: Span) -> Self {
        span.start..span.end
    }
}

impl From<std::ops::Range<usize>> for Span {
    fn from(range: std::ops::Range<usize>) -> Self {
        Span::new(range.start, range.end)
    }
}

/// Maps byte offsets to 1-based line/column pairs.
///
/// Statements only remember their line, so the index also answers the reverse
/// question (which byte range a line covers) for diagnostics.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offset where each line starts
    starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(source.match_indices('\n').map(|(i, _)| i + 1));
        LineIndex {
            starts,
            len: source.len(),
        }
    }

    /// 1-based line containing `offset`
    pub fn line(&self, offset: usize) -> u32 {
        let idx = match self.starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        (idx + 1) as u32
    }

    /// 1-based (line, column) of `offset`; columns count bytes
    pub fn line_col(&self, offset: usize) -> (u32, u32) {
        let line = self.line(offset);
        let start = self.starts[(line - 1) as usize];
        (line, (offset - start + 1) as u32)
    }

    /// Byte range of a 1-based line, without its newline
    pub fn line_span(&self, line: u32) -> Option<Span> {
        let idx = (line as usize).checked_sub(1)?;
        let start = *self.starts.get(idx)?;
        let end = match self.starts.get(idx + 1) {
            Some(next) => next - 1,
            None => self.len,
        };
        Some(Span::new(start, end.max(start)))
    }

    pub fn line_count(&self) -> usize {
        self.starts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_merge() {
        let a = Span::new(10, 20);
        let b = Span::new(0, 5);
        assert_eq!(a.merge(b), Span::new(0, 20));
    }

    #[test]
    fn test_span_display() {
        assert_eq!(format!("{}", Span::new(42, 99)), "42..99");
    }

    #[test]
    fn test_span_to_range() {
        let range: std::ops::Range<usize> = Span::new(5, 15).into();
        assert_eq!(range, 5..15);
    }

    #[test]
    fn test_line_col_first_line() {
        let index = LineIndex::new("abc\ndef");
        assert_eq!(index.line_col(0), (1, 1));
        assert_eq!(index.line_col(2), (1, 3));
    }

    #[test]
    fn test_line_col_after_newline() {
        let index = LineIndex::new("abc\ndef\n\nx");
        assert_eq!(index.line_col(4), (2, 1));
        assert_eq!(index.line_col(6), (2, 3));
        assert_eq!(index.line(8), 3);
        assert_eq!(index.line_col(9), (4, 1));
        assert_eq!(index.line_count(), 4);
    }

    #[test]
    fn test_line_span() {
        let index = LineIndex::new("abc\ndef\n");
        assert_eq!(index.line_span(1), Some(Span::new(0, 3)));
        assert_eq!(index.line_span(2), Some(Span::new(4, 7)));
        assert_eq!(index.line_span(3), Some(Span::new(8, 8)));
        assert_eq!(index.line_span(0), None);
        assert_eq!(index.line_span(9), None);
    }
}
