use serde::{Deserialize, Serialize};

/// Position of an edit within a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Line number (1-indexed)
    pub line: usize,
}

impl Position {
    pub fn new(line: usize) -> Self {
        Self { line }
    }
}

/// Convert a byte offset in `content` to the line it falls on
///
/// A newline belongs to the line it ends. Offsets at or past the end of
/// the content map to the line after the last line break, which is the
/// append position for text ending in a newline.
pub fn byte_to_position(content: &str, byte_offset: usize) -> Position {
    let end = byte_offset.min(content.len());
    let breaks = content.as_bytes()[..end]
        .iter()
        .filter(|&&b| b == b'\n')
        .count();
    Position::new(breaks + 1)
}

/// Half-open range of lines `[start, end)`, 1-indexed
///
/// An empty range (`start == end`) marks an insertion point: the
/// new lines land before line `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LineRange {
    /// First line covered (inclusive)
    pub start: usize,
    /// Line after the last covered line (exclusive)
    pub end: usize,
}

impl LineRange {
    /// Build a range covering `count` lines starting at `start`
    pub fn new(start: usize, count: usize) -> Self {
        Self {
            start,
            end: start.saturating_add(count),
        }
    }

    /// Number of lines covered
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Check whether two ranges touch the same lines
    ///
    /// Ranges conflict when they intersect, or when they share a start
    /// line. The second rule catches two inserts at the same point and an
    /// insert placed right before a deleted or replaced block, where the
    /// final order of lines would otherwise be ambiguous.
    pub fn conflicts_with(&self, other: &LineRange) -> bool {
        self.start == other.start || (self.start < other.end && other.start < self.end)
    }

    /// Check whether the range fits a document of `line_count` lines
    ///
    /// Valid line numbers for an edit are `1..=line_count + 1`; the extra
    /// slot allows appending after the last line.
    pub fn fits(&self, line_count: usize) -> bool {
        self.start >= 1 && self.end <= line_count + 1 && self.start <= line_count + 1
    }

    /// Zero-indexed slice bounds into a line vector
    pub fn to_indices(&self) -> std::ops::Range<usize> {
        (self.start - 1)..(self.end - 1)
    }
}

impl std::fmt::Display for LineRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            write!(f, "before line {}", self.start)
        } else {
            write!(f, "lines {}..{}", self.start, self.end)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_len_and_indices() {
        let range = LineRange::new(2, 3);

        assert_eq!(range.len(), 3);
        assert_eq!(range.end, 5);
        assert_eq!(range.to_indices(), 1..4);
    }

    #[test]
    fn test_byte_to_position() {
        let content = "hello\nworld\n";

        assert_eq!(byte_to_position(content, 0), Position::new(1));
        assert_eq!(byte_to_position(content, 5), Position::new(1));
        assert_eq!(byte_to_position(content, 6), Position::new(2));
        assert_eq!(byte_to_position(content, 12), Position::new(3));
        assert_eq!(byte_to_position(content, 100), Position::new(3));
        assert_eq!(byte_to_position("", 0), Position::new(1));
    }

    #[test]
    fn test_overlapping_ranges_conflict() {
        let a = LineRange::new(2, 2);
        let b = LineRange::new(3, 1);

        assert!(a.conflicts_with(&b));
        assert!(b.conflicts_with(&a));
    }

    #[test]
    fn test_adjacent_ranges_do_not_conflict() {
        let a = LineRange::new(1, 2);
        let b = LineRange::new(3, 1);

        assert!(!a.conflicts_with(&b));
        // insert right after a replaced block
        assert!(!a.conflicts_with(&LineRange::new(3, 0)));
    }

    #[test]
    fn test_insert_points() {
        let insert = LineRange::new(2, 0);

        assert!(insert.is_empty());
        assert!(insert.conflicts_with(&LineRange::new(2, 0)));
        assert!(insert.conflicts_with(&LineRange::new(2, 3)));
        // insert inside a deleted block
        assert!(insert.conflicts_with(&LineRange::new(1, 3)));
    }

    #[test]
    fn test_fits() {
        assert!(LineRange::new(3, 0).fits(2));
        assert!(LineRange::new(1, 2).fits(2));
        assert!(!LineRange::new(2, 2).fits(2));
        assert!(!LineRange::new(4, 0).fits(2));
        assert!(!LineRange::new(0, 0).fits(2));
        assert!(LineRange::new(1, 0).fits(0));
    }

    #[test]
    fn test_display() {
        assert_eq!(LineRange::new(3, 0).to_string(), "before line 3");
        assert_eq!(LineRange::new(3, 2).to_string(), "lines 3..5");
    }
}
