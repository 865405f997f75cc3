use std::fmt;

/// A 0-based line/column coordinate. Columns are UTF-8 byte offsets within the line.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    #[must_use]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.line, self.column)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A half-open range `[start, end)` of positions.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextRange {
    pub start: Position,
    pub end: Position,
}

impl TextRange {
    #[must_use]
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Returns true if `position` lies in `[start, end)`.
    #[must_use]
    pub fn contains(&self, position: Position) -> bool {
        self.start <= position && position < self.end
    }

    /// Returns true if `position` lies strictly between `start` and `end`.
    #[must_use]
    pub fn strictly_contains(&self, position: Position) -> bool {
        self.start < position && position < self.end
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

impl fmt::Debug for TextRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}..{:?})", self.start, self.end)
    }
}

impl fmt::Display for TextRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positions_order_by_line_then_column() {
        assert!(Position::new(0, 9) < Position::new(1, 0));
        assert!(Position::new(2, 1) < Position::new(2, 3));
    }

    #[test]
    fn range_contains_is_half_open() {
        let range = TextRange::new(Position::new(0, 3), Position::new(0, 4));
        assert!(range.contains(Position::new(0, 3)));
        assert!(!range.contains(Position::new(0, 4)));
        assert!(!range.strictly_contains(Position::new(0, 3)));
    }

    #[test]
    fn debug_format_is_compact() {
        let range = TextRange::new(Position::new(1, 2), Position::new(3, 4));
        assert_eq!(format!("{range:?}"), "[(1,2)..(3,4))");
    }
}
