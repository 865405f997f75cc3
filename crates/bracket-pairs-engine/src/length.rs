//! Line/column lengths packed into a single `u64`.
//!
//! A [`Length`] is the distance between two positions in a document, measured
//! as a number of line breaks plus the column count on the last line. Packing
//! the pair as `line << 32 | column` makes lengths compare as plain integers,
//! which the parser and the query tree rely on for cheap offset comparisons.

use std::fmt;
use std::ops::{Add, AddAssign};

use crate::position::{Position, TextRange};

/// A `(line_count, column_count)` pair. Columns are UTF-8 byte columns.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Length(u64);

impl Length {
    pub const ZERO: Length = Length(0);

    #[must_use]
    pub const fn new(line_count: u32, column_count: u32) -> Self {
        Length(((line_count as u64) << 32) | column_count as u64)
    }

    #[must_use]
    pub const fn line_count(self) -> u32 {
        (self.0 >> 32) as u32
    }

    #[must_use]
    pub const fn column_count(self) -> u32 {
        self.0 as u32
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// The distance from `(start_line, start_column)` to `(end_line, end_column)`.
    ///
    /// On the same line this is the column difference; across lines the
    /// column is the end column.
    #[must_use]
    pub fn between(start_line: u32, start_column: u32, end_line: u32, end_column: u32) -> Self {
        if start_line == end_line {
            Length::new(0, end_column.saturating_sub(start_column))
        } else {
            Length::new(end_line.saturating_sub(start_line), end_column)
        }
    }

    /// Returns `d` such that `self + d == other`, or [`Length::ZERO`] if
    /// `other <= self`.
    #[must_use]
    pub fn diff_non_negative(self, other: Length) -> Length {
        if other <= self {
            return Length::ZERO;
        }
        let (l1, c1) = (self.line_count(), self.column_count());
        let (l2, c2) = (other.line_count(), other.column_count());
        if l1 == l2 {
            Length::new(0, c2 - c1)
        } else {
            Length::new(l2 - l1, c2)
        }
    }

    /// Length of `text`. Line breaks are `\n` and `\r\n`; a lone `\r` is content.
    #[must_use]
    pub fn of_str(text: &str) -> Self {
        let mut lines = 0u32;
        let mut last_line_start = 0usize;
        for (idx, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                lines += 1;
                last_line_start = idx + 1;
            }
        }
        Length::new(lines, (text.len() - last_line_start) as u32)
    }

    #[must_use]
    pub fn to_position(self) -> Position {
        Position::new(self.line_count(), self.column_count())
    }

    /// The range from `self` to `end`, both interpreted as absolute offsets.
    #[must_use]
    pub fn to_range(self, end: Length) -> TextRange {
        TextRange::new(self.to_position(), end.to_position())
    }
}

impl From<Position> for Length {
    fn from(position: Position) -> Self {
        Length::new(position.line, position.column)
    }
}

impl Add for Length {
    type Output = Length;

    fn add(self, rhs: Length) -> Length {
        if rhs.line_count() > 0 {
            Length::new(self.line_count() + rhs.line_count(), rhs.column_count())
        } else {
            Length::new(self.line_count(), self.column_count() + rhs.column_count())
        }
    }
}

impl AddAssign for Length {
    fn add_assign(&mut self, rhs: Length) {
        *self = *self + rhs;
    }
}

impl fmt::Debug for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line_count(), self.column_count())
    }
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Sums an iterator of lengths left to right.
pub fn sum_lengths<I: IntoIterator<Item = Length>>(lengths: I) -> Length {
    lengths.into_iter().fold(Length::ZERO, |acc, l| acc + l)
}
