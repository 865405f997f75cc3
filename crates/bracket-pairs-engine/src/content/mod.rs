//! Document content as seen by the bracket engine.
//!
//! The engine never owns text. It reads lines through [`ContentAccessor`],
//! optionally narrowed by a per-line classification stream ([`TokenSpans`]),
//! and takes immutable [`ContentSnapshot`]s from a [`ContentSnapshotProvider`]
//! whenever it reparses.
//!
//! ## Modules
//!
//! - [`document`] - rope backed text document
//! - [`spans`] - classified span streams
//! - [`shared`] - a lockable document that hands out snapshots

pub mod document;
pub mod shared;
pub mod spans;

use std::borrow::Cow;
use std::sync::Arc;

use crate::position::Position;

pub use document::TextDocument;
pub use shared::SharedDocument;
pub use spans::{ClassifiedSpan, PlainSpans, SpanKind, SpanTable, TokenSpans};

/// Line oriented read access to a document.
pub trait ContentAccessor: Send + Sync {
    fn line_count(&self) -> u32;

    /// Length of `line` in bytes, excluding the line break.
    fn column_count(&self, line: u32) -> u32;

    /// Text of `line` without its line break.
    fn line(&self, line: u32) -> Cow<'_, str>;

    /// Increases on every modification.
    fn version(&self) -> u64;

    fn tab_size(&self) -> u32 {
        4
    }

    /// The whole document with lines joined by `\n`.
    fn text(&self) -> String {
        let mut text = String::new();
        for line in 0..self.line_count() {
            if line > 0 {
                text.push('\n');
            }
            text.push_str(&self.line(line));
        }
        text
    }

    /// Byte offset of `position`, clamped to the document.
    fn offset_at(&self, position: Position) -> usize {
        let line = position.line.min(self.line_count().saturating_sub(1));
        let preceding: usize = (0..line).map(|l| self.column_count(l) as usize + 1).sum();
        preceding + position.column.min(self.column_count(line)) as usize
    }

    /// Position of byte `offset`, clamped to the document.
    fn position_at(&self, offset: usize) -> Position {
        let mut remaining = offset;
        let last = self.line_count().saturating_sub(1);
        for line in 0..last {
            let len = self.column_count(line) as usize;
            if remaining <= len {
                return Position::new(line, remaining as u32);
            }
            remaining -= len + 1;
        }
        Position::new(last, remaining.min(self.column_count(last) as usize) as u32)
    }

    /// The position after the last character.
    fn end_position(&self) -> Position {
        let last = self.line_count().saturating_sub(1);
        Position::new(last, self.column_count(last))
    }
}

/// Content together with its classification at one point in time.
#[derive(Clone)]
pub struct ContentSnapshot {
    pub content: Arc<dyn ContentAccessor>,
    pub spans: Option<Arc<dyn TokenSpans>>,
}

impl ContentSnapshot {
    pub fn new(content: Arc<dyn ContentAccessor>) -> Self {
        Self { content, spans: None }
    }

    #[must_use]
    pub fn with_spans(mut self, spans: Arc<dyn TokenSpans>) -> Self {
        self.spans = Some(spans);
        self
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.content.version()
    }
}

/// Source of content snapshots for a bracket tree.
pub trait ContentSnapshotProvider: Send + Sync {
    /// `None` if no content is available yet.
    fn snapshot(&self) -> Option<ContentSnapshot>;

    /// Version of the live content. Cheaper than taking a snapshot.
    fn version(&self) -> Option<u64>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    struct Lines(Vec<&'static str>);

    impl ContentAccessor for Lines {
        fn line_count(&self) -> u32 {
            self.0.len() as u32
        }
        fn column_count(&self, line: u32) -> u32 {
            self.0[line as usize].len() as u32
        }
        fn line(&self, line: u32) -> Cow<'_, str> {
            Cow::Borrowed(self.0[line as usize])
        }
        fn version(&self) -> u64 {
            0
        }
    }

    #[test]
    fn default_text_joins_lines() {
        let lines = Lines(vec!["ab", "", "cde"]);
        assert_eq!(lines.text(), "ab\n\ncde");
    }

    #[test]
    fn default_offsets_round_trip() {
        let lines = Lines(vec!["ab", "", "cde"]);
        assert_eq!(lines.offset_at(Position::new(2, 1)), 5);
        assert_eq!(lines.position_at(5), Position::new(2, 1));
        assert_eq!(lines.position_at(3), Position::new(1, 0));
        assert_eq!(lines.offset_at(Position::new(9, 9)), 7);
        assert_eq!(lines.end_position(), Position::new(2, 3));
    }
}
