//! Per-line lexical classification consumed by the classified tokenizer.
//!
//! A span starts at a column and runs until the next span on the same line
//! (or the end of the line). Only [`SpanKind::Other`] spans are searched for
//! brackets, so brackets inside strings and comments are ignored.

use std::borrow::Cow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpanKind {
    /// Plain code that may contain brackets.
    Other,
    Comment,
    String,
    RegExp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifiedSpan {
    pub column: u32,
    pub kind: SpanKind,
}

impl ClassifiedSpan {
    #[must_use]
    pub const fn new(column: u32, kind: SpanKind) -> Self {
        Self { column, kind }
    }
}

/// Source of classified spans. Spans on a line are sorted by column.
pub trait TokenSpans: Send + Sync {
    fn spans_on_line(&self, line: u32) -> Cow<'_, [ClassifiedSpan]>;
}

pub(crate) static PLAIN_LINE: [ClassifiedSpan; 1] = [ClassifiedSpan::new(0, SpanKind::Other)];

/// Classifies every line as plain code.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainSpans;

impl TokenSpans for PlainSpans {
    fn spans_on_line(&self, _line: u32) -> Cow<'_, [ClassifiedSpan]> {
        Cow::Borrowed(&PLAIN_LINE)
    }
}

/// Spans stored per line. Lines without an entry are plain code.
#[derive(Debug, Clone, Default)]
pub struct SpanTable {
    lines: Vec<Vec<ClassifiedSpan>>,
}

impl SpanTable {
    pub fn new(lines: Vec<Vec<ClassifiedSpan>>) -> Self {
        Self { lines }
    }

    /// Marks `[start, end)` on `line` as `kind`, splitting existing spans.
    pub fn mark(&mut self, line: u32, start: u32, end: u32, kind: SpanKind) {
        let idx = line as usize;
        if self.lines.len() <= idx {
            self.lines.resize_with(idx + 1, Vec::new);
        }
        let spans = &mut self.lines[idx];
        if spans.is_empty() {
            spans.push(ClassifiedSpan::new(0, SpanKind::Other));
        }
        let kind_at = |spans: &[ClassifiedSpan], column: u32| {
            spans
                .iter()
                .take_while(|s| s.column <= column)
                .last()
                .map_or(SpanKind::Other, |s| s.kind)
        };
        let resume = kind_at(spans.as_slice(), end);
        spans.retain(|s| s.column < start || s.column > end);
        let at = spans.partition_point(|s| s.column < start);
        spans.insert(at, ClassifiedSpan::new(start, kind));
        if spans.get(at + 1).is_none_or(|s| s.column != end) {
            spans.insert(at + 1, ClassifiedSpan::new(end, resume));
        }
    }
}

impl TokenSpans for SpanTable {
    fn spans_on_line(&self, line: u32) -> Cow<'_, [ClassifiedSpan]> {
        match self.lines.get(line as usize) {
            Some(spans) if !spans.is_empty() => Cow::Borrowed(spans),
            _ => Cow::Borrowed(&PLAIN_LINE),
        }
    }
}
