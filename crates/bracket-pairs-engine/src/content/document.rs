use std::borrow::Cow;
use std::ops::Range;

use xi_rope::{Delta, LinesMetric, Rope};

use crate::content::ContentAccessor;
use crate::position::Position;

/// Text document backed by an `xi_rope::Rope`.
///
/// Cloning is cheap (the rope shares its nodes), which makes a clone a
/// suitable immutable snapshot for background parsing.
#[derive(Clone)]
pub struct TextDocument {
    buffer: Rope,
    version: u64,
    tab_size: u32,
}

impl TextDocument {
    pub fn new(text: &str) -> Self {
        Self {
            buffer: Rope::from(text),
            version: 0,
            tab_size: 4,
        }
    }

    /// Create a new document from raw bytes, which must be valid UTF-8.
    pub fn from_bytes(bytes: &[u8]) -> anyhow::Result<Self> {
        let text = std::str::from_utf8(bytes)?;
        Ok(Self::new(text))
    }

    #[must_use]
    pub fn with_tab_size(mut self, tab_size: u32) -> Self {
        self.tab_size = tab_size.max(1);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.buffer.to_string().into_bytes()
    }

    /// Byte range of `line` without its line break.
    fn line_range(&self, line: u32) -> Range<usize> {
        let line = line as usize;
        let line_count = self.buffer.measure::<LinesMetric>() + 1;
        if line >= line_count {
            return self.len()..self.len();
        }
        let start = self.buffer.offset_of_line(line);
        if line + 1 == line_count {
            return start..self.len();
        }
        let mut end = self.buffer.offset_of_line(line + 1) - 1;
        if self.buffer.slice_to_cow(start..end).ends_with('\r') {
            end -= 1;
        }
        start..end
    }

    /// Byte offset of `position`, clamped to its line.
    #[must_use]
    pub fn offset_of(&self, position: Position) -> usize {
        let last = self.line_count().saturating_sub(1);
        let range = self.line_range(position.line.min(last));
        (range.start + position.column as usize).min(range.end)
    }

    #[must_use]
    pub fn position_of(&self, offset: usize) -> Position {
        let offset = offset.min(self.len());
        let line = self.buffer.line_of_offset(offset);
        let range = self.line_range(line as u32);
        Position::new(line as u32, (offset.min(range.end) - range.start) as u32)
    }

    /// Replaces the text between two positions and bumps the version.
    /// Returns the replaced byte range.
    pub fn replace(&mut self, start: Position, end: Position, text: &str) -> Range<usize> {
        let range = self.offset_of(start)..self.offset_of(end);
        self.replace_range(range.clone(), text);
        range
    }

    pub fn replace_range(&mut self, range: Range<usize>, text: &str) {
        let len = self.len();
        let range = range.start.min(len)..range.end.min(len);
        let delta = Delta::simple_edit(range, Rope::from(text), len);
        self.buffer = delta.apply(&self.buffer);
        self.version += 1;
    }
}

impl ContentAccessor for TextDocument {
    fn line_count(&self) -> u32 {
        (self.buffer.measure::<LinesMetric>() + 1) as u32
    }

    fn column_count(&self, line: u32) -> u32 {
        self.line_range(line).len() as u32
    }

    fn line(&self, line: u32) -> Cow<'_, str> {
        self.buffer.slice_to_cow(self.line_range(line))
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn tab_size(&self) -> u32 {
        self.tab_size
    }

    fn text(&self) -> String {
        self.buffer.to_string()
    }

    fn offset_at(&self, position: Position) -> usize {
        self.offset_of(position)
    }

    fn position_at(&self, offset: usize) -> Position {
        self.position_of(offset)
    }
}

impl std::fmt::Debug for TextDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextDocument")
            .field("len", &self.len())
            .field("version", &self.version)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn lines_exclude_line_breaks() {
        let doc = TextDocument::new("ab\r\ncd\n\nef");
        assert_eq!(doc.line_count(), 4);
        let lines: Vec<_> = (0..4).map(|l| doc.line(l).into_owned()).collect();
        assert_eq!(lines, vec!["ab", "cd", "", "ef"]);
        assert_eq!(doc.column_count(0), 2);
    }

    #[test]
    fn trailing_newline_adds_empty_line() {
        let doc = TextDocument::new("x\n");
        assert_eq!(doc.line_count(), 2);
        assert_eq!(doc.line(1), "");
    }

    #[test]
    fn from_bytes_rejects_invalid_utf8() {
        assert!(TextDocument::from_bytes(&[0xff, 0xfe]).is_err());
        assert_eq!(TextDocument::from_bytes(b"ok").unwrap().to_bytes(), b"ok");
    }

    #[test]
    fn replace_edits_and_bumps_version() {
        let mut doc = TextDocument::new("foo(bar)\nbaz");
        let range = doc.replace(Position::new(0, 4), Position::new(0, 7), "x\ny");
        assert_eq!(range, 4..7);
        assert_eq!(doc.text(), "foo(x\ny)\nbaz");
        assert_eq!(doc.version(), 1);
    }

    #[test]
    fn offsets_and_positions_agree_with_crlf() {
        let doc = TextDocument::new("ab\r\ncd");
        assert_eq!(doc.offset_at(Position::new(1, 1)), 5);
        assert_eq!(doc.position_at(5), Position::new(1, 1));
        // Inside the \r\n clamps to the end of the line.
        assert_eq!(doc.position_at(3), Position::new(0, 2));
        assert_eq!(doc.offset_at(Position::new(0, 10)), 2);
    }
}
