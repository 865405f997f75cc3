use std::borrow::Cow;

use crate::brackets::tokens::BracketTokens;
use crate::content::spans::PLAIN_LINE;
use crate::content::{ClassifiedSpan, ContentAccessor, SpanKind, TokenSpans};
use crate::length::Length;
use crate::tokenizer::{Token, Tokenizer};

// Text tokens are cut after roughly this much scanned content so that reused
// subtrees line up with token boundaries more often.
const LINE_BREAK_WEIGHT: u32 = 33;
const SOFT_TEXT_LIMIT: u32 = 1000;
const HARD_TEXT_LIMIT: u32 = 1500;

/// Tokenizes content line by line, only looking for brackets inside
/// [`SpanKind::Other`] spans.
pub struct ClassifiedTokenizer<'a> {
    reader: LineReader<'a>,
    offset: Length,
    length: Length,
    // `Some(None)` caches a peek that hit the end.
    peeked: Option<Option<Token>>,
}

impl<'a> ClassifiedTokenizer<'a> {
    pub fn new(content: &'a dyn ContentAccessor, spans: &'a dyn TokenSpans, brackets: &'a BracketTokens) -> Self {
        let line_count = content.line_count().max(1);
        let last_line_length = content.column_count(line_count - 1);
        Self {
            reader: LineReader::new(content, spans, brackets, line_count, last_line_length),
            offset: Length::ZERO,
            length: Length::new(line_count - 1, last_line_length),
            peeked: None,
        }
    }
}

impl Tokenizer for ClassifiedTokenizer<'_> {
    fn offset(&self) -> Length {
        self.offset
    }

    fn length(&self) -> Length {
        self.length
    }

    fn read(&mut self) -> Option<Token> {
        let token = match self.peeked.take() {
            Some(token) => token,
            None => self.reader.read(),
        };
        if let Some(token) = &token {
            self.offset += token.length;
        }
        token
    }

    fn peek(&mut self) -> Option<&Token> {
        if self.peeked.is_none() {
            self.peeked = Some(self.reader.read());
        }
        self.peeked.as_ref().and_then(Option::as_ref)
    }

    fn skip(&mut self, length: Length) {
        self.peeked = None;
        self.offset += length;
        self.reader
            .set_position(self.offset.line_count(), self.offset.column_count());
    }
}

struct LineReader<'a> {
    content: &'a dyn ContentAccessor,
    spans: &'a dyn TokenSpans,
    brackets: &'a BracketTokens,
    line_count: u32,
    last_line_length: u32,

    line_idx: u32,
    line: Option<Cow<'a, str>>,
    line_spans: Cow<'a, [ClassifiedSpan]>,
    line_char_offset: u32,
    line_span_offset: usize,

    /// A bracket found while scanning text; returned by the next read.
    pending: Option<Token>,
}

impl<'a> LineReader<'a> {
    fn new(
        content: &'a dyn ContentAccessor,
        spans: &'a dyn TokenSpans,
        brackets: &'a BracketTokens,
        line_count: u32,
        last_line_length: u32,
    ) -> Self {
        Self {
            content,
            spans,
            brackets,
            line_count,
            last_line_length,
            line_idx: 0,
            line: None,
            line_spans: Cow::Borrowed(&[]),
            line_char_offset: 0,
            line_span_offset: 0,
            pending: None,
        }
    }

    fn set_position(&mut self, line: u32, column: u32) {
        if line == self.line_idx {
            self.line_char_offset = column;
            if self.line.is_some() {
                self.line_span_offset = span_index(&self.line_spans, column);
            }
        } else {
            self.line_idx = line;
            self.line_char_offset = column;
            self.line = None;
        }
        self.pending = None;
    }

    fn load_line(&mut self) {
        self.line = Some(self.content.line(self.line_idx));
        let spans = self.spans.spans_on_line(self.line_idx);
        self.line_spans = if spans.is_empty() {
            Cow::Borrowed(&PLAIN_LINE)
        } else {
            spans
        };
    }

    fn line_len(&self) -> u32 {
        self.line.as_ref().map_or(0, |line| line.len() as u32)
    }

    /// Finds the first bracket in `[from, to)` of the current line.
    fn find_bracket(&self, from: u32, to: u32) -> Option<(u32, Token)> {
        let regex = self.brackets.regex()?;
        let haystack = self.line.as_deref()?.get(..to as usize)?;
        haystack.get(from as usize..)?;
        // Searching the whole prefix keeps word boundaries right at `from`.
        let found = regex.find_at(haystack, from as usize)?;
        let token = self
            .brackets
            .token(found.as_str())
            .filter(|token| token.length.column_count() as usize == found.as_str().len())?;
        Some(((found.start() - from as usize) as u32, token.clone()))
    }

    fn read(&mut self) -> Option<Token> {
        if let Some(token) = self.pending.take() {
            self.line_char_offset += token.length.column_count();
            return Some(token);
        }

        let last_line = self.line_count - 1;
        if self.line_idx > last_line
            || (self.line_idx == last_line && self.line_char_offset >= self.last_line_length)
        {
            return None;
        }

        if self.line.is_none() {
            self.load_line();
            self.line_span_offset = span_index(&self.line_spans, self.line_char_offset);
        }

        let start_line = self.line_idx;
        let start_column = self.line_char_offset;
        let mut scanned = 0u32;

        loop {
            if self.line_span_offset < self.line_spans.len() {
                let kind = self.line_spans[self.line_span_offset].kind;
                while self.line_span_offset + 1 < self.line_spans.len()
                    && self.line_spans[self.line_span_offset + 1].kind == kind
                {
                    self.line_span_offset += 1;
                }
                let line_len = self.line_len();
                let end = self
                    .line_spans
                    .get(self.line_span_offset + 1)
                    .map_or(line_len, |next| next.column.min(line_len));

                let found = if kind == SpanKind::Other && self.line_char_offset < end {
                    self.find_bracket(self.line_char_offset, end)
                } else {
                    None
                };

                if let Some((relative_start, token)) = found {
                    self.line_char_offset += relative_start;
                    if start_line != self.line_idx || start_column != self.line_char_offset {
                        // Emit the text before the bracket first.
                        self.pending = Some(token);
                        break;
                    }
                    self.line_char_offset += token.length.column_count();
                    return Some(token);
                }

                scanned += end.saturating_sub(self.line_char_offset);
                self.line_char_offset = self.line_char_offset.max(end);
                self.line_span_offset += 1;
            } else {
                if self.line_idx == last_line {
                    break;
                }
                self.line_idx += 1;
                self.load_line();
                self.line_span_offset = 0;
                self.line_char_offset = 0;

                scanned += LINE_BREAK_WEIGHT;
                if scanned > SOFT_TEXT_LIMIT {
                    break;
                }
            }

            if scanned > HARD_TEXT_LIMIT {
                break;
            }
        }

        let length = Length::between(start_line, start_column, self.line_idx, self.line_char_offset);
        debug_assert!(!length.is_zero(), "text token must make progress");
        Some(Token::text(length))
    }
}

fn span_index(spans: &[ClassifiedSpan], column: u32) -> usize {
    spans.partition_point(|span| span.column <= column).saturating_sub(1)
}
