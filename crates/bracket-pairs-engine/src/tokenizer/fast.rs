use crate::brackets::tokens::BracketTokens;
use crate::length::Length;
use crate::tokenizer::{Token, Tokenizer};

/// Tokenizes a whole string up front with one regex pass.
///
/// Has no notion of strings or comments, so every literal counts.
pub struct FastTokenizer {
    tokens: Vec<Token>,
    idx: usize,
    offset: Length,
    length: Length,
}

impl FastTokenizer {
    pub fn new(text: &str, brackets: &BracketTokens) -> Self {
        let mut tokens = Vec::new();
        let mut line_count = 0u32;
        let mut last_line_break = 0usize;
        let mut last_token_end = 0usize;
        let mut last_token_end_line = 0u32;

        let text_token = |end: usize, line_count: u32, last_line_break: usize, from: usize, from_line: u32| {
            let length = if from_line == line_count {
                Length::new(0, (end - from) as u32)
            } else {
                Length::new(line_count - from_line, (end - last_line_break) as u32)
            };
            Token::text(length)
        };

        for found in brackets.scan_regex().find_iter(text) {
            let value = found.as_str();
            if value == "\n" || value == "\r\n" {
                line_count += 1;
                last_line_break = found.end();
                continue;
            }
            // Case folding can change byte length; such matches stay text.
            let Some(token) = brackets
                .token(value)
                .filter(|token| token.length.column_count() as usize == value.len())
            else {
                continue;
            };
            if last_token_end != found.start() {
                tokens.push(text_token(
                    found.start(),
                    line_count,
                    last_line_break,
                    last_token_end,
                    last_token_end_line,
                ));
            }
            tokens.push(token.clone());
            last_token_end = found.end();
            last_token_end_line = line_count;
        }

        if last_token_end != text.len() {
            tokens.push(text_token(
                text.len(),
                line_count,
                last_line_break,
                last_token_end,
                last_token_end_line,
            ));
        }

        Self {
            tokens,
            idx: 0,
            offset: Length::ZERO,
            length: Length::new(line_count, (text.len() - last_line_break) as u32),
        }
    }
}

impl Tokenizer for FastTokenizer {
    fn offset(&self) -> Length {
        self.offset
    }

    fn length(&self) -> Length {
        self.length
    }

    fn read(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.idx)?.clone();
        self.idx += 1;
        self.offset += token.length;
        Some(token)
    }

    fn peek(&mut self) -> Option<&Token> {
        self.tokens.get(self.idx)
    }

    fn skip(&mut self, _length: Length) {
        panic!("FastTokenizer cannot skip: it is only used without a previous tree");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brackets::{BracketsConfiguration, RawBracketsConfiguration};
    use crate::tokenizer::{TokenKind, read_all};
    use pretty_assertions::assert_eq;

    fn brackets() -> BracketTokens {
        let raw = RawBracketsConfiguration::new([("(", ")"), ("[", "]"), ("begin", "end")]);
        BracketTokens::new(&BracketsConfiguration::new(&raw)).unwrap()
    }

    fn describe(text: &str) -> Vec<String> {
        let mut tokenizer = FastTokenizer::new(text, &brackets());
        read_all(&mut tokenizer)
            .into_iter()
            .map(|t| format!("{:?} {:?}", t.kind, t.length))
            .collect()
    }

    #[test]
    fn splits_brackets_and_text() {
        assert_eq!(
            describe("a(b[c]d)e"),
            vec![
                "Text 0:1",
                "OpeningBracket 0:1",
                "Text 0:1",
                "OpeningBracket 0:1",
                "Text 0:1",
                "ClosingBracket 0:1",
                "Text 0:1",
                "ClosingBracket 0:1",
                "Text 0:1",
            ]
        );
    }

    #[test]
    fn text_spanning_lines_ends_at_the_next_token_column() {
        assert_eq!(
            describe("(ab\r\n  cd)\n"),
            vec!["OpeningBracket 0:1", "Text 1:4", "ClosingBracket 0:1", "Text 1:0"]
        );
    }

    #[test]
    fn word_brackets_need_word_boundaries() {
        assert_eq!(
            describe("begin appended END"),
            vec!["OpeningBracket 0:5", "Text 0:10", "ClosingBracket 0:3"]
        );
    }

    #[test]
    fn length_and_offset_track_the_whole_text() {
        let mut tokenizer = FastTokenizer::new("x\n(y)\nzz", &brackets());
        assert_eq!(tokenizer.length(), Length::new(2, 2));
        assert_eq!(tokenizer.peek().map(|t| t.kind), Some(TokenKind::Text));
        tokenizer.read();
        assert_eq!(tokenizer.offset(), Length::new(1, 0));
        while tokenizer.read().is_some() {}
        assert_eq!(tokenizer.offset(), tokenizer.length());
    }

    #[test]
    fn empty_text_has_no_tokens() {
        assert!(describe("").is_empty());
    }
}
