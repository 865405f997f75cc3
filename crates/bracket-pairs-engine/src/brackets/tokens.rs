use std::collections::HashMap;

use regex::{Regex, RegexBuilder};

use crate::ast::BracketNode;
use crate::brackets::{BracketId, BracketIdSet, BracketKind, BracketsConfiguration};
use crate::error::Result;
use crate::length::Length;
use crate::small_set::DenseKeyProvider;
use crate::tokenizer::{Token, TokenKind};

/// Table from bracket literal to its pre-built token.
///
/// Literals are matched case-insensitively; keys are stored lowercased.
#[derive(Debug, Clone)]
pub struct BracketTokens {
    map: HashMap<String, Token>,
    regex_str: Option<String>,
    regex: Option<Regex>,
    /// Brackets or line breaks, used to scan a whole buffer at once.
    scan_regex: Regex,
    ids: DenseKeyProvider<String>,
}

impl BracketTokens {
    pub fn new(configuration: &BracketsConfiguration) -> Result<Self> {
        let mut ids = DenseKeyProvider::default();
        // Openers first so the common case fits in a set's inline word.
        for kind in configuration.opening_brackets() {
            ids.key_of(&kind.text);
        }
        for kind in configuration.closing_brackets() {
            ids.key_of(&kind.text);
        }

        let mut map = HashMap::new();

        for kind in configuration.opening_brackets() {
            let length = Length::new(0, kind.text.len() as u32);
            let id = BracketId(ids.key_of(&kind.text));
            let bracket_ids = BracketIdSet::single(id);
            let node = BracketNode::new(length, BracketKind::Opening(kind.clone()), bracket_ids.clone());
            map.insert(
                kind.text.to_lowercase(),
                Token {
                    length,
                    kind: TokenKind::OpeningBracket,
                    bracket_id: Some(id),
                    bracket_ids,
                    node,
                },
            );
        }

        for kind in configuration.closing_brackets() {
            let length = Length::new(0, kind.text.len() as u32);
            let bracket_ids = kind
                .opening_texts
                .iter()
                .fold(BracketIdSet::empty(), |set, text| set.add(BracketId(ids.key_of(text))));
            let bracket_id = kind.opening_texts.first().map(|text| BracketId(ids.key_of(text)));
            let node = BracketNode::new(length, BracketKind::Closing(kind.clone()), bracket_ids.clone());
            map.insert(
                kind.text.to_lowercase(),
                Token {
                    length,
                    kind: TokenKind::ClosingBracket,
                    bracket_id,
                    bracket_ids,
                    node,
                },
            );
        }

        let regex_str = if map.is_empty() {
            None
        } else {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            keys.reverse();
            Some(
                keys.into_iter()
                    .map(|k| prepare_bracket_for_regex(k))
                    .collect::<Vec<_>>()
                    .join("|"),
            )
        };
        let regex = regex_str
            .as_deref()
            .map(|pattern| RegexBuilder::new(pattern).case_insensitive(true).build())
            .transpose()?;
        let scan_pattern = match &regex_str {
            Some(brackets) => format!(r"{brackets}|\r\n|\n"),
            None => r"\r\n|\n".to_string(),
        };
        let scan_regex = RegexBuilder::new(&scan_pattern).case_insensitive(true).build()?;

        Ok(Self {
            map,
            regex_str,
            regex,
            scan_regex,
            ids,
        })
    }

    /// The token for a matched literal.
    #[must_use]
    pub fn token(&self, value: &str) -> Option<&Token> {
        self.map
            .get(value)
            .or_else(|| self.map.get(&value.to_lowercase()))
    }

    /// A closing literal that closes any of `opening_ids`.
    #[must_use]
    pub fn find_closing_token_text(&self, opening_ids: &BracketIdSet) -> Option<&str> {
        self.map
            .iter()
            .filter(|(_, token)| token.kind == TokenKind::ClosingBracket && token.bracket_ids.intersects(opening_ids))
            .map(|(text, _)| text.as_str())
            .min()
    }

    /// Alternation of all literals, longest-sorting first. `None` without brackets.
    #[must_use]
    pub fn regex_str(&self) -> Option<&str> {
        self.regex_str.as_deref()
    }

    #[must_use]
    pub fn regex(&self) -> Option<&Regex> {
        self.regex.as_ref()
    }

    /// Matches bracket literals and line breaks.
    #[must_use]
    pub fn scan_regex(&self) -> &Regex {
        &self.scan_regex
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// The literal behind a bracket id.
    #[must_use]
    pub fn literal(&self, id: BracketId) -> Option<&str> {
        self.ids.reverse_lookup(id.0).map(String::as_str)
    }
}

// Literals that start or end with a word character only match on word boundaries,
// so `end` does not match inside `append`.
fn prepare_bracket_for_regex(literal: &str) -> String {
    let mut escaped = regex::escape(literal);
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    if literal.chars().next().is_some_and(is_word) {
        escaped.insert_str(0, r"\b");
    }
    if literal.chars().next_back().is_some_and(is_word) {
        escaped.push_str(r"\b");
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brackets::RawBracketsConfiguration;
    use pretty_assertions::assert_eq;

    fn tokens(pairs: &[(&str, &str)]) -> BracketTokens {
        let raw = RawBracketsConfiguration::new(pairs.iter().copied());
        BracketTokens::new(&BracketsConfiguration::new(&raw)).unwrap()
    }

    #[test]
    fn openers_get_the_lowest_ids() {
        let tokens = tokens(&[("(", ")"), ("[", "]")]);
        assert_eq!(tokens.token("(").unwrap().bracket_id, Some(BracketId(0)));
        assert_eq!(tokens.token("[").unwrap().bracket_id, Some(BracketId(1)));
        assert_eq!(tokens.literal(BracketId(2)), Some(")"));
    }

    #[test]
    fn closer_knows_every_opener_it_closes() {
        let tokens = tokens(&[("(", ")"), ("#(", ")")]);
        let close = tokens.token(")").unwrap();
        assert_eq!(close.kind, TokenKind::ClosingBracket);
        assert_eq!(close.bracket_id, Some(BracketId(0)));
        assert!(close.bracket_ids.has(BracketId(0)));
        assert!(close.bracket_ids.has(BracketId(1)));
        assert_eq!(tokens.find_closing_token_text(&BracketIdSet::single(BracketId(1))), Some(")"));
    }

    #[test]
    fn pattern_sorts_descending_and_guards_words() {
        let tokens = tokens(&[("(", ")"), ("begin", "end")]);
        insta::assert_snapshot!(tokens.regex_str().unwrap(), @r"\bend\b|\bbegin\b|\)|\(");
    }

    #[test]
    fn matching_is_case_insensitive() {
        let tokens = tokens(&[("begin", "end")]);
        let found = tokens.regex().unwrap().find("x BEGIN y").unwrap();
        assert_eq!(found.as_str(), "BEGIN");
        assert_eq!(tokens.token("BEGIN").unwrap().kind, TokenKind::OpeningBracket);
        assert!(tokens.regex().unwrap().find("appending").is_none());
    }

    #[test]
    fn empty_configuration_has_no_pattern() {
        let tokens = tokens(&[]);
        assert!(tokens.is_empty());
        assert!(tokens.regex_str().is_none());
    }
}
