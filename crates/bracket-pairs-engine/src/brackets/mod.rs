//! Bracket configuration.
//!
//! A language declares an ordered list of `(open, close)` literal pairs and an
//! optional colorized subset. [`BracketsConfiguration`] resolves these into
//! opening and closing kinds that know which partners they pair with, and
//! [`BracketTokens`] turns the resolved configuration into the token table
//! the tokenizers match against.
//!
//! ## Modules
//!
//! - [`tokens`] - literal to token table and the bracket search pattern

pub mod tokens;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::small_set::{DenseKey, SmallImmutableSet};

pub use tokens::BracketTokens;

/// Dense id of a bracket literal. Opening and closing literals share one namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BracketId(pub u32);

impl DenseKey for BracketId {
    fn from_key(key: u32) -> Self {
        BracketId(key)
    }

    fn key(self) -> u32 {
        self.0
    }
}

pub type BracketIdSet = SmallImmutableSet<BracketId>;

/// Bracket pairs as declared by a language or the user configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawBracketsConfiguration {
    pub brackets: Vec<(String, String)>,
    /// `None` colorizes every pair except `<`/`>`.
    pub colorized_bracket_pairs: Option<Vec<(String, String)>>,
}

impl RawBracketsConfiguration {
    pub fn new<S: Into<String>>(brackets: impl IntoIterator<Item = (S, S)>) -> Self {
        Self {
            brackets: brackets
                .into_iter()
                .map(|(open, close)| (open.into(), close.into()))
                .collect(),
            colorized_bracket_pairs: None,
        }
    }

    #[must_use]
    pub fn with_colorized<S: Into<String>>(mut self, pairs: impl IntoIterator<Item = (S, S)>) -> Self {
        self.colorized_bracket_pairs = Some(
            pairs
                .into_iter()
                .map(|(open, close)| (open.into(), close.into()))
                .collect(),
        );
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpeningBracketKind {
    pub text: String,
    /// Closing literals that can close this opener.
    pub closing_texts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosingBracketKind {
    pub text: String,
    pub opening_texts: Vec<String>,
    pub opening_colorized_texts: Vec<String>,
}

impl ClosingBracketKind {
    #[must_use]
    pub fn closes(&self, opening: &OpeningBracketKind) -> bool {
        self.opening_texts.iter().any(|t| *t == opening.text)
    }

    #[must_use]
    pub fn closes_colorized(&self, opening: &OpeningBracketKind) -> bool {
        self.opening_colorized_texts.iter().any(|t| *t == opening.text)
    }
}

#[derive(Clone, PartialEq, Eq)]
pub enum BracketKind {
    Opening(Arc<OpeningBracketKind>),
    Closing(Arc<ClosingBracketKind>),
}

impl BracketKind {
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            BracketKind::Opening(kind) => &kind.text,
            BracketKind::Closing(kind) => &kind.text,
        }
    }

    #[must_use]
    pub fn as_opening(&self) -> Option<&OpeningBracketKind> {
        match self {
            BracketKind::Opening(kind) => Some(kind),
            BracketKind::Closing(_) => None,
        }
    }

    #[must_use]
    pub fn as_closing(&self) -> Option<&ClosingBracketKind> {
        match self {
            BracketKind::Closing(kind) => Some(kind),
            BracketKind::Opening(_) => None,
        }
    }
}

impl fmt::Debug for BracketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BracketKind::Opening(kind) => write!(f, "Opening({:?})", kind.text),
            BracketKind::Closing(kind) => write!(f, "Closing({:?})", kind.text),
        }
    }
}

/// Resolved bracket kinds for one language. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct BracketsConfiguration {
    opening: Vec<Arc<OpeningBracketKind>>,
    closing: Vec<Arc<ClosingBracketKind>>,
    opening_index: HashMap<String, usize>,
    closing_index: HashMap<String, usize>,
}

#[derive(Default)]
struct KindsBuilder {
    opening: Vec<OpeningBracketKind>,
    closing: Vec<ClosingBracketKind>,
    opening_index: HashMap<String, usize>,
    closing_index: HashMap<String, usize>,
}

impl KindsBuilder {
    fn opening(&mut self, text: &str) -> &mut OpeningBracketKind {
        let idx = *self.opening_index.entry(text.to_string()).or_insert_with(|| {
            self.opening.push(OpeningBracketKind {
                text: text.to_string(),
                closing_texts: Vec::new(),
            });
            self.opening.len() - 1
        });
        &mut self.opening[idx]
    }

    fn closing(&mut self, text: &str) -> &mut ClosingBracketKind {
        let idx = *self.closing_index.entry(text.to_string()).or_insert_with(|| {
            self.closing.push(ClosingBracketKind {
                text: text.to_string(),
                opening_texts: Vec::new(),
                opening_colorized_texts: Vec::new(),
            });
            self.closing.len() - 1
        });
        &mut self.closing[idx]
    }

    fn link(&mut self, open: &str, close: &str, colorized: bool) {
        push_unique(&mut self.opening(open).closing_texts, close);
        let closing = self.closing(close);
        push_unique(&mut closing.opening_texts, open);
        if colorized {
            push_unique(&mut closing.opening_colorized_texts, open);
        }
    }
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

fn valid_pairs(pairs: &[(String, String)]) -> impl Iterator<Item = &(String, String)> {
    pairs
        .iter()
        .filter(|(open, close)| !open.is_empty() && !close.is_empty())
}

impl BracketsConfiguration {
    pub fn new(raw: &RawBracketsConfiguration) -> Self {
        let mut builder = KindsBuilder::default();

        for (open, close) in valid_pairs(&raw.brackets) {
            builder.link(open, close, false);
        }

        // Colorized pairs are brackets too, even if they were not declared as such.
        let colorized: Vec<&(String, String)> = match &raw.colorized_bracket_pairs {
            Some(pairs) => valid_pairs(pairs).collect(),
            None => valid_pairs(&raw.brackets)
                .filter(|(open, close)| !(open == "<" && close == ">"))
                .collect(),
        };
        for (open, close) in colorized {
            builder.link(open, close, true);
        }

        Self {
            opening: builder.opening.into_iter().map(Arc::new).collect(),
            closing: builder.closing.into_iter().map(Arc::new).collect(),
            opening_index: builder.opening_index,
            closing_index: builder.closing_index,
        }
    }

    /// Opening kinds in declaration order. No two share a literal.
    #[must_use]
    pub fn opening_brackets(&self) -> &[Arc<OpeningBracketKind>] {
        &self.opening
    }

    /// Closing kinds in declaration order. No two share a literal.
    #[must_use]
    pub fn closing_brackets(&self) -> &[Arc<ClosingBracketKind>] {
        &self.closing
    }

    #[must_use]
    pub fn opening_bracket(&self, text: &str) -> Option<&Arc<OpeningBracketKind>> {
        self.opening_index.get(text).map(|idx| &self.opening[*idx])
    }

    #[must_use]
    pub fn closing_bracket(&self, text: &str) -> Option<&Arc<ClosingBracketKind>> {
        self.closing_index.get(text).map(|idx| &self.closing[*idx])
    }

    #[must_use]
    pub fn bracket(&self, text: &str) -> Option<BracketKind> {
        self.opening_bracket(text)
            .map(|k| BracketKind::Opening(k.clone()))
            .or_else(|| self.closing_bracket(text).map(|k| BracketKind::Closing(k.clone())))
    }
}

impl From<&RawBracketsConfiguration> for BracketsConfiguration {
    fn from(raw: &RawBracketsConfiguration) -> Self {
        Self::new(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config(pairs: &[(&str, &str)]) -> BracketsConfiguration {
        BracketsConfiguration::new(&RawBracketsConfiguration::new(pairs.iter().copied()))
    }

    #[test]
    fn empty_literals_are_ignored() {
        let cfg = config(&[("(", ")"), ("", "]"), ("{", "")]);
        let openers: Vec<_> = cfg.opening_brackets().iter().map(|k| k.text.as_str()).collect();
        assert_eq!(openers, vec!["("]);
        assert!(cfg.closing_bracket("]").is_none());
    }

    #[test]
    fn angle_brackets_are_not_colorized_by_default() {
        let cfg = config(&[("(", ")"), ("<", ">")]);
        let paren = cfg.opening_bracket("(").unwrap();
        let angle = cfg.opening_bracket("<").unwrap();
        assert!(cfg.closing_bracket(")").unwrap().closes_colorized(paren));
        let close_angle = cfg.closing_bracket(">").unwrap();
        assert!(close_angle.closes(angle));
        assert!(!close_angle.closes_colorized(angle));
    }

    #[test]
    fn explicit_colorized_pairs_are_added_as_brackets() {
        let raw = RawBracketsConfiguration::new([("(", ")")]).with_colorized([("begin", "end")]);
        let cfg = BracketsConfiguration::new(&raw);
        let begin = cfg.opening_bracket("begin").unwrap();
        assert!(cfg.closing_bracket("end").unwrap().closes_colorized(begin));
        let paren = cfg.opening_bracket("(").unwrap();
        assert!(!cfg.closing_bracket(")").unwrap().closes_colorized(paren));
    }

    #[test]
    fn closer_shared_by_several_openers() {
        let cfg = config(&[("(", ")"), ("#(", ")")]);
        let closing = cfg.closing_bracket(")").unwrap();
        assert_eq!(closing.opening_texts, vec!["(".to_string(), "#(".to_string()]);
        assert!(matches!(cfg.bracket("#("), Some(BracketKind::Opening(_))));
    }
}
