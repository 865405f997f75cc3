//! Token streams feeding the parser.
//!
//! A tokenizer turns content into a sequence of bracket and text tokens whose
//! lengths sum to the content length. Text tokens are coalesced runs of
//! non-bracket content and may span lines.
//!
//! ## Modules
//!
//! - [`fast`] - whole-buffer regex scan, used for a first tree before any
//!   classification exists
//! - [`classified`] - line by line scan that skips strings and comments

pub mod classified;
pub mod fast;

use crate::ast::{Node, TextNode};
use crate::brackets::{BracketId, BracketIdSet};
use crate::length::Length;

pub use classified::ClassifiedTokenizer;
pub use fast::FastTokenizer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Text,
    OpeningBracket,
    ClosingBracket,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub length: Length,
    pub kind: TokenKind,
    /// The opener's id for opening brackets, the first matching opener's id for closers.
    pub bracket_id: Option<BracketId>,
    /// For closers, every opener they close.
    pub bracket_ids: BracketIdSet,
    /// Leaf node handed to the tree for this token.
    pub node: Node,
}

impl Token {
    pub fn text(length: Length) -> Self {
        Self {
            length,
            kind: TokenKind::Text,
            bracket_id: None,
            bracket_ids: BracketIdSet::empty(),
            node: TextNode::new(length),
        }
    }
}

pub trait Tokenizer {
    /// Length consumed so far.
    fn offset(&self) -> Length;

    /// Length of the whole content.
    fn length(&self) -> Length;

    fn read(&mut self) -> Option<Token>;

    fn peek(&mut self) -> Option<&Token>;

    /// Advances by `length` without producing tokens. Used when the parser
    /// reuses a node from a previous tree.
    fn skip(&mut self, length: Length);
}

/// Drains a tokenizer. Mostly useful in tests and tooling.
pub fn read_all(tokenizer: &mut dyn Tokenizer) -> Vec<Token> {
    std::iter::from_fn(|| tokenizer.read()).collect()
}
