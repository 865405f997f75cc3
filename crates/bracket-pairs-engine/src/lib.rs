//! Incremental bracket pair index for live text editing.
//!
//! The document's brackets live in a persistent, balanced tree
//! ([`ast`]). Edits are queued as [`TextEditInfo`]s and folded into a new tree
//! on [`BracketPairsTree::flush`], which reuses every subtree the edits did not
//! touch. Queries ([`query`]) walk only the part of the tree overlapping the
//! requested range.

pub mod ast;
pub mod brackets;
pub mod content;
pub mod edits;
pub mod error;
pub mod length;
pub mod parser;
pub mod position;
pub mod provider;
pub mod query;
pub mod session;
pub mod small_set;
pub mod tokenizer;
pub mod tree;
pub mod worker;

// Re-export key types for easier usage
pub use brackets::{BracketKind, BracketTokens, BracketsConfiguration, RawBracketsConfiguration};
pub use content::{
    ClassifiedSpan, ContentAccessor, ContentSnapshot, ContentSnapshotProvider, PlainSpans, SharedDocument, SpanKind,
    SpanTable, TextDocument, TokenSpans,
};
pub use edits::TextEditInfo;
pub use error::{Error, Result};
pub use length::Length;
pub use parser::ParseStats;
pub use position::{Position, TextRange};
pub use provider::{PairedBracket, TreeBracketPairProvider};
pub use query::{BracketInfo, BracketMatch, BracketPairInfo, FoundBracket};
pub use session::BracketSession;
pub use tree::BracketPairsTree;
pub use worker::{AsyncBracketsCollector, BracketComputer, BracketReceiver, CancellationToken};
