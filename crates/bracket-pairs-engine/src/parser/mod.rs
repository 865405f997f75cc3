//! Recursive descent over a token stream, with reuse of an old tree.
//!
//! Given the tree of the previous content and the edits since then, the
//! parser asks a [`NodeReader`] for the longest old subtree at the current
//! position that is untouched by the edits and still valid in the current
//! bracket context. Only the regions around edits are tokenized again.
//!
//! ## Modules
//!
//! - [`node_reader`] - document order cursor over an old tree

pub mod node_reader;

use tracing::trace;

use crate::ast::{AstNode, InvalidBracketNode, ListNode, Node, PairNode, TextNode};
use crate::ast::{concat23_trees, concat23_trees_of_same_height};
use crate::brackets::BracketIdSet;
use crate::edits::{BeforeEditPositionMapper, TextEditInfo};
use crate::tokenizer::{TokenKind, Tokenizer};

pub use node_reader::NodeReader;

/// Pairs nested deeper than this become text.
pub const MAX_NESTING_LEVEL: u32 = 300;

/// Counters from one parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    pub nodes_constructed: usize,
    pub nodes_reused: usize,
}

/// Parses the content behind `tokenizer`.
///
/// With `old_tree`, `edits` must describe how the previous content became
/// the current one; unchanged subtrees of `old_tree` are reused.
pub fn parse_document(
    tokenizer: &mut dyn Tokenizer,
    edits: &[TextEditInfo],
    old_tree: Option<Node>,
) -> (Node, ParseStats) {
    let mut parser = Parser::new(tokenizer, edits, old_tree);
    let root = parser.parse_document();
    (root, parser.stats)
}

pub struct Parser<'t> {
    tokenizer: &'t mut dyn Tokenizer,
    old_nodes: Option<NodeReader>,
    mapper: BeforeEditPositionMapper,
    stats: ParseStats,
}

impl<'t> Parser<'t> {
    pub fn new(tokenizer: &'t mut dyn Tokenizer, edits: &[TextEditInfo], old_tree: Option<Node>) -> Self {
        Self {
            tokenizer,
            old_nodes: old_tree.map(NodeReader::new),
            mapper: BeforeEditPositionMapper::new(edits),
            stats: ParseStats::default(),
        }
    }

    #[must_use]
    pub fn stats(&self) -> ParseStats {
        self.stats
    }

    pub fn parse_document(&mut self) -> Node {
        self.stats = ParseStats::default();
        self.parse_list(&BracketIdSet::empty(), 0)
            .unwrap_or_else(ListNode::empty)
    }

    fn parse_list(&mut self, opened: &BracketIdSet, level: u32) -> Option<Node> {
        let mut items = Vec::new();

        loop {
            let child = match self.try_read_child_from_cache(opened) {
                Some(child) => child,
                None => {
                    let stop = match self.tokenizer.peek() {
                        None => true,
                        Some(token) => token.kind == TokenKind::ClosingBracket && token.bracket_ids.intersects(opened),
                    };
                    if stop {
                        break;
                    }
                    self.parse_child(opened, level)
                }
            };

            if child.is_empty_list() {
                continue;
            }
            items.push(child);
        }

        if self.old_nodes.is_some() {
            concat23_trees(items)
        } else {
            // Everything was built from tokens here, so all items are leaves or pairs.
            concat23_trees_of_same_height(items)
        }
    }

    fn try_read_child_from_cache(&mut self, opened: &BracketIdSet) -> Option<Node> {
        let old_nodes = self.old_nodes.as_mut()?;
        let offset = self.tokenizer.offset();
        let max_cacheable_length = self.mapper.distance_to_next_change(offset);
        if max_cacheable_length.is_some_and(|length| length.is_zero()) || self.mapper.is_right_after_change(offset) {
            return None;
        }

        let old_offset = self.mapper.offset_before_change(offset);
        let node = old_nodes.read_longest_node_at(old_offset, |node: &AstNode| {
            // A node touching an edit cannot be reused: the edit may extend
            // its last token (`end` becoming `ending`).
            if max_cacheable_length.is_some_and(|max| node.length() >= max) {
                return false;
            }
            node.can_be_reused(opened)
        })?;

        trace!(offset = ?offset, length = ?node.length(), "reusing node");
        self.stats.nodes_reused += 1;
        self.tokenizer.skip(node.length());
        Some(node)
    }

    fn parse_child(&mut self, opened: &BracketIdSet, level: u32) -> Node {
        self.stats.nodes_constructed += 1;

        let Some(token) = self.tokenizer.read() else {
            // parse_list peeks before calling in here.
            return ListNode::empty();
        };

        match token.kind {
            TokenKind::ClosingBracket => InvalidBracketNode::new(token.bracket_ids, token.length),
            TokenKind::Text => token.node,
            TokenKind::OpeningBracket => {
                if level > MAX_NESTING_LEVEL {
                    return TextNode::new(token.length);
                }

                let child = self.parse_list(&opened.merge(&token.bracket_ids), level + 1);

                let closes = self.tokenizer.peek().is_some_and(|next| {
                    next.kind == TokenKind::ClosingBracket
                        && (next.bracket_id == token.bracket_id || next.bracket_ids.intersects(&token.bracket_ids))
                });
                let closing = if closes {
                    self.tokenizer.read().map(|next| next.node)
                } else {
                    None
                };
                PairNode::new(token.node, child, closing)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::ast::{format_brackets, format_tree};
    use crate::brackets::tokens::BracketTokens;
    use crate::brackets::{BracketsConfiguration, RawBracketsConfiguration};
    use crate::content::{ContentAccessor, PlainSpans, TextDocument};
    use crate::length::Length;
    use crate::position::Position;
    use crate::tokenizer::{ClassifiedTokenizer, FastTokenizer};
    use pretty_assertions::assert_eq;

    fn brackets() -> BracketTokens {
        let raw = RawBracketsConfiguration::new([("(", ")"), ("[", "]"), ("{", "}")]);
        BracketTokens::new(&BracketsConfiguration::new(&raw)).unwrap()
    }

    fn parse(text: &str) -> Node {
        let brackets = brackets();
        parse_document(&mut FastTokenizer::new(text, &brackets), &[], None).0
    }

    #[test]
    fn nested_pairs() {
        insta::assert_snapshot!(format_tree(&parse("a(b[c]d)e")), @r#"
        List(h=1)@[(0,0)..(0,9))
          Text@[(0,0)..(0,1))
          Pair@[(0,1)..(0,8))
            Bracket@[(0,1)..(0,2)) "("
            List(h=1)@[(0,2)..(0,7))
              Text@[(0,2)..(0,3))
              Pair@[(0,3)..(0,6))
                Bracket@[(0,3)..(0,4)) "["
                Text@[(0,4)..(0,5))
                Bracket@[(0,5)..(0,6)) "]"
              Text@[(0,6)..(0,7))
            Bracket@[(0,7)..(0,8)) ")"
          Text@[(0,8)..(0,9))
        "#);
    }

    #[test]
    fn unclosed_pair_runs_to_the_end() {
        insta::assert_snapshot!(format_tree(&parse("foo(bar")), @r#"
        List(h=1)@[(0,0)..(0,7))
          Text@[(0,0)..(0,3))
          Pair(unclosed)@[(0,3)..(0,7))
            Bracket@[(0,3)..(0,4)) "("
            Text@[(0,4)..(0,7))
        "#);
    }

    #[test]
    fn stray_closer_is_invalid() {
        insta::assert_snapshot!(format_tree(&parse("foo)bar")), @r"
        List(h=1)@[(0,0)..(0,7))
          Text@[(0,0)..(0,3))
          InvalidBracket@[(0,3)..(0,4))
          Text@[(0,4)..(0,7))
        ");
    }

    #[test]
    fn closer_of_an_outer_pair_ends_the_inner_one() {
        insta::assert_snapshot!(format_tree(&parse("([)")), @r#"
        Pair@[(0,0)..(0,3))
          Bracket@[(0,0)..(0,1)) "("
          Pair(unclosed)@[(0,1)..(0,2))
            Bracket@[(0,1)..(0,2)) "["
          Bracket@[(0,2)..(0,3)) ")"
        "#);
    }

    #[test]
    fn empty_document_is_an_empty_list() {
        let root = parse("");
        assert!(root.is_empty_list());
        assert_eq!(root.length(), Length::ZERO);
    }

    #[test]
    fn deep_nesting_is_capped() {
        let depth = MAX_NESTING_LEVEL as usize + 50;
        let text = "(".repeat(depth) + &")".repeat(depth);
        let root = parse(&text);
        assert_eq!(root.length(), Length::new(0, depth as u32 * 2));
    }

    #[test]
    fn reparse_reuses_untouched_nodes() {
        let brackets = brackets();
        let mut doc = TextDocument::new("{a}\n(b)\n[c]\n{d}\n");
        let (old, _) = parse_document(&mut ClassifiedTokenizer::new(&doc, &PlainSpans, &brackets), &[], None);

        let (start, end) = (Position::new(1, 1), Position::new(1, 2));
        let edit = TextEditInfo::replace(start, end, "xy");
        doc.replace(start, end, "xy");
        let (new, stats) = parse_document(
            &mut ClassifiedTokenizer::new(&doc, &PlainSpans, &brackets),
            &[edit],
            Some(old.clone()),
        );
        let (fresh, _) = parse_document(&mut FastTokenizer::new(&doc.text(), &brackets), &[], None);

        assert!(stats.nodes_reused > 0);
        assert_eq!(format_brackets(&new), format_brackets(&fresh));
        // The first pair is shared with the old tree.
        assert!(Arc::ptr_eq(&first_pair(&old), &first_pair(&new)));
    }

    fn first_pair(node: &Node) -> Node {
        let mut current = node.clone();
        loop {
            if matches!(current.as_ref(), AstNode::Pair(_)) {
                return current;
            }
            let Some(next) = current.children().next().cloned() else {
                panic!("no pair in tree");
            };
            current = next;
        }
    }
}
