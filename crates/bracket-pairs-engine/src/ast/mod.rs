//! Immutable bracket AST.
//!
//! The tree is a persistent (2,3)-tree annotated with lengths. Lists hold the
//! sequence structure; pairs bind an opening bracket, an optional child list
//! and an optional closing bracket. Nodes are shared through [`Node`] (an
//! `Arc`) so an incremental reparse only rebuilds the spine above the edited
//! region and reuses everything else by reference.
//!
//! ## Modules
//!
//! - [`builder`] - mutable list builder used while splicing trees together
//! - [`concat23`] - balanced concatenation of node sequences

pub mod builder;
pub mod concat23;

use std::fmt::Write as _;
use std::sync::{Arc, OnceLock};

use crate::brackets::{BracketIdSet, BracketKind};
use crate::content::ContentAccessor;
use crate::length::{Length, sum_lengths};
use crate::query::MAX_QUERY_DEPTH;

pub use concat23::{concat23_trees, concat23_trees_of_same_height};

pub type Node = Arc<AstNode>;

/// Returned by min indentation computations when no line carries indentation.
pub const NO_INDENTATION: u32 = u32::MAX;

static EMPTY_IDS: BracketIdSet = BracketIdSet::empty();

#[derive(Debug)]
pub enum AstNode {
    Text(TextNode),
    /// An opening or closing bracket. Only appears in a pair's bracket slots.
    Bracket(BracketNode),
    /// A closing bracket with no matching opener.
    InvalidBracket(InvalidBracketNode),
    Pair(PairNode),
    List(ListNode),
}

#[derive(Debug)]
pub struct TextNode {
    pub length: Length,
}

#[derive(Debug)]
pub struct BracketNode {
    pub length: Length,
    pub kind: BracketKind,
    pub bracket_ids: BracketIdSet,
}

#[derive(Debug)]
pub struct InvalidBracketNode {
    pub length: Length,
    pub missing_opening_bracket_ids: BracketIdSet,
}

#[derive(Debug)]
pub struct PairNode {
    pub length: Length,
    pub opening: Node,
    pub child: Option<Node>,
    pub closing: Option<Node>,
    pub missing_opening_bracket_ids: BracketIdSet,
}

#[derive(Debug)]
pub struct ListNode {
    pub length: Length,
    pub list_height: u32,
    children: Box<[Node]>,
    pub missing_opening_bracket_ids: BracketIdSet,
    min_indentation: OnceLock<u32>,
}

impl TextNode {
    #[must_use]
    pub fn new(length: Length) -> Node {
        Arc::new(AstNode::Text(TextNode { length }))
    }
}

impl BracketNode {
    #[must_use]
    pub fn new(length: Length, kind: BracketKind, bracket_ids: BracketIdSet) -> Node {
        Arc::new(AstNode::Bracket(BracketNode {
            length,
            kind,
            bracket_ids,
        }))
    }
}

impl InvalidBracketNode {
    #[must_use]
    pub fn new(closing_bracket_ids: BracketIdSet, length: Length) -> Node {
        Arc::new(AstNode::InvalidBracket(InvalidBracketNode {
            length,
            missing_opening_bracket_ids: closing_bracket_ids,
        }))
    }
}

impl PairNode {
    /// Builds a pair. `opening` and `closing` must be bracket leaves.
    #[must_use]
    pub fn new(opening: Node, child: Option<Node>, closing: Option<Node>) -> Node {
        let mut length = opening.length();
        if let Some(child) = &child {
            length += child.length();
        }
        if let Some(closing) = &closing {
            length += closing.length();
        }
        let missing_opening_bracket_ids = child
            .as_ref()
            .map(|c| c.missing_opening_bracket_ids().clone())
            .unwrap_or_default();
        Arc::new(AstNode::Pair(PairNode {
            length,
            opening,
            child,
            closing,
            missing_opening_bracket_ids,
        }))
    }

    #[must_use]
    pub fn opening_bracket(&self) -> &BracketNode {
        match self.opening.as_ref() {
            AstNode::Bracket(bracket) => bracket,
            other => panic!("pair opening slot holds a non-bracket node: {other:?}"),
        }
    }

    #[must_use]
    pub fn closing_bracket(&self) -> Option<&BracketNode> {
        self.closing.as_deref().and_then(AstNode::as_bracket)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closing.is_some()
    }

    /// Min indentation of the lines inside the pair's child.
    ///
    /// Pairs nested more than [`MAX_QUERY_DEPTH`] levels below this one are
    /// not looked into.
    #[must_use]
    pub fn compute_min_indentation(&self, offset: Length, content: &dyn ContentAccessor) -> u32 {
        self.min_indentation_within(offset, content, 0).value
    }

    fn min_indentation_within(&self, offset: Length, content: &dyn ContentAccessor, depth: u32) -> Indentation {
        if depth > MAX_QUERY_DEPTH {
            return Indentation::CUT_OFF;
        }
        self.child.as_ref().map_or(Indentation::NONE, |child| {
            child.min_indentation_within(offset + self.opening.length(), content, depth + 1)
        })
    }
}

impl ListNode {
    fn with_children(list_height: u32, children: Box<[Node]>) -> Self {
        let length = sum_lengths(children.iter().map(|c| c.length()));
        let missing_opening_bracket_ids = children
            .iter()
            .fold(BracketIdSet::empty(), |acc, c| acc.merge(c.missing_opening_bracket_ids()));
        Self {
            length,
            list_height,
            children,
            missing_opening_bracket_ids,
            min_indentation: OnceLock::new(),
        }
    }

    /// A (2,3) list node. All items must have the same height.
    #[must_use]
    pub fn new23(item1: Node, item2: Node, item3: Option<Node>) -> Node {
        let height = item1.list_height();
        assert_eq!(height, item2.list_height(), "list items must have equal height");
        let children: Vec<Node> = match item3 {
            Some(item3) => {
                assert_eq!(height, item3.list_height(), "list items must have equal height");
                vec![item1, item2, item3]
            }
            None => vec![item1, item2],
        };
        Arc::new(AstNode::List(Self::with_children(height + 1, children.into())))
    }

    /// A list of arbitrarily many items of height `list_height - 1`.
    #[must_use]
    pub fn from_items(list_height: u32, items: Vec<Node>) -> Node {
        Arc::new(AstNode::List(Self::with_children(list_height, items.into())))
    }

    #[must_use]
    pub fn empty() -> Node {
        Arc::new(AstNode::List(Self::with_children(0, Box::default())))
    }

    #[must_use]
    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Cached min indentation. A list's children never change, so the cache is never reset.
    #[must_use]
    pub fn compute_min_indentation(&self, offset: Length, content: &dyn ContentAccessor) -> u32 {
        self.min_indentation_within(offset, content, 0).value
    }

    fn min_indentation_within(&self, offset: Length, content: &dyn ContentAccessor, depth: u32) -> Indentation {
        if let Some(&value) = self.min_indentation.get() {
            return Indentation { value, complete: true };
        }
        let mut child_offset = offset;
        let mut min = Indentation::NONE;
        for child in self.children.iter() {
            min = min.min(child.min_indentation_within(child_offset, content, depth));
            child_offset += child.length();
        }
        // A value missing the pairs below the depth cap is not cached.
        if min.complete {
            let _ = self.min_indentation.set(min.value);
        }
        min
    }
}

impl AstNode {
    #[must_use]
    pub fn length(&self) -> Length {
        match self {
            AstNode::Text(n) => n.length,
            AstNode::Bracket(n) => n.length,
            AstNode::InvalidBracket(n) => n.length,
            AstNode::Pair(n) => n.length,
            AstNode::List(n) => n.length,
        }
    }

    /// Height in the (2,3)-tree. Only lists have a non-zero height.
    #[must_use]
    pub fn list_height(&self) -> u32 {
        match self {
            AstNode::List(n) => n.list_height,
            _ => 0,
        }
    }

    /// Opening bracket ids that closers inside this node could not find.
    #[must_use]
    pub fn missing_opening_bracket_ids(&self) -> &BracketIdSet {
        match self {
            AstNode::Text(_) | AstNode::Bracket(_) => &EMPTY_IDS,
            AstNode::InvalidBracket(n) => &n.missing_opening_bracket_ids,
            AstNode::Pair(n) => &n.missing_opening_bracket_ids,
            AstNode::List(n) => &n.missing_opening_bracket_ids,
        }
    }

    #[must_use]
    pub fn as_bracket(&self) -> Option<&BracketNode> {
        match self {
            AstNode::Bracket(n) => Some(n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&ListNode> {
        match self {
            AstNode::List(n) => Some(n),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_empty_list(&self) -> bool {
        matches!(self, AstNode::List(n) if n.children.is_empty())
    }

    /// Number of child slots. A pair always has three, some of which may be empty.
    #[must_use]
    pub fn child_count(&self) -> usize {
        match self {
            AstNode::Pair(_) => 3,
            AstNode::List(n) => n.children.len(),
            _ => 0,
        }
    }

    #[must_use]
    pub fn child(&self, idx: usize) -> Option<&Node> {
        match self {
            AstNode::Pair(n) => match idx {
                0 => Some(&n.opening),
                1 => n.child.as_ref(),
                2 => n.closing.as_ref(),
                _ => None,
            },
            AstNode::List(n) => n.children.get(idx),
            _ => None,
        }
    }

    /// Present children in order.
    pub fn children(&self) -> impl Iterator<Item = &Node> + '_ {
        (0..self.child_count()).filter_map(move |idx| self.child(idx))
    }

    /// Whether this node can be taken from a previous tree while `open_bracket_ids` are open.
    #[must_use]
    pub fn can_be_reused(&self, open_bracket_ids: &BracketIdSet) -> bool {
        match self {
            AstNode::Text(_) => true,
            AstNode::Bracket(_) => false,
            AstNode::InvalidBracket(n) => !open_bracket_ids.intersects(&n.missing_opening_bracket_ids),
            AstNode::Pair(n) => {
                // An unterminated pair might be closed by text that follows.
                n.closing.is_some() && !open_bracket_ids.intersects(&n.missing_opening_bracket_ids)
            }
            AstNode::List(n) => {
                if open_bracket_ids.intersects(&n.missing_opening_bracket_ids) || n.children.is_empty() {
                    return false;
                }
                let mut last = n.children[n.children.len() - 1].as_ref();
                while let AstNode::List(list) = last {
                    let Some(child) = list.children.last() else {
                        panic!("empty list nested inside a list");
                    };
                    last = child.as_ref();
                }
                last.can_be_reused(open_bracket_ids)
            }
        }
    }

    /// Smallest visible indentation of any non-blank line inside this node,
    /// or [`NO_INDENTATION`].
    #[must_use]
    pub fn compute_min_indentation(&self, offset: Length, content: &dyn ContentAccessor) -> u32 {
        self.min_indentation_within(offset, content, 0).value
    }

    fn min_indentation_within(&self, offset: Length, content: &dyn ContentAccessor, depth: u32) -> Indentation {
        match self {
            AstNode::Text(n) => Indentation {
                value: text_min_indentation(offset, n.length, content),
                complete: true,
            },
            AstNode::Pair(n) => n.min_indentation_within(offset, content, depth),
            AstNode::List(n) => n.min_indentation_within(offset, content, depth),
            AstNode::Bracket(_) | AstNode::InvalidBracket(_) => Indentation::NONE,
        }
    }
}

// Text never starts with partial indentation, so a text node that does not
// begin at column 0 contributes nothing from its first line. A last line the
// node only reaches at column 0 holds none of its characters.
fn text_min_indentation(offset: Length, length: Length, content: &dyn ContentAccessor) -> u32 {
    let start_line = if offset.column_count() == 0 {
        offset.line_count()
    } else {
        offset.line_count() + 1
    };
    let end = offset + length;
    let end_line = if end.column_count() == 0 {
        match end.line_count().checked_sub(1) {
            Some(line) => line,
            None => return NO_INDENTATION,
        }
    } else {
        end.line_count()
    };

    let tab_size = content.tab_size().max(1);
    let mut result = NO_INDENTATION;
    for line in start_line..=end_line.min(content.line_count().saturating_sub(1)) {
        if let Some(column) = visible_indentation(&content.line(line), tab_size) {
            result = result.min(column);
        }
    }
    result
}

/// A partial min indentation result. `complete` is false when pairs past the
/// depth cap were skipped.
#[derive(Clone, Copy)]
struct Indentation {
    value: u32,
    complete: bool,
}

impl Indentation {
    const NONE: Self = Self {
        value: NO_INDENTATION,
        complete: true,
    };
    const CUT_OFF: Self = Self {
        value: NO_INDENTATION,
        complete: false,
    };

    fn min(self, other: Self) -> Self {
        Self {
            value: self.value.min(other.value),
            complete: self.complete && other.complete,
        }
    }
}

/// Visible column of the first non-whitespace character, or `None` for a blank line.
fn visible_indentation(line: &str, tab_size: u32) -> Option<u32> {
    let mut column = 0;
    for ch in line.chars() {
        match ch {
            ' ' => column += 1,
            '\t' => column += tab_size - column % tab_size,
            _ => return Some(column),
        }
    }
    None
}

/// Renders a tree with absolute ranges, one node per line.
#[must_use]
pub fn format_tree(node: &AstNode) -> String {
    let mut out = String::new();
    write_node(&mut out, node, Length::ZERO, 0);
    out
}

/// Renders only pairs and brackets, ignoring how text and lists are split.
///
/// Two trees for the same content have the same bracket outline no matter
/// which tokenizer built them or how much of them was reused.
#[must_use]
pub fn format_brackets(node: &AstNode) -> String {
    let mut out = String::new();
    write_brackets(&mut out, node, Length::ZERO, 0);
    out
}

fn write_brackets(out: &mut String, node: &AstNode, offset: Length, depth: usize) {
    let prefix = "  ".repeat(depth);
    let range = offset.to_range(offset + node.length());
    let depth = match node {
        AstNode::Bracket(b) => {
            let _ = writeln!(out, "{prefix}{:?}@{range:?}", b.kind.text());
            return;
        }
        AstNode::InvalidBracket(_) => {
            let _ = writeln!(out, "{prefix}Invalid@{range:?}");
            return;
        }
        AstNode::Pair(p) => {
            let state = if p.closing.is_some() { "Pair" } else { "Pair(unclosed)" };
            let _ = writeln!(out, "{prefix}{state}@{range:?}");
            depth + 1
        }
        AstNode::Text(_) => return,
        AstNode::List(_) => depth,
    };
    let mut child_offset = offset;
    for child in node.children() {
        write_brackets(out, child, child_offset, depth);
        child_offset += child.length();
    }
}

fn write_node(out: &mut String, node: &AstNode, offset: Length, indent: usize) {
    let prefix = "  ".repeat(indent);
    let range = offset.to_range(offset + node.length());
    let _ = match node {
        AstNode::Text(_) => writeln!(out, "{prefix}Text@{range:?}"),
        AstNode::Bracket(b) => writeln!(out, "{prefix}Bracket@{range:?} {:?}", b.kind.text()),
        AstNode::InvalidBracket(_) => writeln!(out, "{prefix}InvalidBracket@{range:?}"),
        AstNode::Pair(p) if p.closing.is_none() => writeln!(out, "{prefix}Pair(unclosed)@{range:?}"),
        AstNode::Pair(_) => writeln!(out, "{prefix}Pair@{range:?}"),
        AstNode::List(l) => writeln!(out, "{prefix}List(h={})@{range:?}", l.list_height),
    };
    let mut child_offset = offset;
    for child in node.children() {
        write_node(out, child, child_offset, indent + 1);
        child_offset += child.length();
    }
}
