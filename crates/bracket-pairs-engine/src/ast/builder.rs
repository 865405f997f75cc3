//! Mutable (2,3) list construction.
//!
//! [`ListBuilder`] is the only place the tree is ever modified. Appending or
//! prepending a node walks down one spine of the list, turning frozen
//! [`Node`]s into builders on the way (a shallow copy of their child
//! slice), and splits full 3-child nodes on the way back up. When
//! assembly is done, [`BuilderNode::freeze`] converts everything back into
//! shared immutable nodes. Untouched subtrees stay frozen throughout and are
//! shared with the previous tree.

use crate::ast::{AstNode, ListNode, Node};
use crate::brackets::BracketIdSet;
use crate::length::Length;

/// Either a shared immutable node or a list still under construction.
#[derive(Debug)]
pub enum BuilderNode {
    Frozen(Node),
    List(ListBuilder),
}

#[derive(Debug)]
pub struct ListBuilder {
    list_height: u32,
    children: Vec<BuilderNode>,
    length: Length,
    missing_opening_bracket_ids: BracketIdSet,
}

impl BuilderNode {
    #[must_use]
    pub fn list_height(&self) -> u32 {
        match self {
            BuilderNode::Frozen(node) => node.list_height(),
            BuilderNode::List(list) => list.list_height,
        }
    }

    #[must_use]
    pub fn length(&self) -> Length {
        match self {
            BuilderNode::Frozen(node) => node.length(),
            BuilderNode::List(list) => list.length,
        }
    }

    fn missing_opening_bracket_ids(&self) -> &BracketIdSet {
        match self {
            BuilderNode::Frozen(node) => node.missing_opening_bracket_ids(),
            BuilderNode::List(list) => &list.missing_opening_bracket_ids,
        }
    }

    #[must_use]
    pub fn freeze(self) -> Node {
        match self {
            BuilderNode::Frozen(node) => node,
            BuilderNode::List(list) => list.freeze(),
        }
    }

    /// A builder for this node, which must be a list.
    fn into_list(self) -> ListBuilder {
        match self {
            BuilderNode::List(list) => list,
            BuilderNode::Frozen(node) => ListBuilder::from_frozen(&node),
        }
    }

    /// Concatenates two (2,3) trees into one.
    #[must_use]
    pub fn concat(self, other: BuilderNode) -> BuilderNode {
        let (left, right) = (self.list_height(), other.list_height());
        if left == right {
            BuilderNode::List(ListBuilder::new23(self, other))
        } else if left > right {
            self.into_list().append(other)
        } else {
            other.into_list().prepend(self)
        }
    }

    #[must_use]
    pub fn height_diff(&self, other: &BuilderNode) -> u32 {
        self.list_height().abs_diff(other.list_height())
    }
}

impl From<Node> for BuilderNode {
    fn from(node: Node) -> Self {
        BuilderNode::Frozen(node)
    }
}

impl ListBuilder {
    /// Two items of the same height under a new parent.
    #[must_use]
    pub fn new23(item1: BuilderNode, item2: BuilderNode) -> Self {
        let height = item1.list_height();
        assert_eq!(height, item2.list_height(), "list items must have equal height");
        let mut list = Self {
            list_height: height + 1,
            children: vec![item1, item2],
            length: Length::ZERO,
            missing_opening_bracket_ids: BracketIdSet::empty(),
        };
        list.handle_children_changed();
        list
    }

    /// Shallow copy of a frozen list: the children stay frozen and shared.
    ///
    /// # Panics
    ///
    /// Panics if `node` is not a list.
    #[must_use]
    pub fn from_frozen(node: &Node) -> Self {
        let Some(list) = node.as_list() else {
            panic!("expected a list node, found {node:?}");
        };
        Self {
            list_height: list.list_height,
            children: list.children().iter().cloned().map(BuilderNode::Frozen).collect(),
            length: list.length,
            missing_opening_bracket_ids: list.missing_opening_bracket_ids.clone(),
        }
    }

    #[must_use]
    pub fn list_height(&self) -> u32 {
        self.list_height
    }

    #[must_use]
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    fn handle_children_changed(&mut self) {
        let mut length = Length::ZERO;
        let mut missing = BracketIdSet::empty();
        for child in &self.children {
            length += child.length();
            missing = missing.merge(child.missing_opening_bracket_ids());
        }
        self.length = length;
        self.missing_opening_bracket_ids = missing;
    }

    fn child_as_list(&mut self, idx: usize) -> &mut ListBuilder {
        let slot = &mut self.children[idx];
        if let BuilderNode::Frozen(node) = slot {
            *slot = BuilderNode::List(ListBuilder::from_frozen(node));
        }
        match slot {
            BuilderNode::List(list) => list,
            BuilderNode::Frozen(_) => unreachable!("slot was converted above"),
        }
    }

    /// Appends `node`, which must not be taller than this list's children.
    /// Returns the new root.
    #[must_use]
    pub fn append(mut self, node: BuilderNode) -> BuilderNode {
        match self.append_rec(node) {
            Some(split) => BuilderNode::List(ListBuilder::new23(BuilderNode::List(self), split)),
            None => BuilderNode::List(self),
        }
    }

    fn append_rec(&mut self, node: BuilderNode) -> Option<BuilderNode> {
        let to_insert = if node.list_height() + 1 == self.list_height {
            Some(node)
        } else {
            let last = self.children.len() - 1;
            self.child_as_list(last).append_rec(node)
        };

        let overflow = match to_insert {
            Some(item) if self.children.len() >= 3 => {
                // A full node hands its last child plus the new item to the parent.
                self.children
                    .pop()
                    .map(|last| BuilderNode::List(ListBuilder::new23(last, item)))
            }
            Some(item) => {
                self.children.push(item);
                None
            }
            None => None,
        };
        self.handle_children_changed();
        overflow
    }

    /// Prepends `node`, which must not be taller than this list's children.
    /// Returns the new root.
    #[must_use]
    pub fn prepend(mut self, node: BuilderNode) -> BuilderNode {
        match self.prepend_rec(node) {
            Some(split) => BuilderNode::List(ListBuilder::new23(split, BuilderNode::List(self))),
            None => BuilderNode::List(self),
        }
    }

    fn prepend_rec(&mut self, node: BuilderNode) -> Option<BuilderNode> {
        let to_insert = if node.list_height() + 1 == self.list_height {
            Some(node)
        } else {
            self.child_as_list(0).prepend_rec(node)
        };

        let overflow = match to_insert {
            Some(item) if self.children.len() >= 3 => {
                let first = self.children.remove(0);
                Some(BuilderNode::List(ListBuilder::new23(item, first)))
            }
            Some(item) => {
                self.children.insert(0, item);
                None
            }
            None => None,
        };
        self.handle_children_changed();
        overflow
    }

    #[must_use]
    pub fn freeze(self) -> Node {
        let children: Vec<Node> = self.children.into_iter().map(BuilderNode::freeze).collect();
        ListNode::from_items(self.list_height, children)
    }
}

/// True if every list in `node` has 2 or 3 children and children of a list share one height.
#[must_use]
pub fn is_balanced(node: &AstNode) -> bool {
    match node {
        AstNode::List(list) => {
            let children = list.children();
            if children.is_empty() {
                return list.list_height == 0;
            }
            (2..=3).contains(&children.len())
                && children.iter().all(|c| c.list_height() + 1 == list.list_height && is_balanced(c))
        }
        AstNode::Pair(pair) => pair.child.as_deref().is_none_or(is_balanced),
        _ => true,
    }
}
