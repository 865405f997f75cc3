//! Assembly of node sequences into balanced (2,3)-trees.

use crate::ast::builder::BuilderNode;
use crate::ast::{ListNode, Node};

/// Concatenates nodes that all have the same height. Runs in `O(items.len())`.
///
/// Returns `None` for an empty input.
#[must_use]
pub fn concat23_trees_of_same_height(mut items: Vec<Node>) -> Option<Node> {
    match items.len() {
        0 => return None,
        1 => return items.pop(),
        _ => {}
    }

    // Build parent levels bottom-up until at most three roots remain.
    while items.len() > 3 {
        let len = items.len();
        let mut parents = Vec::with_capacity(len / 2);
        let mut iter = items.into_iter();
        for i in 0..len / 2 {
            let j = i * 2;
            let (Some(a), Some(b)) = (iter.next(), iter.next()) else {
                break;
            };
            let c = if j + 3 == len { iter.next() } else { None };
            parents.push(ListNode::new23(a, b, c));
        }
        items = parents;
    }

    let mut iter = items.into_iter();
    match (iter.next(), iter.next(), iter.next()) {
        (Some(a), Some(b), c) => Some(ListNode::new23(a, b, c)),
        (single, None, _) => single,
        (None, _, _) => None,
    }
}

/// Concatenates nodes of arbitrary heights.
///
/// Runs of equal height are merged with [`concat23_trees_of_same_height`]
/// first; the resulting trees are then joined pairwise, always joining the
/// pair with the smaller height difference.
#[must_use]
pub fn concat23_trees(items: Vec<Node>) -> Option<Node> {
    match items.len() {
        0 => return None,
        1 => return items.into_iter().next(),
        _ => {}
    }

    let mut runs = SameHeightRuns { items, pos: 0 };

    let first = runs.next()?;
    let Some(second) = runs.next() else {
        return Some(first);
    };
    let mut first = BuilderNode::Frozen(first);
    let mut second = BuilderNode::Frozen(second);

    for item in runs {
        let item = BuilderNode::Frozen(item);
        // Joining trees of similar height is cheaper.
        if first.height_diff(&second) <= second.height_diff(&item) {
            first = first.concat(second);
            second = item;
        } else {
            second = second.concat(item);
        }
    }

    Some(first.concat(second).freeze())
}

struct SameHeightRuns {
    items: Vec<Node>,
    pos: usize,
}

impl Iterator for SameHeightRuns {
    type Item = Node;

    fn next(&mut self) -> Option<Node> {
        let start = self.pos;
        let height = self.items.get(start)?.list_height();
        let mut end = start + 1;
        while end < self.items.len() && self.items[end].list_height() == height {
            end += 1;
        }
        self.pos = end;
        if end - start >= 2 {
            concat23_trees_of_same_height(self.items[start..end].to_vec())
        } else {
            Some(self.items[start].clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::TextNode;
    use crate::ast::builder::is_balanced;
    use crate::length::Length;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn texts(n: usize) -> Vec<Node> {
        (0..n).map(|i| TextNode::new(Length::new(0, i as u32 + 1))).collect()
    }

    fn leaf_widths(node: &Node) -> Vec<u32> {
        if node.child_count() == 0 {
            return vec![node.length().column_count()];
        }
        node.children().flat_map(leaf_widths).collect()
    }

    #[rstest]
    #[case(2)]
    #[case(3)]
    #[case(4)]
    #[case(5)]
    #[case(7)]
    #[case(64)]
    #[case(100)]
    fn same_height_keeps_order_and_balance(#[case] n: usize) {
        let root = concat23_trees_of_same_height(texts(n)).unwrap();
        assert!(is_balanced(&root));
        assert_eq!(leaf_widths(&root), (1..=n as u32).collect::<Vec<_>>());
    }

    #[test]
    fn empty_and_single_inputs() {
        assert!(concat23_trees_of_same_height(Vec::new()).is_none());
        assert!(concat23_trees(Vec::new()).is_none());
        let single = texts(1);
        let root = concat23_trees(single.clone()).unwrap();
        assert!(std::sync::Arc::ptr_eq(&root, &single[0]));
    }

    #[test]
    fn mixed_heights_keep_order_and_balance() {
        let mut items = Vec::new();
        let leaves = texts(40);
        items.push(leaves[0].clone());
        items.push(concat23_trees_of_same_height(leaves[1..20].to_vec()).unwrap());
        items.push(leaves[20].clone());
        items.push(leaves[21].clone());
        items.push(concat23_trees_of_same_height(leaves[22..25].to_vec()).unwrap());
        items.extend(leaves[25..].iter().cloned());

        let root = concat23_trees(items).unwrap();
        assert!(is_balanced(&root));
        assert_eq!(leaf_widths(&root), (1..=40).collect::<Vec<_>>());
    }
}
