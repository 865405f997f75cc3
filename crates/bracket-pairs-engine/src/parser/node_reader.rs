use crate::ast::{AstNode, Node};
use crate::length::Length;

/// Walks a previous tree in document order, handing out the longest
/// subtree that starts exactly at a requested old offset.
pub struct NodeReader {
    next_nodes: Vec<Node>,
    offsets: Vec<Length>,
    idxs: Vec<usize>,
    last_offset: Length,
}

impl NodeReader {
    pub fn new(root: Node) -> Self {
        Self {
            next_nodes: vec![root],
            offsets: vec![Length::ZERO],
            idxs: Vec::new(),
            last_offset: Length::ZERO,
        }
    }

    /// The longest node starting at `offset` that satisfies `predicate`.
    ///
    /// # Panics
    ///
    /// If `offset` is smaller than the offset of a previous call.
    pub fn read_longest_node_at(&mut self, offset: Length, predicate: impl Fn(&AstNode) -> bool) -> Option<Node> {
        assert!(offset >= self.last_offset, "node reader offsets must not decrease");
        self.last_offset = offset;

        loop {
            let current = self.next_nodes.last()?.clone();
            let current_offset = *self.offsets.last()?;

            if offset < current_offset {
                // Not there yet.
                return None;
            }

            if current_offset < offset {
                if current_offset + current.length() <= offset {
                    self.next_node_after_current();
                } else if let Some(idx) = next_child_idx(&current, None) {
                    self.descend(&current, idx, current_offset);
                } else {
                    self.next_node_after_current();
                }
            } else if predicate(&current) {
                self.next_node_after_current();
                return Some(current);
            } else if let Some(idx) = next_child_idx(&current, None) {
                self.descend(&current, idx, current_offset);
            } else {
                self.next_node_after_current();
                return None;
            }
        }
    }

    fn descend(&mut self, node: &AstNode, idx: usize, offset: Length) {
        if let Some(child) = node.child(idx) {
            self.next_nodes.push(child.clone());
            self.offsets.push(offset);
            self.idxs.push(idx);
        }
    }

    fn next_node_after_current(&mut self) {
        loop {
            let current_offset = self.offsets.pop();
            let current = self.next_nodes.pop();

            let Some(&last_idx) = self.idxs.last() else {
                // Popped the root.
                break;
            };
            let Some(parent) = self.next_nodes.last().cloned() else {
                break;
            };

            if let Some(idx) = next_child_idx(&parent, Some(last_idx))
                && let Some(child) = parent.child(idx)
            {
                let end = current_offset.unwrap_or_default() + current.map_or(Length::ZERO, |n| n.length());
                self.next_nodes.push(child.clone());
                self.offsets.push(end);
                if let Some(slot) = self.idxs.last_mut() {
                    *slot = idx;
                }
                break;
            }
            // Parent fully consumed; continue from the parent.
            self.idxs.pop();
        }
    }
}

fn next_child_idx(node: &AstNode, current: Option<usize>) -> Option<usize> {
    let start = current.map_or(0, |idx| idx + 1);
    (start..node.child_count()).find(|&idx| node.child(idx).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ListNode, TextNode, format_tree};
    use pretty_assertions::assert_eq;

    fn text(columns: u32) -> Node {
        TextNode::new(Length::new(0, columns))
    }

    fn sample() -> Node {
        // [[a:2, b:3], [c:1, d:4]]
        let left = ListNode::new23(text(2), text(3), None);
        let right = ListNode::new23(text(1), text(4), None);
        ListNode::new23(left, right, None)
    }

    #[test]
    fn returns_the_longest_accepted_node() {
        let mut reader = NodeReader::new(sample());
        let node = reader.read_longest_node_at(Length::ZERO, |_| true).unwrap();
        assert_eq!(node.length(), Length::new(0, 10));
        // Everything was consumed.
        assert!(reader.read_longest_node_at(Length::new(0, 10), |_| true).is_none());
    }

    #[test]
    fn descends_when_the_predicate_rejects() {
        let mut reader = NodeReader::new(sample());
        let node = reader
            .read_longest_node_at(Length::ZERO, |n| n.length() <= Length::new(0, 5))
            .unwrap();
        insta::assert_snapshot!(format_tree(&node), @r"
        List(h=1)@[(0,0)..(0,5))
          Text@[(0,0)..(0,2))
          Text@[(0,2)..(0,5))
        ");
    }

    #[test]
    fn finds_nodes_starting_inside_a_parent() {
        let mut reader = NodeReader::new(sample());
        let node = reader.read_longest_node_at(Length::new(0, 5), |_| true).unwrap();
        assert_eq!(node.length(), Length::new(0, 5));
        assert!(reader.read_longest_node_at(Length::new(0, 6), |_| true).is_none());
    }

    #[test]
    fn offset_between_node_starts_finds_nothing() {
        let mut reader = NodeReader::new(sample());
        assert!(reader.read_longest_node_at(Length::new(0, 1), |_| true).is_none());
        let node = reader.read_longest_node_at(Length::new(0, 2), |_| true).unwrap();
        assert_eq!(node.length(), Length::new(0, 3));
    }

    #[test]
    #[should_panic(expected = "must not decrease")]
    fn decreasing_offsets_panic() {
        let mut reader = NodeReader::new(sample());
        reader.read_longest_node_at(Length::new(0, 3), |_| false);
        reader.read_longest_node_at(Length::new(0, 1), |_| false);
    }
}
