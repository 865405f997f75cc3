//! Bracket lookups addressed by byte offset.
//!
//! Editors that index text by offset rather than line/column use
//! [`TreeBracketPairProvider`]. It answers from the tree's current content
//! snapshot, so offsets and tree always agree, and it can be driven by an
//! [`AsyncBracketsCollector`](crate::worker::AsyncBracketsCollector).

use std::ops::ControlFlow;
use std::sync::Arc;

use crate::content::ContentAccessor;
use crate::error::Result;
use crate::length::Length;
use crate::position::Position;
use crate::query::{self, BracketPairInfo};
use crate::tree::BracketPairsTree;
use crate::worker::{BracketComputer, CancellationToken};

/// A closed pair as byte ranges of the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PairedBracket {
    pub left_index: usize,
    pub left_length: usize,
    pub right_index: usize,
    pub right_length: usize,
    pub level: u32,
}

pub struct TreeBracketPairProvider {
    tree: Arc<BracketPairsTree>,
}

impl TreeBracketPairProvider {
    pub fn new(tree: Arc<BracketPairsTree>) -> Self {
        Self { tree }
    }

    pub fn tree(&self) -> &Arc<BracketPairsTree> {
        &self.tree
    }

    /// The closed pair with a bracket covering byte `index`.
    pub fn paired_bracket_at(&self, index: usize, token: &CancellationToken) -> Result<Option<PairedBracket>> {
        token.check()?;
        let found = self.tree.with_current(|root, content| -> Result<Option<PairedBracket>> {
            let Some(content) = content else {
                return Ok(None);
            };
            if index >= content.offset_at(content.end_position()) {
                return Ok(None);
            }

            let position = content.position_at(index);
            let start = Length::from(position);
            let end = Length::new(position.line, position.column + 1);
            let mut matched = None;
            let _ = query::collect_bracket_pairs(root, start, end, None, &mut |info| {
                if token.is_cancelled() {
                    return ControlFlow::Break(());
                }
                let on_closing = info.closing_range.is_some_and(|range| range.contains(position));
                if info.opening_range.contains(position) || on_closing {
                    matched = Some(info);
                    return ControlFlow::Break(());
                }
                ControlFlow::Continue(())
            });
            token.check()?;
            Ok(matched.and_then(|info| to_paired_bracket(content, &info)))
        });
        found.unwrap_or(Ok(None))
    }

    /// Closed pairs overlapping the range between `left` and `right`, outer
    /// pairs first. Both positions are clamped to the document and may be
    /// given in either order.
    pub fn bracket_pairs_in_range(
        &self,
        left: Position,
        right: Position,
        token: &CancellationToken,
    ) -> Result<Vec<PairedBracket>> {
        token.check()?;
        let found = self.tree.with_current(|root, content| -> Result<Vec<PairedBracket>> {
            let Some(content) = content else {
                return Ok(Vec::new());
            };
            let (left, right) = (clamp(content, left), clamp(content, right));
            let (start, end) = if left <= right { (left, right) } else { (right, left) };

            let mut pairs = Vec::new();
            let _ = query::collect_bracket_pairs(root, start.into(), end.into(), None, &mut |info| {
                if token.is_cancelled() {
                    return ControlFlow::Break(());
                }
                pairs.extend(to_paired_bracket(content, &info));
                ControlFlow::Continue(())
            });
            token.check()?;
            Ok(pairs)
        });
        found.unwrap_or_else(|| Ok(Vec::new()))
    }
}

impl BracketComputer for TreeBracketPairProvider {
    fn compute_matched_bracket(&self, index: usize, token: &CancellationToken) -> Result<Option<PairedBracket>> {
        self.paired_bracket_at(index, token)
    }

    fn compute_bracket_pairs_in_range(
        &self,
        left: Position,
        right: Position,
        token: &CancellationToken,
    ) -> Result<Vec<PairedBracket>> {
        self.bracket_pairs_in_range(left, right, token)
    }
}

fn clamp(content: &dyn ContentAccessor, position: Position) -> Position {
    let line = position.line.min(content.line_count().saturating_sub(1));
    Position::new(line, position.column.min(content.column_count(line)))
}

fn to_paired_bracket(content: &dyn ContentAccessor, info: &BracketPairInfo) -> Option<PairedBracket> {
    let closing = info.closing_range?;
    let left_index = content.offset_at(info.opening_range.start);
    let right_index = content.offset_at(closing.start);
    let left_length = content.offset_at(info.opening_range.end).saturating_sub(left_index);
    let right_length = content.offset_at(closing.end).saturating_sub(right_index);
    if left_length == 0 || right_length == 0 {
        return None;
    }
    Some(PairedBracket {
        left_index,
        left_length,
        right_index,
        right_length,
        level: info.level,
    })
}
