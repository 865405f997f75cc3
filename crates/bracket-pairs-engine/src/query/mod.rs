//! Read-only traversals over a bracket tree.
//!
//! All range queries take a `[start, end)` window in [`Length`] units and
//! deliver results through a visitor returning [`ControlFlow`], so callers can
//! stop early. The `*_in_range` helpers collect into a `Vec`.
//!
//! Children that overlap the window are visited; touching counts as
//! overlapping. When a child reaches past the end of the window, traversal
//! continues into it in a loop instead of recursing, so queries near the end
//! of a long flat list stay proportional to the tree depth.

use std::collections::HashMap;
use std::ops::ControlFlow;

use crate::ast::{AstNode, NO_INDENTATION, PairNode};
use crate::brackets::BracketKind;
use crate::content::ContentAccessor;
use crate::length::Length;
use crate::position::{Position, TextRange};

/// Traversals stop descending past this many nested pairs.
pub const MAX_QUERY_DEPTH: u32 = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BracketInfo {
    pub range: TextRange,
    /// Number of enclosing colorized pairs. `-1` for a closer without opener at top level.
    pub level: i32,
    /// Like `level`, but only counting pairs with the same opening literal.
    pub nesting_level_of_equal_type: i32,
    /// Set for closers that have no opener.
    pub is_invalid: bool,
    /// `None` for invalid closers.
    pub kind: Option<BracketKind>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BracketPairInfo {
    pub range: TextRange,
    pub opening_range: TextRange,
    /// `None` for an unterminated pair.
    pub closing_range: Option<TextRange>,
    pub level: u32,
    pub nesting_level_of_equal_type: u32,
    /// Smallest visible indentation inside the pair. Only computed on request;
    /// `None` also when every line inside is blank.
    pub min_indentation: Option<u32>,
    pub opening: BracketKind,
    pub closing: Option<BracketKind>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundBracket {
    pub range: TextRange,
    pub kind: BracketKind,
}

/// Result of a match lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BracketMatch {
    pub opening: TextRange,
    /// `None` when the pair is unterminated.
    pub closing: Option<TextRange>,
}

/// Visits every bracket leaf overlapping `[start, end)` in document order.
pub fn collect_brackets(
    root: &AstNode,
    start: Length,
    end: Length,
    only_colorized: bool,
    visit: &mut dyn FnMut(BracketInfo) -> ControlFlow<()>,
) -> ControlFlow<()> {
    let mut collector = BracketCollector {
        start,
        end,
        only_colorized,
        level_per_type: HashMap::new(),
        visit,
    };
    collector.collect(root, Length::ZERO, root.length(), 0, 0, 0)
}

#[must_use]
pub fn brackets_in_range(root: &AstNode, start: Length, end: Length, only_colorized: bool) -> Vec<BracketInfo> {
    let mut result = Vec::new();
    let _ = collect_brackets(root, start, end, only_colorized, &mut |info| {
        result.push(info);
        ControlFlow::Continue(())
    });
    result
}

struct BracketCollector<'n, 'v> {
    start: Length,
    end: Length,
    only_colorized: bool,
    level_per_type: HashMap<&'n str, u32>,
    visit: &'v mut dyn FnMut(BracketInfo) -> ControlFlow<()>,
}

impl<'n> BracketCollector<'n, '_> {
    fn overlaps(&self, start: Length, end: Length) -> bool {
        start <= self.end && end >= self.start
    }

    fn collect(
        &mut self,
        node: &'n AstNode,
        start: Length,
        end: Length,
        level: u32,
        nesting: u32,
        depth: u32,
    ) -> ControlFlow<()> {
        // `depth` counts every enclosing pair, `level` only the colorized ones.
        let (mut node, mut start, mut end) = (node, start, end);
        let (mut level, mut nesting, mut depth) = (level, nesting, depth);
        loop {
            if depth > MAX_QUERY_DEPTH {
                return ControlFlow::Continue(());
            }
            match node {
                AstNode::List(list) => {
                    let mut child_start = start;
                    let mut tail = None;
                    for child in list.children() {
                        let child_end = child_start + child.length();
                        if self.overlaps(child_start, child_end) {
                            if child_end >= self.end {
                                tail = Some((child.as_ref(), child_start, child_end));
                                break;
                            }
                            self.collect(child, child_start, child_end, level, 0, depth)?;
                        }
                        child_start = child_end;
                    }
                    let Some(next) = tail else {
                        return ControlFlow::Continue(());
                    };
                    (node, start, end) = next;
                }
                AstNode::Pair(pair) => {
                    let colorize = self.colorize(pair);
                    let text = pair.opening_bracket().kind.text();
                    let level_per_bracket = self.level_per_type.get(text).copied().unwrap_or(0);
                    if colorize {
                        self.level_per_type.insert(text, level_per_bracket + 1);
                    }
                    let (child_level, child_nesting) = if colorize {
                        (level + 1, level_per_bracket + 1)
                    } else {
                        (level, level_per_bracket)
                    };

                    let mut child_start = start;
                    let mut tail = None;
                    for child in pair_slots(pair) {
                        let child_end = child_start + child.length();
                        if self.overlaps(child_start, child_end) {
                            let is_bracket = matches!(child, AstNode::Bracket(_));
                            if child_end >= self.end && !is_bracket {
                                tail = Some((child, child_start, child_end));
                                break;
                            }
                            if colorize || !is_bracket {
                                self.collect(child, child_start, child_end, child_level, child_nesting, depth + 1)?;
                            }
                        }
                        child_start = child_end;
                    }
                    match tail {
                        Some(next) => {
                            (node, start, end) = next;
                            (level, nesting, depth) = (child_level, child_nesting, depth + 1);
                        }
                        None => {
                            self.level_per_type.insert(text, level_per_bracket);
                            return ControlFlow::Continue(());
                        }
                    }
                }
                AstNode::InvalidBracket(_) => {
                    return (self.visit)(BracketInfo {
                        range: start.to_range(end),
                        level: level as i32 - 1,
                        nesting_level_of_equal_type: 0,
                        is_invalid: true,
                        kind: None,
                    });
                }
                AstNode::Bracket(bracket) => {
                    return (self.visit)(BracketInfo {
                        range: start.to_range(end),
                        level: level as i32 - 1,
                        nesting_level_of_equal_type: nesting as i32 - 1,
                        is_invalid: false,
                        kind: Some(bracket.kind.clone()),
                    });
                }
                AstNode::Text(_) => return ControlFlow::Continue(()),
            }
        }
    }

    fn colorize(&self, pair: &PairNode) -> bool {
        if !self.only_colorized {
            return true;
        }
        let Some(closing) = pair.closing_bracket() else {
            return true;
        };
        match (closing.kind.as_closing(), pair.opening_bracket().kind.as_opening()) {
            (Some(closing), Some(opening)) => closing.closes_colorized(opening),
            _ => false,
        }
    }
}

fn pair_slots(pair: &PairNode) -> impl Iterator<Item = &AstNode> {
    std::iter::once(pair.opening.as_ref())
        .chain(pair.child.as_deref())
        .chain(pair.closing.as_deref())
}

/// Visits every pair overlapping `[start, end)`, outer pairs first.
///
/// With `content`, each record carries the pair's minimum indentation.
pub fn collect_bracket_pairs(
    root: &AstNode,
    start: Length,
    end: Length,
    content: Option<&dyn ContentAccessor>,
    visit: &mut dyn FnMut(BracketPairInfo) -> ControlFlow<()>,
) -> ControlFlow<()> {
    let mut collector = PairCollector {
        start,
        end,
        content,
        level_per_type: HashMap::new(),
        visit,
    };
    collector.collect(root, Length::ZERO, root.length(), 0)
}

#[must_use]
pub fn bracket_pairs_in_range(
    root: &AstNode,
    start: Length,
    end: Length,
    content: Option<&dyn ContentAccessor>,
) -> Vec<BracketPairInfo> {
    let mut result = Vec::new();
    let _ = collect_bracket_pairs(root, start, end, content, &mut |info| {
        result.push(info);
        ControlFlow::Continue(())
    });
    result
}

struct PairCollector<'n, 'c, 'v> {
    start: Length,
    end: Length,
    content: Option<&'c dyn ContentAccessor>,
    level_per_type: HashMap<&'n str, u32>,
    visit: &'v mut dyn FnMut(BracketPairInfo) -> ControlFlow<()>,
}

impl<'n> PairCollector<'n, '_, '_> {
    fn collect(&mut self, node: &'n AstNode, start: Length, end: Length, level: u32) -> ControlFlow<()> {
        if level > MAX_QUERY_DEPTH {
            return ControlFlow::Continue(());
        }

        let AstNode::Pair(pair) = node else {
            let mut child_start = start;
            for child in node.children() {
                let child_end = child_start + child.length();
                if child_start <= self.end && self.start <= child_end {
                    self.collect(child, child_start, child_end, level)?;
                }
                child_start = child_end;
            }
            return ControlFlow::Continue(());
        };

        let opening = pair.opening_bracket();
        let text = opening.kind.text();
        let level_per_bracket = self.level_per_type.get(text).copied().unwrap_or(0);
        self.level_per_type.insert(text, level_per_bracket + 1);

        let opening_end = start + opening.length;
        let child_length = pair.child.as_ref().map_or(Length::ZERO, |child| child.length());
        let min_indentation = self
            .content
            .map(|content| pair.compute_min_indentation(start, content))
            .filter(|&indentation| indentation != NO_INDENTATION);

        (self.visit)(BracketPairInfo {
            range: start.to_range(end),
            opening_range: start.to_range(opening_end),
            closing_range: pair.closing.as_ref().map(|_| (opening_end + child_length).to_range(end)),
            level,
            nesting_level_of_equal_type: level_per_bracket,
            min_indentation,
            opening: opening.kind.clone(),
            closing: pair.closing_bracket().map(|closing| closing.kind.clone()),
        })?;

        if let Some(child) = &pair.child {
            let child_end = opening_end + child.length();
            if opening_end <= self.end && child_end >= self.start {
                self.collect(child, opening_end, child_end, level + 1)?;
            }
        }

        self.level_per_type.insert(text, level_per_bracket);
        ControlFlow::Continue(())
    }
}

/// The nearest bracket leaf that starts before `position`.
#[must_use]
pub fn first_bracket_before(root: &AstNode, position: Length) -> Option<FoundBracket> {
    bracket_before(root, Length::ZERO, root.length(), position, 0)
}

fn bracket_before(node: &AstNode, start: Length, end: Length, position: Length, depth: u32) -> Option<FoundBracket> {
    match node {
        AstNode::List(_) | AstNode::Pair(_) => {
            if depth > MAX_QUERY_DEPTH {
                return None;
            }
            let child_depth = depth + u32::from(matches!(node, AstNode::Pair(_)));
            let mut bounds = Vec::with_capacity(node.child_count());
            let mut child_start = start;
            for child in node.children() {
                let child_end = child_start + child.length();
                bounds.push((child, child_start, child_end));
                child_start = child_end;
            }
            bounds
                .into_iter()
                .rev()
                .filter(|(_, child_start, _)| *child_start < position)
                .find_map(|(child, child_start, child_end)| {
                    bracket_before(child, child_start, child_end, position, child_depth)
                })
        }
        AstNode::Bracket(bracket) => Some(FoundBracket {
            range: start.to_range(end),
            kind: bracket.kind.clone(),
        }),
        AstNode::InvalidBracket(_) | AstNode::Text(_) => None,
    }
}

/// The nearest bracket leaf that ends after `position`.
#[must_use]
pub fn first_bracket_after(root: &AstNode, position: Length) -> Option<FoundBracket> {
    bracket_after(root, Length::ZERO, root.length(), position, 0)
}

fn bracket_after(node: &AstNode, start: Length, end: Length, position: Length, depth: u32) -> Option<FoundBracket> {
    match node {
        AstNode::List(_) | AstNode::Pair(_) => {
            if depth > MAX_QUERY_DEPTH {
                return None;
            }
            let child_depth = depth + u32::from(matches!(node, AstNode::Pair(_)));
            let mut child_start = start;
            for child in node.children() {
                let child_end = child_start + child.length();
                if position < child_end
                    && let Some(found) = bracket_after(child, child_start, child_end, position, child_depth)
                {
                    return Some(found);
                }
                child_start = child_end;
            }
            None
        }
        // A closer without opener is a dead end, not a result.
        AstNode::InvalidBracket(_) => None,
        AstNode::Bracket(bracket) => Some(FoundBracket {
            range: start.to_range(end),
            kind: bracket.kind.clone(),
        }),
        AstNode::Text(_) => None,
    }
}

/// The pair whose opening or closing bracket covers `position`.
#[must_use]
pub fn match_bracket_at(root: &AstNode, position: Position) -> Option<BracketMatch> {
    let start = Length::from(position);
    let end = Length::new(position.line, position.column + 1);
    let mut found = None;
    let _ = collect_bracket_pairs(root, start, end, None, &mut |pair| {
        let hits_closing = pair.closing_range.is_some_and(|range| range.contains(position));
        if pair.opening_range.contains(position) || hits_closing {
            found = Some(BracketMatch {
                opening: pair.opening_range,
                closing: pair.closing_range,
            });
            return ControlFlow::Break(());
        }
        ControlFlow::Continue(())
    });
    found
}

/// Opening and closing ranges of the innermost closed pair strictly around `position`.
#[must_use]
pub fn find_enclosing_brackets(root: &AstNode, position: Position) -> Option<(TextRange, TextRange)> {
    let offset = Length::from(position);
    let mut innermost = None;
    let _ = collect_bracket_pairs(root, offset, offset, None, &mut |pair| {
        if let Some(closing) = pair.closing_range
            && pair.range.strictly_contains(position)
        {
            innermost = Some((pair.opening_range, closing));
        }
        ControlFlow::Continue(())
    });
    innermost
}
