use std::ops::RangeInclusive;
use std::sync::Arc;

use crate::brackets::{BracketTokens, BracketsConfiguration};
use crate::content::{ContentAccessor, SharedDocument, TextDocument, TokenSpans};
use crate::error::Result;
use crate::parser::ParseStats;
use crate::position::{Position, TextRange};
use crate::provider::TreeBracketPairProvider;
use crate::query::{BracketInfo, BracketMatch, BracketPairInfo, FoundBracket};
use crate::tree::BracketPairsTree;
use crate::worker::AsyncBracketsCollector;

/// A document together with its bracket tree.
///
/// Edits go through [`apply_edit`](Self::apply_edit), which changes the
/// document and queues the edit for the tree in one step. Queries see an
/// edit once [`flush`](Self::flush) has run.
pub struct BracketSession {
    document: SharedDocument,
    tree: Arc<BracketPairsTree>,
}

impl BracketSession {
    pub fn new(document: TextDocument, configuration: &BracketsConfiguration) -> Result<Self> {
        let brackets = Arc::new(BracketTokens::new(configuration)?);
        Ok(Self::with_brackets(document, brackets))
    }

    pub fn with_brackets(document: TextDocument, brackets: Arc<BracketTokens>) -> Self {
        let document = SharedDocument::new(document);
        let tree = Arc::new(BracketPairsTree::new(Arc::new(document.clone()), brackets));
        Self { document, tree }
    }

    /// Builds the tree straight from an existing classification, skipping
    /// the untokenized tree.
    pub fn with_spans(document: TextDocument, spans: Arc<dyn TokenSpans>, brackets: Arc<BracketTokens>) -> Self {
        let document = SharedDocument::new(document);
        document.set_spans(Some(spans));
        let tree = Arc::new(BracketPairsTree::new(Arc::new(document.clone()), brackets));
        Self { document, tree }
    }

    pub fn document(&self) -> &SharedDocument {
        &self.document
    }

    pub fn tree(&self) -> &Arc<BracketPairsTree> {
        &self.tree
    }

    /// Replaces `[start, end)` with `text`.
    pub fn apply_edit(&self, start: Position, end: Position, text: &str) {
        self.tree
            .apply_edit(start, end, text, || self.document.replace(start, end, text));
    }

    /// Installs a new classification and reparses the re-classified lines on
    /// the next flush.
    pub fn update_spans(&self, spans: Arc<dyn TokenSpans>, changed_lines: &[RangeInclusive<u32>]) {
        self.document.set_spans(Some(spans));
        self.tree.handle_tokens_changed(changed_lines);
    }

    /// Switches queries to the classified tree.
    pub fn tokenization_completed(&self) {
        self.tree.handle_tokenization_completed();
    }

    pub fn flush(&self) {
        self.tree.flush();
    }

    /// Starts a background collector answering offset based lookups.
    pub fn spawn_collector(&self, name_prefix: &str) -> Result<AsyncBracketsCollector> {
        let provider = TreeBracketPairProvider::new(Arc::clone(&self.tree));
        AsyncBracketsCollector::new(name_prefix, Arc::new(provider))
    }

    #[must_use]
    pub fn brackets_in_range(&self, range: TextRange, only_colorized: bool) -> Vec<BracketInfo> {
        self.tree.brackets_in_range(range, only_colorized)
    }

    #[must_use]
    pub fn bracket_pairs_in_range(&self, range: TextRange, include_min_indentation: bool) -> Vec<BracketPairInfo> {
        self.tree.bracket_pairs_in_range(range, include_min_indentation)
    }

    #[must_use]
    pub fn first_bracket_before(&self, position: Position) -> Option<FoundBracket> {
        self.tree.first_bracket_before(position)
    }

    #[must_use]
    pub fn first_bracket_after(&self, position: Position) -> Option<FoundBracket> {
        self.tree.first_bracket_after(position)
    }

    #[must_use]
    pub fn match_bracket_at(&self, position: Position) -> Option<BracketMatch> {
        self.tree.match_bracket_at(position)
    }

    #[must_use]
    pub fn find_enclosing_brackets(&self, position: Position) -> Option<(TextRange, TextRange)> {
        self.tree.find_enclosing_brackets(position)
    }

    #[must_use]
    pub fn stats(&self) -> ParseStats {
        self.tree.stats()
    }

    /// The whole document as one range.
    #[must_use]
    pub fn full_range(&self) -> TextRange {
        let end = self.document.with_document(|document| document.end_position());
        TextRange::new(Position::default(), end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brackets::RawBracketsConfiguration;
    use crate::content::{SpanKind, SpanTable};
    use pretty_assertions::assert_eq;

    fn session(text: &str) -> BracketSession {
        let raw = RawBracketsConfiguration::new([("(", ")"), ("[", "]")]);
        BracketSession::new(TextDocument::new(text), &BracketsConfiguration::new(&raw)).unwrap()
    }

    #[test]
    fn edits_are_visible_after_flush() {
        let session = session("(a)");
        session.apply_edit(Position::new(0, 3), Position::new(0, 3), "[b]");
        assert!(session.bracket_pairs_in_range(session.full_range(), false).is_empty());
        session.flush();
        assert_eq!(session.bracket_pairs_in_range(session.full_range(), false).len(), 2);
        assert_eq!(session.document().document().to_bytes(), b"(a)[b]");
    }

    #[test]
    fn existing_spans_are_used_from_the_start() {
        let mut spans = SpanTable::default();
        spans.mark(0, 2, 5, SpanKind::String);
        let raw = RawBracketsConfiguration::new([("(", ")"), ("[", "]")]);
        let brackets = Arc::new(BracketTokens::new(&BracketsConfiguration::new(&raw)).unwrap());
        let session = BracketSession::with_spans(TextDocument::new("f(\"(\", x)"), Arc::new(spans), brackets);

        let pairs = session.bracket_pairs_in_range(session.full_range(), false);
        assert_eq!(pairs.len(), 1);
        assert_eq!(
            pairs[0].closing_range,
            Some(TextRange::new(Position::new(0, 8), Position::new(0, 9)))
        );
        assert!(!session.tree().has_untokenized_tree());
    }

    #[test]
    fn full_range_ends_at_last_column() {
        let session = session("ab\ncde");
        assert_eq!(
            session.full_range(),
            TextRange::new(Position::new(0, 0), Position::new(1, 3))
        );
    }

    #[test]
    fn collector_answers_by_offset() {
        let session = session("x(y)");
        let collector = session.spawn_collector("session-test").unwrap();
        collector.request_paired_bracket_at(3).unwrap();
        for _ in 0..500 {
            if collector.last_matched_pair().is_some() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        let pair = collector.last_matched_pair().unwrap();
        assert_eq!((pair.left_index, pair.right_index), (1, 3));
    }
}
