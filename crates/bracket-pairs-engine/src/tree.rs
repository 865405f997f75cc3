//! The bracket pair tree shared between an editing thread and readers.
//!
//! [`BracketPairsTree`] owns up to two trees:
//!
//! - a tree built from raw text before any classification is available, so
//!   brackets show up immediately after a document is opened;
//! - a tree built from the classified span stream, which ignores brackets
//!   inside strings and comments.
//!
//! Edits only queue work. [`BracketPairsTree::flush`] folds the queued edits
//! into new trees, reusing every subtree the edits did not touch. Queries read
//! the untokenized tree while it exists and the classified one afterwards.

use std::mem;
use std::ops::{ControlFlow, RangeInclusive};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::ast::{AstNode, Node};
use crate::brackets::BracketTokens;
use crate::content::{ContentAccessor, ContentSnapshot, ContentSnapshotProvider, PlainSpans, TokenSpans};
use crate::edits::{TextEditInfo, combine_text_edit_infos};
use crate::length::Length;
use crate::parser::{ParseStats, parse_document};
use crate::position::{Position, TextRange};
use crate::query::{self, BracketInfo, BracketMatch, BracketPairInfo, FoundBracket};
use crate::tokenizer::{ClassifiedTokenizer, FastTokenizer};

#[derive(Default)]
struct TreeState {
    initial_ast_without_tokens: Option<Node>,
    ast_with_tokens: Option<Node>,
    queued_edits_for_initial: Vec<TextEditInfo>,
    queued_edits: Vec<TextEditInfo>,
    content: Option<Arc<dyn ContentAccessor>>,
    expected_version: Option<u64>,
    stats: ParseStats,
}

impl TreeState {
    fn queue_edits(&mut self, edits: &[TextEditInfo], include_initial: bool) {
        self.queued_edits = combine_text_edit_infos(&self.queued_edits, edits);
        if include_initial && self.initial_ast_without_tokens.is_some() {
            self.queued_edits_for_initial = combine_text_edit_infos(&self.queued_edits_for_initial, edits);
        }
    }

    fn current(&self) -> Option<&Node> {
        self.initial_ast_without_tokens
            .as_ref()
            .or(self.ast_with_tokens.as_ref())
    }
}

/// One reparse of one tree.
struct ParseJob {
    previous: Option<Node>,
    edits: Vec<TextEditInfo>,
}

struct FlushWork {
    snapshot: ContentSnapshot,
    ast: Option<ParseJob>,
    initial: Option<ParseJob>,
}

struct FlushResult {
    version: u64,
    content: Arc<dyn ContentAccessor>,
    ast: Option<(Node, ParseStats)>,
    initial: Option<(Node, ParseStats)>,
}

/// Incrementally maintained bracket pairs of one document.
pub struct BracketPairsTree {
    provider: Arc<dyn ContentSnapshotProvider>,
    brackets: Arc<BracketTokens>,
    state: RwLock<TreeState>,
    dirty: AtomicBool,
    flush_lock: Mutex<()>,
}

impl BracketPairsTree {
    /// Parses the provider's current content right away.
    ///
    /// Without a classification the text is scanned directly and the result
    /// is kept as the untokenized tree until
    /// [`handle_tokenization_completed`](Self::handle_tokenization_completed).
    pub fn new(provider: Arc<dyn ContentSnapshotProvider>, brackets: Arc<BracketTokens>) -> Self {
        let tree = Self {
            provider,
            brackets,
            state: RwLock::new(TreeState::default()),
            dirty: AtomicBool::new(false),
            flush_lock: Mutex::new(()),
        };
        tree.init();
        tree
    }

    fn init(&self) {
        let _flushing = self.flush_lock.lock();
        let Some(snapshot) = self.provider.snapshot() else {
            return;
        };
        let (root, stats) = self.parse(&snapshot, snapshot.spans.as_deref(), ParseJob::fresh());

        let mut state = self.state.write();
        if snapshot.spans.is_none() {
            state.initial_ast_without_tokens = Some(root.clone());
        }
        state.ast_with_tokens = Some(root);
        state.expected_version = Some(snapshot.version());
        state.content = Some(snapshot.content);
        state.stats = stats;
        debug!(
            constructed = stats.nodes_constructed,
            tokenized = snapshot.spans.is_some(),
            "built initial bracket tree"
        );
    }

    /// Queues the replacement of `[start, end)` with `text`.
    ///
    /// The content behind the provider must already contain the edit, and no
    /// flush may run between that change and this call. Use
    /// [`apply_edit`](Self::apply_edit) when the tree should enforce this.
    pub fn handle_content_changed(&self, start: Position, end: Position, text: &str) {
        let edit = TextEditInfo::replace(start, end, text);
        self.state.write().queue_edits(&[edit], true);
        self.dirty.store(true, Ordering::Release);
    }

    /// Runs `apply` (which must change the content the same way) and queues
    /// the edit as one step, so a concurrent flush sees both or neither.
    pub fn apply_edit(&self, start: Position, end: Position, text: &str, apply: impl FnOnce()) {
        let edit = TextEditInfo::replace(start, end, text);
        let mut state = self.state.write();
        apply();
        state.queue_edits(&[edit], true);
        self.dirty.store(true, Ordering::Release);
    }

    /// Queues a reparse of re-classified lines (inclusive line ranges) in the
    /// classified tree. The text itself is unchanged.
    pub fn handle_tokens_changed(&self, lines: &[RangeInclusive<u32>]) {
        let mut ranges: Vec<(u32, u32)> = lines
            .iter()
            .filter(|range| !range.is_empty())
            .map(|range| (*range.start(), *range.end()))
            .collect();
        ranges.sort_unstable();

        let mut merged: Vec<(u32, u32)> = Vec::with_capacity(ranges.len());
        for (from, to) in ranges {
            match merged.last_mut() {
                Some(last) if from <= last.1.saturating_add(1) => last.1 = last.1.max(to),
                _ => merged.push((from, to)),
            }
        }
        if merged.is_empty() {
            return;
        }

        let edits: Vec<TextEditInfo> = merged
            .into_iter()
            .map(|(from, to)| {
                let end = to.saturating_add(1);
                TextEditInfo::new(Length::new(from, 0), Length::new(end, 0), Length::new(end - from, 0))
            })
            .collect();

        let mut state = self.state.write();
        if state.ast_with_tokens.is_some() {
            state.queue_edits(&edits, false);
            self.dirty.store(true, Ordering::Release);
        }
    }

    /// Drops the untokenized tree; queries switch to the classified one.
    pub fn handle_tokenization_completed(&self) {
        let mut state = self.state.write();
        state.initial_ast_without_tokens = None;
        state.queued_edits_for_initial.clear();
    }

    /// Brings the trees up to date with the provider's content.
    ///
    /// Parsing happens outside the state lock, so queries keep answering from
    /// the previous trees (with a version mismatch) in the meantime. Edits that
    /// arrive during a parse are picked up by another round.
    pub fn flush(&self) {
        let _flushing = self.flush_lock.lock();
        while let Some(work) = self.take_work() {
            let result = self.run(work);
            self.install(result);
        }
    }

    fn take_work(&self) -> Option<FlushWork> {
        let mut state = self.state.write();
        // Taken under the lock: every queued edit is already in the snapshot.
        let snapshot = self.provider.snapshot()?;
        let version_moved = state.expected_version != Some(snapshot.version());
        self.dirty.store(false, Ordering::Release);

        // Content that moved without any queued edit cannot be mapped; start over.
        let ast = if state.ast_with_tokens.is_none() || !state.queued_edits.is_empty() || version_moved {
            let resync = state.queued_edits.is_empty();
            Some(ParseJob {
                previous: if resync { None } else { state.ast_with_tokens.clone() },
                edits: mem::take(&mut state.queued_edits),
            })
        } else {
            None
        };

        let initial = if state.initial_ast_without_tokens.is_some()
            && (!state.queued_edits_for_initial.is_empty() || version_moved)
        {
            let resync = state.queued_edits_for_initial.is_empty();
            Some(ParseJob {
                previous: if resync {
                    None
                } else {
                    state.initial_ast_without_tokens.clone()
                },
                edits: mem::take(&mut state.queued_edits_for_initial),
            })
        } else {
            None
        };

        if ast.is_none() && initial.is_none() {
            return None;
        }
        Some(FlushWork { snapshot, ast, initial })
    }

    fn run(&self, work: FlushWork) -> FlushResult {
        let FlushWork { snapshot, ast, initial } = work;

        let (ast, initial) = match (ast, initial) {
            // Without a classification both trees see the same input.
            (Some(ast), Some(initial)) if snapshot.spans.is_none() && ast.same_input(&initial) => {
                let parsed = self.parse(&snapshot, None, ast);
                (Some(parsed.clone()), Some(parsed))
            }
            (ast, initial) => (
                ast.map(|job| self.parse(&snapshot, snapshot.spans.as_deref(), job)),
                initial.map(|job| self.parse(&snapshot, None, job)),
            ),
        };

        FlushResult {
            version: snapshot.version(),
            content: snapshot.content,
            ast,
            initial,
        }
    }

    fn install(&self, result: FlushResult) {
        let mut state = self.state.write();
        if let Some((root, stats)) = result.ast {
            state.ast_with_tokens = Some(root);
            state.stats = stats;
            debug!(
                constructed = stats.nodes_constructed,
                reused = stats.nodes_reused,
                version = result.version,
                "reparsed classified bracket tree"
            );
        }
        if let Some((root, stats)) = result.initial {
            // Tokenization may have completed while parsing.
            if state.initial_ast_without_tokens.is_some() {
                state.initial_ast_without_tokens = Some(root);
                state.stats = stats;
                debug!(
                    constructed = stats.nodes_constructed,
                    reused = stats.nodes_reused,
                    version = result.version,
                    "reparsed untokenized bracket tree"
                );
            }
        }
        state.expected_version = Some(result.version);
        state.content = Some(result.content);
    }

    fn parse(&self, snapshot: &ContentSnapshot, spans: Option<&dyn TokenSpans>, job: ParseJob) -> (Node, ParseStats) {
        let content = snapshot.content.as_ref();
        match (spans, job.previous) {
            (None, None) => parse_document(&mut FastTokenizer::new(&content.text(), &self.brackets), &[], None),
            (spans, previous) => {
                let spans = spans.unwrap_or(&PlainSpans);
                let mut tokenizer = ClassifiedTokenizer::new(content, spans, &self.brackets);
                parse_document(&mut tokenizer, &job.edits, previous)
            }
        }
    }

    /// Runs `query` against the current tree and the content it was built
    /// from, or returns `None` when the tree does not match the live content.
    pub(crate) fn with_current<R>(&self, query: impl FnOnce(&AstNode, Option<&dyn ContentAccessor>) -> R) -> Option<R> {
        let state = self.state.read();
        let root = state.current()?;
        if self.provider.version() != state.expected_version {
            self.dirty.store(true, Ordering::Release);
            return None;
        }
        Some(query(root.as_ref(), state.content.as_deref()))
    }

    /// Visits brackets overlapping `range`. Returns `None` when the tree is stale.
    pub fn visit_brackets_in_range(
        &self,
        range: TextRange,
        only_colorized: bool,
        visit: &mut dyn FnMut(BracketInfo) -> ControlFlow<()>,
    ) -> Option<ControlFlow<()>> {
        self.with_current(|root, _| {
            query::collect_brackets(root, range.start.into(), range.end.into(), only_colorized, visit)
        })
    }

    #[must_use]
    pub fn brackets_in_range(&self, range: TextRange, only_colorized: bool) -> Vec<BracketInfo> {
        self.with_current(|root, _| query::brackets_in_range(root, range.start.into(), range.end.into(), only_colorized))
            .unwrap_or_default()
    }

    /// Visits pairs overlapping `range`, outer pairs first. Returns `None` when the tree is stale.
    pub fn visit_bracket_pairs_in_range(
        &self,
        range: TextRange,
        include_min_indentation: bool,
        visit: &mut dyn FnMut(BracketPairInfo) -> ControlFlow<()>,
    ) -> Option<ControlFlow<()>> {
        self.with_current(|root, content| {
            let content = content.filter(|_| include_min_indentation);
            query::collect_bracket_pairs(root, range.start.into(), range.end.into(), content, visit)
        })
    }

    #[must_use]
    pub fn bracket_pairs_in_range(&self, range: TextRange, include_min_indentation: bool) -> Vec<BracketPairInfo> {
        self.with_current(|root, content| {
            let content = content.filter(|_| include_min_indentation);
            query::bracket_pairs_in_range(root, range.start.into(), range.end.into(), content)
        })
        .unwrap_or_default()
    }

    #[must_use]
    pub fn first_bracket_before(&self, position: Position) -> Option<FoundBracket> {
        self.with_current(|root, _| query::first_bracket_before(root, position.into()))
            .flatten()
    }

    #[must_use]
    pub fn first_bracket_after(&self, position: Position) -> Option<FoundBracket> {
        self.with_current(|root, _| query::first_bracket_after(root, position.into()))
            .flatten()
    }

    #[must_use]
    pub fn match_bracket_at(&self, position: Position) -> Option<BracketMatch> {
        self.with_current(|root, _| query::match_bracket_at(root, position))
            .flatten()
    }

    #[must_use]
    pub fn find_enclosing_brackets(&self, position: Position) -> Option<(TextRange, TextRange)> {
        self.with_current(|root, _| query::find_enclosing_brackets(root, position))
            .flatten()
    }

    /// Counters of the most recent parse.
    #[must_use]
    pub fn stats(&self) -> ParseStats {
        self.state.read().stats
    }

    /// The tree queries currently read, regardless of staleness.
    #[must_use]
    pub fn root(&self) -> Option<Node> {
        self.state.read().current().cloned()
    }

    /// True while edits are queued or a query saw a stale tree.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn has_untokenized_tree(&self) -> bool {
        self.state.read().initial_ast_without_tokens.is_some()
    }

    #[must_use]
    pub fn brackets(&self) -> &BracketTokens {
        &self.brackets
    }
}

impl ParseJob {
    fn fresh() -> Self {
        Self {
            previous: None,
            edits: Vec::new(),
        }
    }

    fn same_input(&self, other: &ParseJob) -> bool {
        let same_tree = match (&self.previous, &other.previous) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        };
        same_tree && self.edits == other.edits
    }
}
