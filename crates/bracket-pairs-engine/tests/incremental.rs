use std::ops::RangeInclusive;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bracket_pairs_engine::ast::AstNode;
use bracket_pairs_engine::{
    BracketInfo, BracketPairInfo, BracketSession, BracketTokens, BracketsConfiguration, ClassifiedSpan, FoundBracket,
    Length, Position, RawBracketsConfiguration, SpanKind, SpanTable, TextDocument,
};
use pretty_assertions::assert_eq;
use rstest::rstest;

fn brackets() -> Arc<BracketTokens> {
    let raw = RawBracketsConfiguration::new([("(", ")"), ("[", "]"), ("{", "}"), ("begin", "end")]);
    Arc::new(BracketTokens::new(&BracketsConfiguration::new(&raw)).unwrap())
}

/// Deterministic xorshift, enough to script edits.
struct Rng(u64);

impl Rng {
    fn next(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }

    fn below(&mut self, bound: usize) -> usize {
        (self.next() % bound.max(1) as u64) as usize
    }

    fn text(&mut self, max_len: usize) -> String {
        self.text_from(PIECES, max_len)
    }

    fn text_from(&mut self, pieces: &[&str], max_len: usize) -> String {
        (0..self.below(max_len + 1))
            .map(|_| pieces[self.below(pieces.len())])
            .collect()
    }
}

const PIECES: &[&str] = &["(", ")", "[", "]", "{", "}", "a", " ", "\n", "  ", "begin", "end", "x\n  "];
const COMMENTED_PIECES: &[&str] = &["(", ")", "[", "]", "{", "}", "a", " ", "\n", "  ", "#", "# (", "end", "x\n  "];

/// Everything from `#` to the end of a line is a comment.
fn classify(text: &str) -> Arc<SpanTable> {
    let lines = text
        .split('\n')
        .map(|line| match line.find('#') {
            Some(0) => vec![ClassifiedSpan::new(0, SpanKind::Comment)],
            Some(column) => vec![
                ClassifiedSpan::new(0, SpanKind::Other),
                ClassifiedSpan::new(column as u32, SpanKind::Comment),
            ],
            None => Vec::new(),
        })
        .collect();
    Arc::new(SpanTable::new(lines))
}

fn all_lines(text: &str) -> RangeInclusive<u32> {
    0..=text.matches('\n').count() as u32
}

fn position_of(text: &str, offset: usize) -> Position {
    let before = &text[..offset];
    let line = before.matches('\n').count() as u32;
    let column = before.rfind('\n').map_or(offset, |idx| offset - idx - 1) as u32;
    Position::new(line, column)
}

#[derive(Debug, PartialEq)]
struct Answers {
    brackets: Vec<BracketInfo>,
    pairs: Vec<BracketPairInfo>,
    before: Vec<Option<FoundBracket>>,
    after: Vec<Option<FoundBracket>>,
}

fn answers(session: &BracketSession) -> Answers {
    let range = session.full_range();
    let probes: Vec<Position> = (0..=range.end.line)
        .flat_map(|line| [0, 1, 3, 6].map(|column| Position::new(line, column)))
        .collect();
    Answers {
        brackets: session.brackets_in_range(range, false),
        pairs: session.bracket_pairs_in_range(range, true),
        before: probes.iter().map(|&p| session.first_bracket_before(p)).collect(),
        after: probes.iter().map(|&p| session.first_bracket_after(p)).collect(),
    }
}

fn assert_lengths_add_up(node: &AstNode) {
    if matches!(node, AstNode::List(_) | AstNode::Pair(_)) {
        let sum = node.children().fold(Length::ZERO, |acc, child| acc + child.length());
        assert_eq!(sum, node.length());
    }
    for child in node.children() {
        assert_lengths_add_up(child);
    }
}

fn replay(seed: u64, steps: usize, edits_per_flush: usize) {
    let mut rng = Rng(seed);
    let mut text = rng.text(60);
    let session = BracketSession::with_brackets(TextDocument::new(&text), brackets());

    for step in 0..steps {
        let start = rng.below(text.len() + 1);
        let end = (start + rng.below(4)).min(text.len());
        let insert = rng.text(3);

        session.apply_edit(position_of(&text, start), position_of(&text, end), &insert);
        text.replace_range(start..end, &insert);

        if (step + 1) % edits_per_flush != 0 {
            continue;
        }
        session.flush();

        let root = session.tree().root().unwrap();
        assert_lengths_add_up(&root);
        assert_eq!(root.length(), Length::of_str(&text));

        let fresh = BracketSession::with_brackets(TextDocument::new(&text), brackets());
        assert_eq!(answers(&session), answers(&fresh), "seed {seed}, step {step}, text {text:?}");
    }
}

#[rstest]
#[case(0x9e37_79b9_7f4a_7c15, 1)]
#[case(0x2545_f491_4f6c_dd1d, 1)]
#[case(0x1234_5678_9abc_def1, 3)]
#[case(0xdead_beef_cafe_f00d, 7)]
fn incremental_matches_from_scratch(#[case] seed: u64, #[case] edits_per_flush: usize) {
    replay(seed, 150, edits_per_flush);
}

fn replay_classified(seed: u64, steps: usize, edits_per_flush: usize) {
    let mut rng = Rng(seed);
    let mut text = rng.text_from(COMMENTED_PIECES, 60);
    let session = BracketSession::with_brackets(TextDocument::new(&text), brackets());
    session.update_spans(classify(&text), &[all_lines(&text)]);
    session.tokenization_completed();
    session.flush();

    for step in 0..steps {
        let start = rng.below(text.len() + 1);
        let end = (start + rng.below(4)).min(text.len());
        let insert = rng.text_from(COMMENTED_PIECES, 3);

        let from = position_of(&text, start);
        session.apply_edit(from, position_of(&text, end), &insert);
        text.replace_range(start..end, &insert);

        let to = from.line + insert.matches('\n').count() as u32;
        session.update_spans(classify(&text), &[from.line..=to]);

        if (step + 1) % edits_per_flush != 0 {
            continue;
        }
        session.flush();

        let root = session.tree().root().unwrap();
        assert_lengths_add_up(&root);
        assert_eq!(root.length(), Length::of_str(&text));

        let fresh = BracketSession::with_spans(TextDocument::new(&text), classify(&text), brackets());
        assert_eq!(answers(&session), answers(&fresh), "seed {seed}, step {step}, text {text:?}");
    }
}

#[rstest]
#[case(0x9e37_79b9_7f4a_7c15, 1)]
#[case(0x6a09_e667_f3bc_c908, 1)]
#[case(0xbb67_ae85_84ca_a73b, 2)]
#[case(0x3c6e_f372_fe94_f82b, 5)]
fn classified_incremental_matches_from_scratch(#[case] seed: u64, #[case] edits_per_flush: usize) {
    replay_classified(seed, 200, edits_per_flush);
}

#[test]
fn typing_a_comment_marker_hides_brackets() {
    let text = "f(a) g[b]\nh{c}";
    let session = BracketSession::with_brackets(TextDocument::new(text), brackets());
    session.update_spans(classify(text), &[all_lines(text)]);
    session.tokenization_completed();
    session.flush();
    assert_eq!(session.bracket_pairs_in_range(session.full_range(), false).len(), 3);

    session.apply_edit(Position::new(0, 5), Position::new(0, 5), "#");
    session.update_spans(classify("f(a) #g[b]\nh{c}"), &[0..=0]);
    session.flush();

    let openers: Vec<String> = session
        .bracket_pairs_in_range(session.full_range(), false)
        .iter()
        .map(|pair| pair.opening.text().to_string())
        .collect();
    assert_eq!(openers, vec!["(".to_string(), "{".to_string()]);
}

#[test]
fn flushing_twice_changes_nothing() {
    let session = BracketSession::with_brackets(TextDocument::new("(a [b]\n{c} d)"), brackets());
    session.apply_edit(Position::new(1, 1), Position::new(1, 2), "(x)");
    session.flush();
    let first = answers(&session);
    let root = session.tree().root().unwrap();

    session.flush();
    assert_eq!(answers(&session), first);
    assert!(Arc::ptr_eq(&root, &session.tree().root().unwrap()));
}

#[test]
fn readers_see_consistent_trees_while_editing() {
    let session = BracketSession::with_brackets(TextDocument::new("fn f() { g(1, [2]) }\n"), brackets());
    let done = AtomicBool::new(false);

    std::thread::scope(|scope| {
        for _ in 0..3 {
            scope.spawn(|| {
                while !done.load(Ordering::Acquire) {
                    for pair in session.bracket_pairs_in_range(session.full_range(), true) {
                        assert!(pair.opening_range.end <= pair.range.end);
                        if let Some(closing) = pair.closing_range {
                            assert!(pair.opening_range.end <= closing.start);
                        }
                    }
                    let _ = session.match_bracket_at(Position::new(0, 7));
                }
            });
        }

        let mut rng = Rng(7);
        let mut text = session.document().document().to_bytes();
        for _ in 0..200 {
            let current = String::from_utf8(text.clone()).unwrap();
            let start = rng.below(current.len() + 1);
            let end = (start + rng.below(3)).min(current.len());
            let insert = rng.text(2);
            session.apply_edit(position_of(&current, start), position_of(&current, end), &insert);
            let mut updated = current;
            updated.replace_range(start..end, &insert);
            text = updated.into_bytes();
            session.flush();
        }
        done.store(true, Ordering::Release);
    });

    let text = String::from_utf8(session.document().document().to_bytes()).unwrap();
    let fresh = BracketSession::with_brackets(TextDocument::new(&text), brackets());
    assert_eq!(answers(&session), answers(&fresh));
}
