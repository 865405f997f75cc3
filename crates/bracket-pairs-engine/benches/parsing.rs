use criterion::{Criterion, criterion_group, criterion_main};

use bracket_pairs_engine::parser::parse_document;
use bracket_pairs_engine::tokenizer::FastTokenizer;
use bracket_pairs_engine::{BracketSession, Position, TextDocument};
mod common;

fn bench_initial_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parsing");
    group.sample_size(10);

    let brackets = common::brackets();
    let source = common::generate_source(2_000);
    group.bench_function("initial_parse", |b| {
        b.iter(|| {
            let mut tokenizer = FastTokenizer::new(std::hint::black_box(&source), &brackets);
            std::hint::black_box(parse_document(&mut tokenizer, &[], None));
        });
    });

    group.finish();
}

fn bench_incremental_reparse(c: &mut Criterion) {
    let mut group = c.benchmark_group("incremental");
    group.sample_size(10);

    let source = common::generate_source(2_000);
    let session = BracketSession::with_brackets(TextDocument::new(&source), common::brackets());
    // A `call(...)` line in the middle of the document.
    let at = Position::new(3_005, 13);
    let mut open = false;
    group.bench_function("single_edit", |b| {
        b.iter(|| {
            if open {
                session.apply_edit(at, Position::new(at.line, at.column + 1), "");
            } else {
                session.apply_edit(at, at, "(");
            }
            open = !open;
            session.flush();
            std::hint::black_box(session.stats());
        });
    });

    let visible = bracket_pairs_engine::TextRange::new(Position::new(3_000, 0), Position::new(3_060, 0));
    group.bench_function("visible_pairs", |b| {
        b.iter(|| std::hint::black_box(session.bracket_pairs_in_range(visible, true)));
    });

    group.finish();
}

criterion_group!(benches, bench_initial_parse, bench_incremental_reparse);
criterion_main!(benches);
