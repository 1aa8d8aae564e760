use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use clipstash::HistoryEngine;
use clipstash::models::Capture;

fn filled_engine(dir: &std::path::Path, count: usize) -> HistoryEngine {
    let mut engine = HistoryEngine::open_dir(dir, count);
    for i in 0..count {
        let _ = engine.add(Capture::text(format!("clipboard entry number {i}")));
    }
    engine
}

fn bench_add(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = filled_engine(dir.path(), 200);
    let mut i = 0usize;

    c.bench_function("add_at_capacity", |b| {
        b.iter(|| {
            i += 1;
            let _ = engine.add(black_box(Capture::text(format!("new entry {i}"))));
        })
    });

    c.bench_function("add_duplicate", |b| {
        b.iter(|| {
            let _ = engine.add(black_box(Capture::text("new entry 1")));
        })
    });
}

fn bench_query(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let engine = filled_engine(dir.path(), 200);

    c.bench_function("query_substring", |b| {
        b.iter(|| engine.query(black_box("NUMBER 1")).count())
    });

    c.bench_function("query_empty", |b| b.iter(|| engine.query(black_box("")).count()));
}

criterion_group!(benches, bench_add, bench_query);
criterion_main!(benches);
