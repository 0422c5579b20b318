//! Performance benchmarks for note processing
//!
//! These benchmarks run over a generated corpus to measure:
//! - Construct scanning through the markdown event stream
//! - Single-note parsing
//! - Full graph rebuilds
//! - Incremental upserts against an existing graph
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use notesync_core::{
    codec::md::events,
    graph::NoteGraph,
    note::{parse_note, NoteId},
};

const CORPUS_SIZE: usize = 500;

fn note_body(n: usize) -> String {
    format!(
        "---\nstatus: draft\nseq: {n}\n---\n# Note {n}\n\n#topic-{} #daily see [[{}]] and [[{}]]\n\n\
         Written on [[2024-{:02}-{:02}]]. ![[{}|previous]]\n\n- item #todo\n- `#not-a-tag`\n",
        n % 17,
        (n + 1) % CORPUS_SIZE,
        (n * 7) % CORPUS_SIZE,
        n % 12 + 1,
        n % 28 + 1,
        n.saturating_sub(1),
    )
}

fn corpus() -> Vec<(NoteId, String)> {
    (0..CORPUS_SIZE)
        .map(|n| (NoteId::new(n.to_string()), note_body(n)))
        .collect()
}

// Benchmark: Event stream with construct splicing
fn bench_scan_events(c: &mut Criterion) {
    let body = note_body(42);
    c.bench_function("scan_events", |b| {
        b.iter(|| events(black_box(&body)).count());
    });
}

// Benchmark: Parsing one note
fn bench_parse_note(c: &mut Criterion) {
    let body = note_body(42);
    c.bench_function("parse_note", |b| {
        b.iter(|| parse_note(black_box(&body)));
    });
}

// Benchmark: Full rebuild of the corpus
fn bench_rebuild_graph(c: &mut Criterion) {
    let corpus = corpus();
    c.bench_function("rebuild_graph", |b| {
        b.iter(|| NoteGraph::from_corpus(black_box(corpus.clone())).len());
    });
}

// Benchmark: Incremental upsert against a built graph
fn bench_incremental_upsert(c: &mut Criterion) {
    let mut graph = NoteGraph::from_corpus(corpus());
    let edits = [note_body(7), note_body(8).replace("#daily", "#weekly")];
    let mut i = 0;
    c.bench_function("incremental_upsert", |b| {
        b.iter(|| {
            i += 1;
            graph.upsert(NoteId::from("7"), edits[i % 2].as_str()).links.len()
        });
    });
}

// Benchmark group configuration
criterion_group! {
    name = benches;
    config = Criterion::default()
        .sample_size(50)
        .measurement_time(std::time::Duration::from_secs(10));
    targets =
        bench_scan_events,
        bench_parse_note,
        bench_rebuild_graph,
        bench_incremental_upsert
}

criterion_main!(benches);
