//! Emitter Benchmark
//!
//! Measures generation throughput over representative tree shapes.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use rxgen::emitter::EmitOptions;
use rxgen::syntax::{CharClass, INFINITE, NodeArena, RegexTree};

// =============================================================================
// Tree shapes
// =============================================================================

/// `(\d{4})-(\d{2})-(\d{2})`
fn date_tree() -> RegexTree {
    let mut arena = NodeArena::new();
    let year = arena.set_loop(CharClass::digit(), 4, 4, 0);
    let year_cap = arena.capture(1, year, 0);
    let dash1 = arena.one('-', 0);
    let month = arena.set_loop(CharClass::digit(), 2, 2, 0);
    let month_cap = arena.capture(2, month, 0);
    let dash2 = arena.one('-', 0);
    let day = arena.set_loop(CharClass::digit(), 2, 2, 0);
    let day_cap = arena.capture(3, day, 0);
    let concat = arena.concat(
        vec![year_cap, dash1, month_cap, dash2, day_cap],
        0,
    );
    RegexTree::new(arena, concat, 0, 4)
}

/// `(?>alpha|bravo|charlie|delta|echo|foxtrot)`
fn keyword_tree() -> RegexTree {
    let mut arena = NodeArena::new();
    let words = ["alpha", "bravo", "charlie", "delta", "echo", "foxtrot"];
    let branches: Vec<_> = words.iter().map(|w| arena.multi(w, 0)).collect();
    let alt = arena.alternate(branches, 0);
    let atomic = arena.atomic(alt, 0);
    RegexTree::new(arena, atomic, 0, 1)
}

/// `(?:[a-z]+=[0-9]+;)*end`
fn nested_loop_tree() -> RegexTree {
    let mut arena = NodeArena::new();
    let key = arena.set_loop(CharClass::from_range('a', 'z'), 1, INFINITE, 0);
    let eq = arena.one('=', 0);
    let value = arena.set_loop(CharClass::from_range('0', '9'), 1, INFINITE, 0);
    let semi = arena.one(';', 0);
    let pair = arena.concat(vec![key, eq, value, semi], 0);
    let pairs = arena.loop_of(pair, 0, INFINITE, 0);
    let end = arena.multi("end", 0);
    let concat = arena.concat(vec![pairs, end], 0);
    RegexTree::new(arena, concat, 0, 1)
}

// =============================================================================
// Benchmarks
// =============================================================================

fn bench_generation(c: &mut Criterion) {
    let shapes = [
        ("date", date_tree()),
        ("keywords", keyword_tree()),
        ("nested_loops", nested_loop_tree()),
    ];

    let mut group = c.benchmark_group("generate");
    for (name, tree) in &shapes {
        let output = rxgen::generate(name, tree, EmitOptions::default())
            .expect("generation should succeed");
        group.throughput(Throughput::Bytes(output.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), tree, |b, tree| {
            b.iter(|| {
                black_box(
                    rxgen::generate(name, tree, EmitOptions::default())
                        .expect("generation should succeed"),
                )
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_generation);
criterion_main!(benches);
