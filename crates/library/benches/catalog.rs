//! Criterion benchmarks for catalog ordering.
//!
//! Run: cargo bench -p library --bench catalog
//!
//! Results show:
//!   sort_*      — lexical ordering after a scan, by catalog size
//!   shuffle_*   — Fisher–Yates reordering with a seeded source

#![allow(
    clippy::unwrap_used, // benchmark helpers use unwrap for brevity
    clippy::expect_used,
    missing_docs,        // criterion_group! macro generates undocumented items
)]

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use library::{path_arena, TrackCatalog, TrackPath};
use rand::rngs::SmallRng;
use rand::SeedableRng;

const ARENA: usize = 1024;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_paths(count: usize) -> Vec<String> {
    // Reverse order so sorting has real work to do.
    (0..count)
        .rev()
        .map(|n| format!("/music/{:03}/track{:04}.wav", n % 97, n))
        .collect()
}

fn load<'a>(arena: &'a mut [TrackPath], paths: &[String]) -> TrackCatalog<'a> {
    let mut catalog = TrackCatalog::new(arena);
    for path in paths {
        catalog.push(path).unwrap();
    }
    catalog
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_sort(c: &mut Criterion) {
    let mut group = c.benchmark_group("sort");
    for count in [64usize, 256, 1024] {
        let paths = make_paths(count);
        group.bench_with_input(BenchmarkId::new("tracks", count), &paths, |b, paths| {
            b.iter_batched_ref(
                || Box::new(path_arena::<ARENA>()),
                |arena| load(&mut arena[..], paths).sort(),
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_shuffle(c: &mut Criterion) {
    let mut group = c.benchmark_group("shuffle");
    for count in [64usize, 256, 1024] {
        let paths = make_paths(count);
        let mut arena = Box::new(path_arena::<ARENA>());
        group.bench_with_input(BenchmarkId::new("tracks", count), &paths, |b, paths| {
            let mut catalog = load(&mut arena[..], paths);
            let mut rng = SmallRng::seed_from_u64(0x5eed);
            b.iter(|| catalog.shuffle(&mut rng));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_sort, bench_shuffle);
criterion_main!(benches);
