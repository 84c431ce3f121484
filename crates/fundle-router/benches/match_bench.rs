//! Benchmarks for route matching.
//!
//! Run with: `cargo bench --package fundle-router --bench match_bench`

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use fundle_router::{MemoryHistory, Router, match_path};

// =============================================================================
// match_path
// =============================================================================

fn bench_match_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("match_path");
    group.bench_function("literal", |b| {
        b.iter(|| match_path(black_box("/settings/profile"), black_box("/settings/profile")));
    });
    group.bench_function("params_and_query", |b| {
        b.iter(|| {
            match_path(
                black_box("/users/42/posts/7?sort=desc&page=2"),
                black_box("/users/:id/posts/:post"),
            )
        });
    });
    group.finish();
}

// =============================================================================
// Router table scan
// =============================================================================

fn bench_router_scan(c: &mut Criterion) {
    let router = Router::new(MemoryHistory::default());
    for i in 0..50 {
        router.route(format!("/section{i}/:id"), |_, _| {});
    }
    c.bench_function("router_match_last_of_50", |b| {
        b.iter(|| router.match_route(black_box("/section49/abc")));
    });
}

criterion_group!(benches, bench_match_path, bench_router_scan);
criterion_main!(benches);
