//! Benchmarks for selector queries and re-binding passes.
//!
//! Run with: `cargo bench --package fundle-dom --bench bind_bench`
//!
//! # Baselines
//!
//! - Selector parsing for the shapes bindings commonly use
//! - `query_selector_all` over lists of growing size
//! - A steady-state `Templater::bind` pass, where every event listener is
//!   already attached and only render callbacks run

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use fundle_dom::{Bindings, Element, SelectorList, Templater};
use std::hint::black_box;

// ============================================================================
// Fixtures
// ============================================================================

fn list(rows: usize) -> Element {
    let ul = Element::new("ul");
    for i in 0..rows {
        ul.append_child(
            &Element::new("li")
                .with_attr("data-id", i.to_string())
                .with_attr("class", if i % 2 == 0 { "row even" } else { "row" })
                .with_child(Element::new("span").with_attr("class", "title"))
                .with_child(Element::new("button").with_attr("class", "remove")),
        );
    }
    Element::new("todo-list").with_child(ul)
}

fn bindings() -> Bindings {
    Bindings::new()
        .with(".title", |el, _| el.set_text("x"))
        .with(":this > ul > li:nth-child(odd)", |el, _| el.add_class("odd"))
        .with("li::click .title, .remove::click", |_, _| {})
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("selector_parse");
    for source in [
        "li",
        ".row.even[data-id='3']",
        ":scope > ul > li:nth-child(2n+1) span.title, button",
    ] {
        group.bench_with_input(BenchmarkId::from_parameter(source), source, |b, s| {
            b.iter(|| SelectorList::parse(black_box(s)));
        });
    }
    group.finish();
}

fn bench_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_selector_all");
    for rows in [10usize, 100, 1000] {
        let root = list(rows);
        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::new("li.even span", rows), &root, |b, root| {
            b.iter(|| root.query_selector_all(black_box("li.even span")));
        });
    }
    group.finish();
}

fn bench_rebind(c: &mut Criterion) {
    let mut group = c.benchmark_group("templater_rebind");
    for rows in [10usize, 100, 500] {
        let root = list(rows);
        let bindings = bindings();
        Templater::bind(&root, &bindings);
        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &root, |b, root| {
            b.iter(|| Templater::bind(black_box(root), &bindings));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_parse, bench_query, bench_rebind);
criterion_main!(benches);
