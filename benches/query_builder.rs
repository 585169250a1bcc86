//! Benchmarks for condition rendering and statement building.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use tabula_query::{
    ColumnSet, Condition, DataLayerConfig, Dialect, QueryState, Record, RenderContext,
    StatementBuilder, WriteOptions,
};

const NOW: &str = "2024-03-01 12:00:00";

fn columns() -> ColumnSet {
    ["id", "title", "slug", "price", "status", "created", "modified"]
        .into_iter()
        .collect()
}

fn nested_condition() -> Condition {
    Condition::and([
        Condition::or([
            Condition::eq("status", "active"),
            Condition::eq("status", "pending"),
        ]),
        Condition::simple("price", ">", 10),
        Condition::search("title", "socks"),
        Condition::eq("ghost", 1),
    ])
}

/// Benchmark condition rendering.
fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");
    let columns = columns();
    let searchable = vec!["title".to_string()];
    let ctx = RenderContext::new(&columns).with_search_columns(&searchable);

    group.bench_function("simple_eq", |b| {
        let condition = Condition::eq("id", 42);
        b.iter(|| black_box(condition.render(&ctx, Dialect::Positional)))
    });

    group.bench_function("nested", |b| {
        let condition = nested_condition();
        b.iter(|| black_box(condition.render(&ctx, Dialect::Positional)))
    });

    for size in [10, 100, 1000] {
        let condition = Condition::in_list("id", 0..size);
        group.bench_with_input(BenchmarkId::new("in_list", size), &condition, |b, condition| {
            b.iter(|| black_box(condition.render(&ctx, Dialect::Numbered)))
        });
    }

    group.finish();
}

/// Benchmark full statement building.
fn bench_statements(c: &mut Criterion) {
    let mut group = c.benchmark_group("statements");
    let columns = columns();
    let config = DataLayerConfig::default();
    let builder = StatementBuilder::new("products", &columns, &config).with_timestamp(NOW);

    group.bench_function("select_page", |b| {
        let condition = nested_condition();
        let state = QueryState {
            limit: Some(20),
            offset: Some(40),
            ..QueryState::default()
        };
        b.iter(|| black_box(builder.select(Some(&condition), &state)))
    });

    group.bench_function("insert", |b| {
        let record = Record::new()
            .with("title", "socks")
            .with("price", 12.5)
            .with("status", "active")
            .with("unknown", "dropped");
        b.iter(|| black_box(builder.insert(&record, WriteOptions::default())))
    });

    group.bench_function("update", |b| {
        let record = Record::new().with("price", 10).with("id", 3);
        let condition = Condition::eq("id", 3);
        b.iter(|| black_box(builder.update(&record, &condition, WriteOptions::default())))
    });

    group.finish();
}

criterion_group!(benches, bench_render, bench_statements);
criterion_main!(benches);
