//! Benchmarks for the pure, synchronous parts of tabular-client: the kind of
//! work that runs on every metadata reload and every literal-table creation,
//! with no server round-trip to dominate the measurement.
//!
//! Run with: cargo bench
//! Compare against baseline: cargo bench -- --save-baseline before
//!                          (make changes)
//!                          cargo bench -- --baseline before

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use tabular_client::conn_string::ConnectionString;
use tabular_client::driver::CellValue;
use tabular_client::model::collection::{Collection, Named};

#[derive(Debug, Clone)]
struct Item(String);

impl Named for Item {
    fn name(&self) -> &str {
        &self.0
    }
}

fn sample_collection(n: usize) -> Collection<Item> {
    (0..n).map(|i| Item(format!("Table{i}"))).collect()
}

/// Benchmark name/substring lookup over `Collection<T>`, the structure every
/// metadata kind (tables, columns, partitions, measures, ...) is stored in.
fn bench_collection_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("collection_lookup");

    for size in [10usize, 100, 1_000] {
        let collection = sample_collection(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_function(BenchmarkId::new("by_name", size), |b| {
            b.iter(|| collection.by_name(black_box("Table5")))
        });
        group.bench_function(BenchmarkId::new("find_substring", size), |b| {
            b.iter(|| collection.find(black_box("5")))
        });
    }

    group.finish();
}

/// Benchmark `Collection`'s union operator, used to build ad-hoc views over
/// several metadata collections (e.g. "all columns across these tables").
fn bench_collection_union(c: &mut Criterion) {
    let mut group = c.benchmark_group("collection_union");

    for size in [10usize, 100, 1_000] {
        let a = sample_collection(size);
        let b_coll = sample_collection(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_function(BenchmarkId::new("add_assign", size), |bencher| {
            bencher.iter(|| {
                let mut acc = a.clone();
                acc += black_box(&b_coll);
                acc
            })
        });
    }

    group.finish();
}

fn sample_row(width: usize) -> Vec<CellValue> {
    (0..width)
        .map(|i| match i % 4 {
            0 => CellValue::String(format!("value-{i}")),
            1 => CellValue::Int(i as i64),
            2 => CellValue::Double(i as f64 * 1.5),
            _ => CellValue::Bool(i % 2 == 0),
        })
        .collect()
}

/// Benchmark the M-expression generated for table-from-literal-data creation:
/// every cell serialized as a quoted string plus escaping.
fn bench_mexpr_table_literal(c: &mut Criterion) {
    let mut group = c.benchmark_group("mexpr_table_literal");

    for rows in [10usize, 100, 1_000] {
        let columns: Vec<String> = (0..8).map(|i| format!("Column{i}")).collect();
        let data: Vec<Vec<CellValue>> = (0..rows).map(|_| sample_row(columns.len())).collect();

        group.throughput(Throughput::Elements(rows as u64));
        group.bench_function(BenchmarkId::new("build_table_literal", rows), |b| {
            b.iter(|| tabular_client::util::mexpr::build_table_literal(black_box(&columns), black_box(&data)))
        });
    }

    group.finish();
}

fn sample_event_categories_xml(events: usize) -> tabular_client::driver::ResultSet {
    let rows = (0..events)
        .map(|i| {
            let xml = format!(
                "<Columns><Column Name=\"Duration\"/><Column Name=\"ObjectName{i}\"/></Columns>"
            );
            vec![
                CellValue::String(format!("Event{i}")),
                CellValue::String(xml),
            ]
        })
        .collect();
    tabular_client::driver::ResultSet {
        columns: vec!["EVENT_NAME".to_string(), "COLUMNS_XML".to_string()],
        rows,
    }
}

/// Benchmark parsing the `DISCOVER_TRACE_EVENT_CATEGORIES` payload, run once
/// per `TraceReactor::update` call before every trace installation.
fn bench_event_categories_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("event_categories_parsing");

    for events in [5usize, 50, 200] {
        let rs = sample_event_categories_xml(events);
        group.throughput(Throughput::Elements(events as u64));
        group.bench_function(BenchmarkId::new("parse_event_categories", events), |b| {
            b.iter(|| tabular_client::trace::event_categories::parse_event_categories(black_box(&rs)))
        });
    }

    group.finish();
}

/// Benchmark connection-string parsing, run once per `Connection`/`Server`
/// construction.
fn bench_connection_string_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("connection_string_parsing");

    let raw = "Data Source=localhost;Initial Catalog=AdventureWorks;User ID=sa;Password=p@ss;EffectiveUserName=alice@example.com";
    group.bench_function("parse", |b| {
        b.iter(|| ConnectionString::parse(black_box(raw)).unwrap())
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_collection_lookup,
    bench_collection_union,
    bench_mexpr_table_literal,
    bench_event_categories_parsing,
    bench_connection_string_parsing,
);

criterion_main!(benches);
