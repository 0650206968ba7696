use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use jemallocator::Jemalloc;
use rand::Rng;
use sales_report::{
    AggregateOp, Column, Dimension, Measure, QueryCache, SalesTable, SortOrder, load_sources,
};
use std::io::{BufWriter, Write};
use std::num::NonZeroUsize;
use std::rc::Rc;
use tempfile::NamedTempFile;

#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

const ROWS: usize = 1_000_000;

fn sales_csv(rows: usize) -> NamedTempFile {
    let file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    let mut w = BufWriter::new(file.reopen().unwrap());
    writeln!(w, "LojaID,Cidade,Data,Vendas,Qtde").unwrap();
    let mut rng = rand::rng();
    let cities = ["Aracaju", "Fortaleza", "Natal", "Recife", "Salvador"];
    for _ in 0..rows {
        writeln!(
            w,
            "{},{},2019-{:02}-{:02},{:.2},{}",
            rng.random_range(1000..1050),
            cities[rng.random_range(0..cities.len())],
            rng.random_range(1..=12),
            rng.random_range(1..=28),
            rng.random_range(3.0..250.0),
            rng.random_range(1..=10),
        )
        .unwrap();
    }
    w.flush().unwrap();
    file
}

fn pipeline(c: &mut Criterion) {
    let csv = sales_csv(ROWS);
    let paths = [csv.path().to_path_buf()];

    let mut group = c.benchmark_group("SalesTable");
    group.sample_size(10);
    group.throughput(Throughput::Elements(ROWS as u64));

    group.bench_function("load_csv", |b| {
        b.iter(|| load_sources(&paths).unwrap());
    });

    group.bench_function("load + normalize + derive", |b| {
        b.iter(|| {
            let raw = load_sources(&paths).unwrap();
            SalesTable::from_raw(&raw).unwrap()
        })
    });

    // Preload once outside the iterator
    let raw = load_sources(&paths).unwrap();
    let (table, _) = SalesTable::from_raw(&raw).unwrap();

    group.bench_function("aggregate_revenue_sum", |b| {
        b.iter(|| table.aggregate(Measure::Revenue, AggregateOp::Sum).unwrap());
    });

    group.bench_function("group_by_city_revenue", |b| {
        b.iter(|| {
            table
                .group_by(&[Dimension::City], Measure::Revenue, AggregateOp::Sum)
                .unwrap()
        });
    });

    group.bench_function("group_by_year_month_mean", |b| {
        b.iter(|| {
            table
                .group_by(
                    &[Dimension::Year, Dimension::Month],
                    Measure::Revenue,
                    AggregateOp::Avg,
                )
                .unwrap()
        });
    });

    group.bench_function("value_counts_store", |b| {
        b.iter(|| {
            table
                .value_counts(Dimension::StoreId, SortOrder::Descending)
                .unwrap()
        });
    });

    let n = NonZeroUsize::new(5).unwrap();
    group.bench_function("top_5_revenue", |b| {
        b.iter(|| table.top_n(Column::Revenue, n).unwrap());
    });

    let table = Rc::new(table);
    let cache = Rc::new(QueryCache::new());
    group.bench_function("group_by_city_cached", |b| {
        b.iter(|| {
            table
                .query_with_cache(&cache)
                .group_by(Dimension::City)
                .aggregate(Measure::Revenue, AggregateOp::Sum)
                .execute()
                .unwrap()
        })
    });

    group.finish();
}

criterion_group!(benches, pipeline);
criterion_main!(benches);
