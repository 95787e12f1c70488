use std::ops::Bound;

use criterion::{Criterion, criterion_group, criterion_main};
use rust_decimal::Decimal;

use fintab::cell::{RawColumn, RawTable};
use fintab::pipeline::{LoadOptions, build_table};
use fintab::query::{Literal, Predicate, evaluate, full_scan};
use fintab::table::Table;

const ROWS: usize = 50_000;

fn generate_ledger(rows: usize) -> Table {
    let amounts: Vec<String> = (0..rows)
        .map(|i| {
            let cents = ((i * 37) % 1_000_000) as i64;
            Decimal::new(cents, 2).to_string()
        })
        .collect();
    let statuses: Vec<&str> = (0..rows)
        .map(|i| match i % 3 {
            0 => "shipped",
            1 => "pending",
            _ => "processing",
        })
        .collect();
    let amount_refs: Vec<&str> = amounts.iter().map(String::as_str).collect();
    let raw = RawTable::new(vec![
        RawColumn::from_strings("amount", &amount_refs),
        RawColumn::from_strings("status", &statuses),
    ])
    .expect("raw table");
    build_table("ledger", raw, &LoadOptions::default()).expect("build table")
}

fn range_predicate() -> Predicate {
    Predicate::Range {
        column: "amount".to_string(),
        lo: Bound::Included(Literal::Amount(Decimal::new(250_000, 2))),
        hi: Bound::Excluded(Literal::Amount(Decimal::new(500_000, 2))),
    }
}

fn equality_predicate() -> Predicate {
    Predicate::Equals {
        column: "status".to_string(),
        value: Literal::Text("pending".to_string()),
    }
}

fn bench_queries(c: &mut Criterion) {
    let table = generate_ledger(ROWS);
    let range = range_predicate();
    let equality = equality_predicate();

    let mut group = c.benchmark_group("amount_range");
    group.bench_function("indexed", |b| {
        b.iter(|| evaluate(&table, &range).expect("indexed range"))
    });
    group.bench_function("scan", |b| {
        b.iter(|| full_scan(&table, &range).expect("scan range"))
    });
    group.finish();

    let mut group = c.benchmark_group("status_equality");
    group.bench_function("indexed", |b| {
        b.iter(|| evaluate(&table, &equality).expect("indexed equality"))
    });
    group.bench_function("scan", |b| {
        b.iter(|| full_scan(&table, &equality).expect("scan equality"))
    });
    group.finish();
}

criterion_group!(benches, bench_queries);
criterion_main!(benches);
