#![allow(clippy::cast_possible_wrap, clippy::cast_precision_loss)]

//! Criterion benchmarks for the per-call hot path: named-parameter translation and binding,
//! plus a bulk insert against an on-disk `SQLite` pool to put that cost in context.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use sql_scope::prelude::*;
use sql_scope::translation::NamedQueryTranslator;
use tokio::runtime::Runtime;

const INSERT: &str = "insert into sample(name, password, score, active) \
                      values (?name, ?password, ?score, ?active)";

fn wide_query(columns: usize) -> (String, NamedParams) {
    let names: Vec<String> = (0..columns).map(|i| format!("c{i}")).collect();
    let sql = format!(
        "update wide set {} where id = ?id",
        names
            .iter()
            .map(|n| format!("{n} = ?{n}"))
            .collect::<Vec<_>>()
            .join(", ")
    );
    let mut params: NamedParams = names
        .into_iter()
        .enumerate()
        .map(|(i, n)| (n, RowValues::Int(i as i64)))
        .collect();
    params.insert("id".to_string(), RowValues::Int(1));
    (sql, params)
}

fn bench_translate(c: &mut Criterion) {
    let mut group = c.benchmark_group("translate_and_bind");
    for style in [PlaceholderStyle::Sqlite, PlaceholderStyle::Postgres] {
        let translator = NamedQueryTranslator::new('?', style);
        for columns in [2_usize, 16, 64] {
            let (sql, params) = wide_query(columns);
            group.throughput(Throughput::Elements(columns as u64 + 1));
            group.bench_with_input(
                BenchmarkId::new(format!("{style:?}"), columns),
                &(sql, params),
                |b, (sql, params)| {
                    b.iter(|| {
                        let translated = translator.translate(black_box(sql));
                        let values = bind_params(params, &translated.names).unwrap();
                        black_box((translated, values))
                    });
                },
            );
        }
    }
    group.finish();
}

fn bench_sqlite_bulk(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bench.db").to_string_lossy().into_owned();
    let pool = rt.block_on(async {
        let db = ConfigAndPool::sqlite_builder(path).build().await.unwrap();
        db.execute_batch(
            &ExecContext::new(),
            "CREATE TABLE sample (id INTEGER PRIMARY KEY, name TEXT, password TEXT, score REAL, active INTEGER);",
        )
        .await
        .unwrap();
        db
    });
    let db = &pool;

    let mut group = c.benchmark_group("sqlite_bulk_insert");
    for rows in [10_usize, 100] {
        let batch: Vec<NamedParams> = (0..rows)
            .map(|i| {
                named_params! {
                    "name" => format!("user{i}"),
                    "password" => "pw",
                    "score" => i as f64 * 0.5,
                    "active" => i % 2 == 0,
                }
            })
            .collect();
        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &batch, |b, batch| {
            b.to_async(&rt).iter(|| async {
                db.wrap(&ExecContext::new(), |ctx| async move {
                    db.query_bulk(&ctx, INSERT, batch).await
                })
                .await
                .unwrap()
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_translate, bench_sqlite_bulk);
criterion_main!(benches);
