//! Append and search benchmarks for tickstore.
//!
//! Measures the two hot paths: batch append throughput (with and without
//! an in-batch sort) and timestamp-to-ordinal search through the sparse
//! index.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tempfile::tempdir;
use tickstore::{Field, FieldKind, Store, Timeseries};

fn packed_batch(series: &Timeseries, n: usize, start_ts: i64) -> Vec<u8> {
    let stride = series.schema().size_of();
    let mut bytes = vec![0u8; stride * n];
    for i in 0..n {
        let base = i * stride;
        bytes[base..base + 8].copy_from_slice(&(start_ts + i as i64).to_le_bytes());
        bytes[base + 8..base + 16].copy_from_slice(&(i as f64).to_le_bytes());
    }
    bytes
}

fn bench_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("append");

    for &batch_size in &[1_000usize, 10_000, 100_000] {
        group.bench_with_input(
            BenchmarkId::new("sorted_batch", batch_size),
            &batch_size,
            |b, &n| {
                let dir = tempdir().unwrap();
                let store = Store::create(dir.path().join("db")).unwrap();
                let mut series = Timeseries::create(
                    store.root(),
                    "bench",
                    "",
                    vec![Field::new("value", FieldKind::Double)],
                )
                .unwrap();

                let mut next_ts = 0i64;
                b.iter(|| {
                    let mut batch = packed_batch(&series, n, next_ts);
                    next_ts += n as i64;
                    series.append_records(black_box(&mut batch), false).unwrap();
                });
            },
        );
    }

    group.bench_function("unsorted_batch_10000", |b| {
        let dir = tempdir().unwrap();
        let store = Store::create(dir.path().join("db")).unwrap();
        let mut series = Timeseries::create(
            store.root(),
            "bench",
            "",
            vec![Field::new("value", FieldKind::Double)],
        )
        .unwrap();

        let stride = series.schema().size_of();
        let mut next_ts = 0i64;
        b.iter(|| {
            let mut batch = packed_batch(&series, 10_000, next_ts);
            next_ts += 10_000;
            // Shuffle deterministically so every iteration pays the sort.
            let half = 5_000 * stride;
            batch.rotate_left(half);
            series.append_records(black_box(&mut batch), true).unwrap();
        });
    });

    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");

    let dir = tempdir().unwrap();
    let store = Store::create(dir.path().join("db")).unwrap();
    let mut series = Timeseries::create(
        store.root(),
        "bench",
        "",
        vec![Field::new("value", FieldKind::Double)],
    )
    .unwrap();
    series.set_index_step(1_024).unwrap();
    series.set_split_index_gt(4_096).unwrap();

    let n = 500_000usize;
    let mut batch = packed_batch(&series, n, 0);
    series.append_records(&mut batch, false).unwrap();
    assert!(series.index().is_some());

    group.bench_function("record_id_le_indexed", |b| {
        let mut t = 0i64;
        b.iter(|| {
            t = (t + 99_991) % n as i64;
            black_box(series.record_id_le(black_box(t)).unwrap());
        });
    });

    group.bench_function("record_id_ge_indexed", |b| {
        let mut t = 0i64;
        b.iter(|| {
            t = (t + 99_991) % n as i64;
            black_box(series.record_id_ge(black_box(t)).unwrap());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_append, bench_search);
criterion_main!(benches);
