//! Benchmarks for the time store
//!
//! Run with: cargo bench

use chrono::{DateTime, Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use tempfile::tempdir;
use timebucket::storage::*;

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn fill<E: KvEngine>(store: &TimeStore<E>, bucket: &str, count: i64) {
    for i in 0..count {
        store
            .put(bucket, &Record::new(base() + Duration::seconds(i), vec![0u8; 64]))
            .unwrap();
    }
}

fn bench_keys(c: &mut Criterion) {
    let mut group = c.benchmark_group("keys");
    let ts = base() + Duration::nanoseconds(123_456_789);

    for encoding in [KeyEncoding::Binary, KeyEncoding::Text] {
        let key = encoding.encode(&ts).unwrap();

        group.bench_function(format!("encode_{}", encoding), |b| {
            b.iter(|| encoding.encode(black_box(&ts)).unwrap())
        });
        group.bench_function(format!("decode_{}", encoding), |b| {
            b.iter(|| encoding.decode(black_box(&key)).unwrap())
        });
    }

    group.finish();
}

fn bench_put(c: &mut Criterion) {
    let mut group = c.benchmark_group("put");

    group.bench_function("memory", |b| {
        let store = TimeStore::in_memory();
        let mut i = 0i64;
        b.iter(|| {
            i += 1;
            store
                .put("bench", &Record::new(base() + Duration::seconds(i), "payload"))
                .unwrap()
        });
    });

    group.bench_function("sqlite", |b| {
        let dir = tempdir().unwrap();
        let config = StoreConfig::new(dir.path().join("bench.db")).synchronous(SyncMode::Off);
        let store = TimeStore::open_with_config(&config).unwrap();
        let mut i = 0i64;
        b.iter(|| {
            i += 1;
            store
                .put("bench", &Record::new(base() + Duration::seconds(i), "payload"))
                .unwrap()
        });
    });

    group.finish();
}

fn bench_queries(c: &mut Criterion) {
    let mut group = c.benchmark_group("queries");

    let dir = tempdir().unwrap();
    let config = StoreConfig::new(dir.path().join("bench.db")).synchronous(SyncMode::Off);
    let store = TimeStore::open_with_config(&config).unwrap();
    fill(&store, "bench", 10_000);

    for size in [100i64, 1000] {
        group.throughput(Throughput::Elements(size as u64));

        let since = base() + Duration::seconds(10_000 - size);
        group.bench_function(format!("get_since_{}", size), |b| {
            b.iter(|| store.get_since("bench", black_box(since)).unwrap())
        });

        group.bench_function(format!("get_latest_{}", size), |b| {
            b.iter(|| store.get_latest_n("bench", black_box(size as usize)).unwrap())
        });
    }

    group.finish();
}

fn bench_delete_before(c: &mut Criterion) {
    let mut group = c.benchmark_group("delete_before");
    group.sample_size(10);

    group.bench_function("memory_1000_of_2000", |b| {
        b.iter_with_setup(
            || {
                let store = TimeStore::in_memory();
                fill(&store, "bench", 2000);
                store
            },
            |store| {
                store
                    .delete_before("bench", base() + Duration::seconds(1000))
                    .unwrap()
            },
        )
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_keys,
    bench_put,
    bench_queries,
    bench_delete_before
);
criterion_main!(benches);
