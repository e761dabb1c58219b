//! Throughput Benchmark for EmberKV
//!
//! This benchmark measures the performance of the store
//! and the snapshot codec under various workloads.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use emberkv::snapshot::{decode, encode, SnapshotRecord};
use emberkv::{Store, StoreConfig};
use std::sync::Arc;
use std::time::Duration;

/// Benchmark set operations
fn bench_set(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let _guard = rt.enter();
    let store: Store<String, String> = Store::new(StoreConfig::default());

    let mut group = c.benchmark_group("set");
    group.throughput(Throughput::Elements(1));

    group.bench_function("set_small", |b| {
        let mut i = 0u64;
        b.iter(|| {
            store.set(format!("key:{}", i), "small_value".to_string());
            i += 1;
        });
    });

    group.bench_function("set_medium", |b| {
        let mut i = 0u64;
        let value = "x".repeat(1024); // 1KB value
        b.iter(|| {
            store.set(format!("key:{}", i), value.clone());
            i += 1;
        });
    });

    group.bench_function("set_large", |b| {
        let mut i = 0u64;
        let value = "x".repeat(64 * 1024); // 64KB value
        b.iter(|| {
            store.set(format!("key:{}", i), value.clone());
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark get operations
fn bench_get(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let _guard = rt.enter();
    let store: Store<String, String> = Store::new(StoreConfig::default());

    // Pre-populate with data
    for i in 0..100_000 {
        store.set(format!("key:{}", i), format!("value:{}", i));
    }

    let mut group = c.benchmark_group("get");
    group.throughput(Throughput::Elements(1));

    group.bench_function("get_existing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("key:{}", i % 100_000);
            black_box(store.get(&key));
            i += 1;
        });
    });

    group.bench_function("get_missing", |b| {
        let mut i = 0u64;
        b.iter(|| {
            let key = format!("missing:{}", i);
            black_box(store.get(&key));
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark mixed workload (80% reads, 20% writes)
fn bench_mixed(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let _guard = rt.enter();
    let store: Store<String, String> = Store::new(StoreConfig::default());

    // Pre-populate
    for i in 0..10_000 {
        store.set(format!("key:{}", i), format!("value:{}", i));
    }

    let mut group = c.benchmark_group("mixed");
    group.throughput(Throughput::Elements(1));

    group.bench_function("80_read_20_write", |b| {
        let mut i = 0u64;
        b.iter(|| {
            if i % 5 == 0 {
                // 20% writes
                store.set(format!("new:{}", i), "value".to_string());
            } else {
                // 80% reads
                let key = format!("key:{}", i % 10_000);
                black_box(store.get(&key));
            }
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark expiry operations
fn bench_expiry(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let _guard = rt.enter();
    let store: Store<String, String> = Store::new(StoreConfig::default());

    let mut group = c.benchmark_group("expiry");
    group.throughput(Throughput::Elements(1));

    group.bench_function("set_with_expiry", |b| {
        let mut i = 0u64;
        b.iter(|| {
            store
                .set_with_expiry(
                    format!("key:{}", i),
                    "value".to_string(),
                    Duration::from_secs(3600),
                )
                .unwrap();
            i += 1;
        });
    });

    group.bench_function("expire_existing", |b| {
        // Pre-create keys
        for i in 0..10_000 {
            store.set(format!("expire:{}", i), "value".to_string());
        }

        let mut i = 0u64;
        b.iter(|| {
            let key = format!("expire:{}", i % 10_000);
            store.expire(&key, Duration::from_secs(3600)).unwrap();
            i += 1;
        });
    });

    group.finish();
}

/// Benchmark concurrent access
fn bench_concurrent(c: &mut Criterion) {
    use std::thread;

    let rt = tokio::runtime::Runtime::new().unwrap();
    let _guard = rt.enter();

    let mut group = c.benchmark_group("concurrent");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("4_threads_mixed", |b| {
        b.iter(|| {
            let store: Arc<Store<String, String>> = Arc::new(Store::new(StoreConfig::default()));
            let handles: Vec<_> = (0..4)
                .map(|t| {
                    let store = Arc::clone(&store);
                    thread::spawn(move || {
                        for i in 0..10_000 {
                            let key = format!("key:{}:{}", t, i);
                            store.set(key.clone(), "value".to_string());
                            store.get(&key);
                        }
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }

            black_box(store.len());
        });
    });

    group.finish();
}

/// Benchmark snapshot encoding and decoding
fn bench_snapshot(c: &mut Criterion) {
    let records: Vec<SnapshotRecord<String, String>> = (0..10_000)
        .map(|i| SnapshotRecord::permanent(format!("key:{}", i), format!("value {}", i)))
        .collect();
    let encoded = encode(&records);

    let mut group = c.benchmark_group("snapshot");
    group.throughput(Throughput::Elements(records.len() as u64));

    group.bench_function("encode_10k", |b| {
        b.iter(|| {
            black_box(encode(&records));
        });
    });

    group.bench_function("decode_10k", |b| {
        b.iter(|| {
            black_box(decode::<String, String>(&encoded).unwrap());
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_set,
    bench_get,
    bench_mixed,
    bench_expiry,
    bench_concurrent,
    bench_snapshot,
);

criterion_main!(benches);
