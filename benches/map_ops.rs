//! Benchmark suite for ttlmap operations.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;
use tokio::runtime::Runtime;
use ttlmap::{ExpiringMap, LifetimeScope};

const TTL: Duration = Duration::from_secs(10);

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_time()
        .build()
        .expect("failed to build a runtime")
}

fn new_map(rt: &Runtime) -> ExpiringMap<u64, String> {
    ExpiringMap::builder(TTL)
        .runtime(rt.handle().clone())
        .build()
        .expect("failed to build a map")
}

/// Benchmark insertion of new entries into an empty map.
///
/// Each insert spawns a lifetime watcher, so this mostly measures task spawning.
fn put_benchmark(c: &mut Criterion) {
    let rt = runtime();
    let scope = LifetimeScope::new();
    let mut group = c.benchmark_group("put");

    for size in [100u64, 1000, 10000].iter() {
        group.throughput(Throughput::Elements(*size));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let map = new_map(&rt);
                for i in 0..size {
                    map.put(&scope, black_box(i), black_box(format!("value-{}", i)));
                }
            });
        });
    }
    group.finish();
}

/// Benchmark read operations on a pre-populated map.
fn get_benchmark(c: &mut Criterion) {
    let rt = runtime();
    let scope = LifetimeScope::new();
    let mut group = c.benchmark_group("get");

    for size in [100u64, 1000, 10000].iter() {
        let map = new_map(&rt);
        for i in 0..*size {
            map.put(&scope, i, format!("value-{}", i));
        }

        group.throughput(Throughput::Elements(*size));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                for i in 0..size {
                    let _ = map.get(&black_box(i));
                }
            });
        });
    }
    group.finish();
}

/// Benchmark conditional inserts that are refused because the key is present.
fn test_and_put_benchmark(c: &mut Criterion) {
    let rt = runtime();
    let scope = LifetimeScope::new();
    let map = new_map(&rt);
    for i in 0..1000 {
        map.put(&scope, i, format!("value-{}", i));
    }

    c.bench_function("test_and_put_existing", |b| {
        b.iter(|| {
            for i in 0..1000 {
                black_box(map.test_and_put(&scope, i, String::new()));
            }
        });
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default().measurement_time(Duration::from_secs(5));
    targets = put_benchmark, get_benchmark, test_and_put_benchmark
}
criterion_main!(benches);
