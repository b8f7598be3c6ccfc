// Criterion benchmarks for shoal-pool.
//
// Run benchmarks with:
//   cargo bench -p shoal-pool

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use shoal_pool::{Dialect, Worker, WorkerConfig, selector};
use std::sync::Arc;

fn fleet(count: usize) -> Vec<Arc<Worker>> {
    (0..count)
        .map(|i| {
            let worker = Worker::from_config(WorkerConfig {
                id: format!("w{i}"),
                host: "127.0.0.1".to_string(),
                port: 8000 + i as u16,
                dialect: Dialect::Completions,
                model: "bench-model".to_string(),
                max_concurrent_requests: 5,
            });
            // Give each worker a distinct history so the weights differ.
            worker.record_request(0.05 * (i + 1) as f64, i % 7 != 0);
            Arc::new(worker)
        })
        .collect()
}

fn bench_pick(c: &mut Criterion) {
    let mut group = c.benchmark_group("selector_pick");

    for count in [2, 10, 50].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, &count| {
            let workers = fleet(count);
            b.iter(|| selector::pick(black_box(&workers)));
        });
    }

    group.finish();
}

fn bench_score(c: &mut Criterion) {
    let mut group = c.benchmark_group("worker_score");

    group.bench_function("scored_worker", |b| {
        let workers = fleet(1);
        b.iter(|| black_box(&workers[0]).score());
    });

    group.finish();
}

criterion_group!(benches, bench_pick, bench_score);
criterion_main!(benches);
