//! # Queue Benchmark
//!
//! Enqueue/dequeue cost of `ConcurrentQueue` with and without watchers, and
//! end-to-end throughput of a trivial stage driven by a `WorkerHandle`.
//!
//! Run with: `cargo bench --package assetflow_core`

#![allow(missing_docs)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use assetflow_core::{ConcurrentQueue, QueueEvent, ShutdownBroadcast, Stage, WorkResult, WorkerHandle};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tokio::sync::Notify;

fn bench_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("queue");
    group.throughput(Throughput::Elements(1));

    for watchers in [0usize, 1, 4] {
        let queue = ConcurrentQueue::<u64>::new("bench");
        let notifies: Vec<Arc<Notify>> = (0..watchers).map(|_| Arc::new(Notify::new())).collect();
        for notify in &notifies {
            queue.watch(QueueEvent::Enqueued, notify);
            queue.watch(QueueEvent::Dequeued, notify);
        }

        group.bench_with_input(
            BenchmarkId::new("enqueue_dequeue", watchers),
            &watchers,
            |b, _| {
                b.iter(|| {
                    queue.enqueue(black_box(7));
                    black_box(queue.try_dequeue())
                });
            },
        );
    }

    group.finish();
}

/// Moves items from one queue to another.
struct Relay {
    input: Arc<ConcurrentQueue<u64>>,
    output: Arc<ConcurrentQueue<u64>>,
    moved: AtomicU64,
}

impl Stage for Relay {
    fn name(&self) -> &str {
        "relay"
    }

    fn do_work(&self) -> WorkResult {
        if let Some(item) = self.input.try_dequeue() {
            self.output.enqueue(item);
            self.moved.fetch_add(1, Ordering::Relaxed);
        }
        Ok(!self.input.is_empty())
    }

    fn has_pending_input(&self) -> bool {
        !self.input.is_empty()
    }
}

fn bench_worker(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .expect("benchmark runtime");

    let mut group = c.benchmark_group("worker");
    group.measurement_time(Duration::from_secs(5));

    for batch in [100u64, 1_000] {
        group.throughput(Throughput::Elements(batch));
        group.bench_with_input(BenchmarkId::new("relay", batch), &batch, |b, &batch| {
            let shutdown = ShutdownBroadcast::new();
            let input = Arc::new(ConcurrentQueue::new("in"));
            let output = Arc::new(ConcurrentQueue::new("out"));
            let stage = Relay {
                input: input.clone(),
                output: output.clone(),
                moved: AtomicU64::new(0),
            };
            let handle = WorkerHandle::spawn(stage, 2, runtime.handle(), &shutdown);
            input.watch(QueueEvent::Enqueued, handle.waker());

            b.iter(|| {
                for i in 0..batch {
                    input.enqueue(i);
                }
                let mut drained = 0;
                while drained < batch {
                    match output.try_dequeue() {
                        Some(_) => drained += 1,
                        None => std::hint::spin_loop(),
                    }
                }
            });

            shutdown.fire();
        });
    }

    group.finish();
}

criterion_group!(benches, bench_queue, bench_worker);
criterion_main!(benches);
