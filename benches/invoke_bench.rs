//! Benchmarks for the worker runtime.
//!
//! Benchmarks cover:
//! - Task construction and the wire codec
//! - Invocation engine overhead per argument count
//! - In-memory queue send/read throughput
//! - End-to-end pool drain

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use std::hint::black_box;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use eostre_worker::config::WorkerConfig;
use eostre_worker::core::{
    invoke, Arg, ArgType, BoxError, Context, HandlerRegistry, Json, Operand, Task, TaskQueue,
    WorkerPool,
};
use eostre_worker::infra::InMemoryQueue;

use serde::{Deserialize, Serialize};
use tokio::runtime::Runtime;

// ============================================================================
// Helper Functions
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Order {
    id: u64,
    sku: String,
    quantity: u32,
}

fn int_args(count: usize) -> Vec<Arg> {
    let mut rng = rand::rng();
    (0..count)
        .map(|_| Arg::new(ArgType::Int64, rng.random_range(-1_000_i64..1_000)).unwrap())
        .collect()
}

fn mixed_task(id: u64) -> Task {
    Task::new(
        "order",
        vec![
            Arg::new(ArgType::String, format!("customer-{id}")).unwrap(),
            Arg::new(ArgType::Bytes, vec![0_u8; 64]).unwrap(),
            Arg::structured(&Order {
                id,
                sku: "sku-123".into(),
                quantity: 3,
            })
            .unwrap(),
        ],
    )
    .unwrap()
}

fn sum_operand(arity: usize) -> Operand {
    match arity {
        1 => Operand::handler(|_cx: Context, a: i64| async move {
            black_box(a);
            Ok::<(), BoxError>(())
        }),
        4 => Operand::handler(|_cx: Context, a: i64, b: i64, c: i64, d: i64| async move {
            black_box(a + b + c + d);
            Ok::<(), BoxError>(())
        }),
        _ => Operand::handler(
            |_cx: Context, a: i64, b: i64, c: i64, d: i64, e: i64, f: i64, g: i64, h: i64| async move {
                black_box(a + b + c + d + e + f + g + h);
                Ok::<(), BoxError>(())
            },
        ),
    }
}

// ============================================================================
// Task Model Benchmarks
// ============================================================================

fn bench_task_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("task_codec");
    let task = mixed_task(7);
    let wire = task.encode().unwrap();

    group.bench_function("new_mixed", |b| b.iter(|| black_box(mixed_task(black_box(7)))));
    group.bench_function("encode_mixed", |b| b.iter(|| black_box(task.encode().unwrap())));
    group.bench_function("decode_mixed", |b| {
        b.iter(|| black_box(Task::decode(black_box(&wire)).unwrap()));
    });
    group.finish();
}

// ============================================================================
// Invocation Benchmarks
// ============================================================================

fn bench_invoke(c: &mut Criterion) {
    let mut group = c.benchmark_group("invoke");
    let rt = Runtime::new().unwrap();

    for arity in [1_usize, 4, 8] {
        let operand = sum_operand(arity);
        let task = Task::new("sum", int_args(arity)).unwrap();
        group.throughput(Throughput::Elements(arity as u64));
        group.bench_with_input(BenchmarkId::from_parameter(arity), &arity, |b, _| {
            b.to_async(&rt)
                .iter(|| async { invoke(&operand, &task).await.unwrap() });
        });
    }

    let order = Operand::handler(|_cx: Context, customer: String, blob: Vec<u8>, order: Json<Order>| async move {
        black_box((customer, blob, order.into_inner()));
        Ok::<(), BoxError>(())
    });
    let task = mixed_task(1);
    group.bench_function("mixed_struct", |b| {
        b.to_async(&rt)
            .iter(|| async { invoke(&order, &task).await.unwrap() });
    });
    group.finish();
}

// ============================================================================
// Queue Benchmarks
// ============================================================================

fn bench_queue_send_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("memory_queue_send_read");
    let rt = Runtime::new().unwrap();

    for size in [100_u64, 1_000] {
        group.throughput(Throughput::Elements(size));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, &size| {
            b.to_async(&rt).iter(|| async move {
                let cx = Context::background();
                let queue = InMemoryQueue::new(10_000).with_read_batch(128);
                queue
                    .send_many(&cx, (0..size).map(mixed_task).collect())
                    .await
                    .unwrap();
                while !queue.read(&cx).await.unwrap().is_empty() {}
                black_box(queue.len());
            });
        });
    }
    group.finish();
}

// ============================================================================
// End-to-End Pool Benchmarks
// ============================================================================

fn bench_pool_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_drain");
    group.sample_size(10);
    let rt = Runtime::new().unwrap();

    for parallelism in [1_usize, 4, 16] {
        group.bench_with_input(
            BenchmarkId::from_parameter(parallelism),
            &parallelism,
            |b, &parallelism| {
                b.to_async(&rt).iter(|| async move {
                    let cx = Context::background();
                    let done = Arc::new(AtomicU64::new(0));
                    let registry = Arc::new(HandlerRegistry::new());
                    let counter = Arc::clone(&done);
                    registry
                        .register("sum", move |_cx: Context, a: i64| {
                            let counter = Arc::clone(&counter);
                            async move {
                                black_box(a);
                                counter.fetch_add(1, Ordering::Relaxed);
                                Ok::<(), BoxError>(())
                            }
                        })
                        .unwrap();

                    let queue = Arc::new(InMemoryQueue::new(1_000).with_read_batch(256));
                    queue
                        .send_many(&cx, (0..256).map(|_| Task::new("sum", int_args(1)).unwrap()).collect())
                        .await
                        .unwrap();

                    let config = WorkerConfig::new()
                        .with_parallelism(parallelism)
                        .with_poll_interval(Duration::from_millis(1))
                        .with_shutdown_signals(Vec::new());
                    let pool = Arc::new(WorkerPool::new(config, queue, registry).unwrap());
                    let runner = {
                        let pool = Arc::clone(&pool);
                        tokio::spawn(async move { pool.start().await })
                    };
                    while done.load(Ordering::Relaxed) < 256 {
                        tokio::time::sleep(Duration::from_micros(200)).await;
                    }
                    pool.shutdown();
                    runner.await.unwrap().unwrap();
                });
            },
        );
    }
    group.finish();
}

// ============================================================================
// Benchmark Groups
// ============================================================================

criterion_group!(model_benches, bench_task_codec);

criterion_group!(invoke_benches, bench_invoke);

criterion_group!(queue_benches, bench_queue_send_read);

criterion_group!(pool_benches, bench_pool_drain);

criterion_main!(model_benches, invoke_benches, queue_benches, pool_benches);
