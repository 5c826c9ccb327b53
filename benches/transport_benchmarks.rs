//! Criterion benchmarks for amqp_log_transport

use amqp_log_transport::broker::MemoryBroker;
use amqp_log_transport::core::{PendingMessage, PendingQueue};
use amqp_log_transport::prelude::*;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;
use std::time::Duration;

// ============================================================================
// Formatting Benchmarks
// ============================================================================

fn bench_formatting(c: &mut Criterion) {
    let mut group = c.benchmark_group("formatting");
    group.throughput(Throughput::Elements(1));

    let record = LogRecord::new(
        LogLevel::Info,
        "User login successful",
        json!({"user_id": 12345, "ip": "192.168.1.1", "tags": ["auth", "web"]}),
    );

    group.bench_function("json_compact", |b| {
        let formatter = JsonFormatter::new();
        b.iter(|| {
            let ctx = FormatContext::new(&record, "1736331045123-00ff00ff00ff00ff")
                .with_source(Some("api"));
            black_box(formatter.format(&ctx).unwrap())
        });
    });

    group.bench_function("json_unix_millis", |b| {
        let formatter = JsonFormatter::new().with_timestamp_format(TimestampFormat::UnixMillis);
        b.iter(|| {
            let ctx = FormatContext::new(&record, "1736331045123-00ff00ff00ff00ff");
            black_box(formatter.format(&ctx).unwrap())
        });
    });

    group.finish();
}

// ============================================================================
// Pending Queue Benchmarks
// ============================================================================

fn bench_pending_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("pending_queue");

    for size in [100usize, 1_000, 10_000] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("fill_and_drain", size), &size, |b, &size| {
            b.iter(|| {
                let mut queue = PendingQueue::new();
                for i in 0..size {
                    queue.push(PendingMessage::new(i.to_string(), None));
                }
                while let Some(message) = queue.pop_front() {
                    message.complete(Ok(()));
                }
            });
        });
    }

    group.bench_function("bounded_drop_oldest", |b| {
        let mut queue = PendingQueue::bounded(1_000, OverflowPolicy::DropOldest);
        b.iter(|| {
            black_box(queue.push(PendingMessage::new("payload".to_string(), None)))
        });
    });

    group.finish();
}

// ============================================================================
// Transport Benchmarks
// ============================================================================

fn bench_transport_log(c: &mut Criterion) {
    let mut group = c.benchmark_group("transport_log");
    group.throughput(Throughput::Elements(1));

    let runtime = tokio::runtime::Runtime::new().expect("Failed to build runtime");
    let broker = MemoryBroker::new();
    let transport = runtime.block_on(async {
        let transport = AmqpTransport::builder(broker.clone())
            .auto_close_time(Duration::from_secs(60))
            .build()
            .unwrap();
        transport
            .wait_for_state(PublisherState::Ready)
            .await
            .unwrap();
        transport
    });

    group.bench_function("ready", |b| {
        b.iter(|| {
            transport.log(
                LogLevel::Info,
                black_box("Benchmark message"),
                json!({"iteration": 1}),
                None,
            );
        });
    });

    runtime.block_on(transport.flush_and_close()).unwrap();
    group.finish();
}

fn bench_buffered_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffered_drain");
    let runtime = tokio::runtime::Runtime::new().expect("Failed to build runtime");

    for count in [100usize, 1_000] {
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                runtime.block_on(async {
                    let broker = MemoryBroker::new();
                    broker.set_connect_delay(Some(Duration::from_millis(1)));
                    let transport = AmqpTransport::builder(broker.clone()).build().unwrap();
                    for i in 0..count {
                        transport.log(LogLevel::Info, "buffered", json!({"seq": i}), None);
                    }
                    transport
                        .wait_for_state(PublisherState::Ready)
                        .await
                        .unwrap();
                    transport.flush_and_close().await.unwrap();
                    black_box(broker.published_count("logs"))
                })
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_formatting,
    bench_pending_queue,
    bench_transport_log,
    bench_buffered_drain,
);
criterion_main!(benches);
