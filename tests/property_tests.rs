//! Property-based tests for amqp_log_transport using proptest

use amqp_log_transport::broker::MemoryBroker;
use amqp_log_transport::core::{PendingMessage, PendingQueue};
use amqp_log_transport::prelude::*;
use parking_lot::Mutex;
use proptest::prelude::*;
use serde_json::Value;
use std::sync::Arc;

fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .expect("Failed to build runtime")
}

fn level_strategy() -> impl Strategy<Value = LogLevel> {
    prop_oneof![
        Just(LogLevel::Trace),
        Just(LogLevel::Debug),
        Just(LogLevel::Info),
        Just(LogLevel::Warn),
        Just(LogLevel::Error),
        Just(LogLevel::Fatal),
    ]
}

// ============================================================================
// LogLevel Tests
// ============================================================================

proptest! {
    /// Test that LogLevel string conversions roundtrip correctly
    #[test]
    fn test_log_level_str_roundtrip(level in level_strategy()) {
        let parsed: LogLevel = level.to_str().parse().unwrap();
        prop_assert_eq!(level, parsed);
    }
}

// ============================================================================
// Pending Queue Tests
// ============================================================================

proptest! {
    /// DropOldest always keeps the most recent `capacity` messages in order
    #[test]
    fn test_drop_oldest_keeps_newest(capacity in 1usize..20, count in 0usize..100) {
        let mut queue = PendingQueue::bounded(capacity, OverflowPolicy::DropOldest);
        for i in 0..count {
            queue.push(PendingMessage::new(i.to_string(), None));
        }

        let kept: Vec<String> = queue.payloads().map(str::to_string).collect();
        let expected: Vec<String> = (count.saturating_sub(capacity)..count)
            .map(|i| i.to_string())
            .collect();
        prop_assert_eq!(kept, expected);
    }

    /// DropNewest always keeps the oldest `capacity` messages in order
    #[test]
    fn test_drop_newest_keeps_oldest(capacity in 1usize..20, count in 0usize..100) {
        let mut queue = PendingQueue::bounded(capacity, OverflowPolicy::DropNewest);
        for i in 0..count {
            queue.push(PendingMessage::new(i.to_string(), None));
        }

        let kept: Vec<String> = queue.payloads().map(str::to_string).collect();
        let expected: Vec<String> = (0..count.min(capacity)).map(|i| i.to_string()).collect();
        prop_assert_eq!(kept, expected);
    }
}

// ============================================================================
// Publisher Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Whatever the backpressure pattern, every record is published once, in
    /// order, and every callback fires exactly once with success
    #[test]
    fn test_fifo_and_exactly_once_under_backpressure(
        steps in prop::collection::vec((any::<bool>(), 0usize..5, level_strategy()), 1..30)
    ) {
        let runtime = paused_runtime();
        let (published, callbacks, expected) = runtime.block_on(async {
            let broker = MemoryBroker::new();
            let transport = AmqpTransport::builder(broker.clone())
                .formatter(|ctx: &FormatContext<'_>| -> Result<String> {
                    Ok(ctx.record.message.clone())
                })
                .build()
                .unwrap();
            let callbacks = Arc::new(Mutex::new(Vec::new()));
            let mut expected = Vec::new();

            for (backpressure, count, level) in steps {
                broker.set_backpressure(backpressure);
                for _ in 0..count {
                    let message = format!("m{}", expected.len());
                    let sink = Arc::clone(&callbacks);
                    let tag = message.clone();
                    transport.log(
                        level,
                        message.clone(),
                        Value::Null,
                        Some(Box::new(move |result: Result<()>| {
                            sink.lock().push((tag, result.is_ok()));
                        })),
                    );
                    expected.push(message);
                }
                transport.pending_len().await;
            }

            broker.set_backpressure(false);
            transport.flush_and_close().await.unwrap();
            let callbacks = callbacks.lock().clone();
            (broker.published("logs"), callbacks, expected)
        });

        prop_assert_eq!(&published, &expected);
        let tags: Vec<String> = callbacks.iter().map(|(tag, _)| tag.clone()).collect();
        prop_assert_eq!(&tags, &expected);
        prop_assert!(callbacks.iter().all(|(_, ok)| *ok));
    }
}
