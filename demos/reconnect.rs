//! Idle close and reconnect example
//!
//! Shows owned resources being released after an idle period, the next
//! record reconnecting, a failed setup being retried and backpressured
//! records keeping their order.
//!
//! Run with: cargo run --example reconnect

use amqp_log_transport::broker::MemoryBroker;
use amqp_log_transport::prelude::*;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    println!("=== AMQP Log Transport - Reconnect Example ===\n");

    let broker = MemoryBroker::new();
    let transport = AmqpTransport::builder(broker.clone())
        .auto_close_time(Duration::from_millis(200))
        .on_error(Arc::new(|err: &TransportError| {
            println!("   [error handler] {}", err);
        }))
        .build()?;

    println!("1. Idle auto-close:");
    transport.info("first record");
    transport.wait_for_state(PublisherState::Ready).await?;
    transport.wait_for_state(PublisherState::Closed).await?;
    println!(
        "   Closed after idle; open connections: {}",
        broker.open_connection_count()
    );

    println!("\n2. Next record reconnects:");
    transport.info("second record");
    transport.wait_for_state(PublisherState::Ready).await?;
    println!("   Connections opened so far: {}", broker.connections_opened());

    println!("\n3. Failed setup is retried by the next record:");
    transport.flush_and_close().await?;
    broker.fail_next_connects(1);
    transport.info("logged while the broker is down");
    transport.wait_for_state(PublisherState::Closed).await?;
    println!("   Pending after failure: {}", transport.pending_len().await);
    transport.info("logged after the broker came back");
    transport.wait_for_state(PublisherState::Ready).await?;
    println!("   Pending after retry: {}", transport.pending_len().await);

    println!("\n4. Backpressure keeps order:");
    broker.set_backpressure(true);
    transport.info("held 1");
    transport.info("held 2");
    println!("   Pending under backpressure: {}", transport.pending_len().await);
    broker.set_backpressure(false);
    transport.info("released");
    transport.flush_and_close().await?;

    println!("\n5. Published, in order:");
    for payload in broker.published("logs") {
        println!("   {}", payload);
    }

    println!("\n=== Example completed successfully! ===");

    Ok(())
}
