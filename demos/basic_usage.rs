//! Basic transport usage example
//!
//! Publishes a few records to an in-process fanout exchange and prints what a
//! bound consumer receives.
//!
//! Run with: cargo run --example basic_usage

use amqp_log_transport::broker::MemoryBroker;
use amqp_log_transport::prelude::*;
use serde_json::json;

#[tokio::main]
async fn main() -> Result<()> {
    println!("=== AMQP Log Transport - Basic Usage Example ===\n");

    let broker = MemoryBroker::new();
    let consumer = broker.bind("logs");

    let transport = AmqpTransport::builder(broker.clone())
        .exchange("logs")
        .source("basic_usage")
        .build()?;

    println!("1. Logging before the channel is ready (records are buffered):");
    transport.info("Service starting");
    transport.debug("Loaded 12 configuration keys");
    println!("   State: {}", transport.state());

    transport.wait_for_state(PublisherState::Ready).await?;
    println!("   State: {}", transport.state());

    println!("\n2. Logging with metadata and a completion callback:");
    transport.log(
        LogLevel::Warn,
        "Disk usage high",
        json!({"mount": "/var", "used_percent": 91}),
        Some(Box::new(|result: Result<()>| {
            println!("   Callback: accepted = {}", result.is_ok());
        })),
    );
    transport.log_exception(
        "Unhandled error in request handler",
        json!({"stack": "at handle_request (src/server.rs:88)"}),
        None,
    );

    transport.flush_and_close().await?;

    println!("\n3. Payloads received by the bound consumer:");
    while let Ok(payload) = consumer.try_recv() {
        println!("   {}", String::from_utf8_lossy(&payload));
    }

    let metrics = transport.metrics();
    println!("\n4. Metrics:");
    println!("   Published: {}", metrics.published());
    println!("   Buffered: {}", metrics.buffered());
    println!("   Closes: {}", metrics.closes());

    println!("\n=== Example completed successfully! ===");

    Ok(())
}
