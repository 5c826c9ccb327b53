//! Shared channel example
//!
//! Two transports and a plain producer publish over one caller-owned channel.
//! Closing the transports leaves the channel open for the other users.
//!
//! Run with: cargo run --example shared_channel

use amqp_log_transport::broker::{BrokerClient, MemoryBroker};
use amqp_log_transport::prelude::*;
use serde_json::json;

#[tokio::main]
async fn main() -> Result<()> {
    println!("=== AMQP Log Transport - Shared Channel Example ===\n");

    let broker = MemoryBroker::new();
    let consumer = broker.bind("logs");

    let connection = broker.connect("amqp://localhost").await?;
    let channel = broker.open_channel(&connection).await?;

    let api = AmqpTransport::builder(broker.clone())
        .connection(connection)
        .channel(channel)
        .source("api")
        .build()?;
    let worker = AmqpTransport::builder(broker.clone())
        .channel(channel)
        .source("worker")
        .build()?;

    api.log(LogLevel::Error, "boom", json!({"stack": "at main"}), None);
    worker.info("job 42 finished");

    api.flush_and_close().await?;
    worker.flush_and_close().await?;

    println!("1. Transports closed; shared channel open: {}", broker.is_channel_open(&channel));

    let accepted = broker.publish(&channel, "logs", "", b"plain producer").await;
    println!("2. Plain producer publish accepted: {}", accepted);

    println!("\n3. Consumer received:");
    while let Ok(payload) = consumer.try_recv() {
        println!("   {}", String::from_utf8_lossy(&payload));
    }

    broker.close_channel(channel).await?;
    broker.close_connection(connection).await?;

    println!("\n=== Example completed successfully! ===");

    Ok(())
}
