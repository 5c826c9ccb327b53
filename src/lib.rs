//! # AMQP Log Transport
//!
//! A log transport that publishes structured records to a fanout exchange
//! without ever blocking the caller on the broker.
//!
//! ## Features
//!
//! - **Lazy Connections**: The connection and channel are created on demand
//!   and closed again after an idle period
//! - **Backpressure Tolerant**: Records the broker does not accept are kept
//!   and retried in their original order
//! - **Shared Resources**: A caller-supplied connection or channel is used
//!   but never closed
//! - **Pluggable**: Any broker client implementing [`BrokerClient`] and any
//!   [`PayloadFormatter`] can be plugged in
//!
//! ## Example
//!
//! ```
//! use amqp_log_transport::prelude::*;
//! use amqp_log_transport::broker::MemoryBroker;
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let broker = MemoryBroker::new();
//! let consumer = broker.bind("logs");
//!
//! let transport = AmqpTransport::builder(broker.clone())
//!     .exchange("logs")
//!     .source("checkout")
//!     .build()
//!     .unwrap();
//!
//! transport.log(LogLevel::Info, "order placed", json!({"order": 17}), None);
//! transport.flush_and_close().await.unwrap();
//!
//! let payload = String::from_utf8(consumer.try_recv().unwrap()).unwrap();
//! assert!(payload.contains("order placed"));
//! # });
//! ```

pub mod broker;
pub mod core;
pub mod transports;

pub mod prelude {
    pub use crate::broker::BrokerClient;
    pub use crate::core::{
        FormatContext, JsonFormatter, LogLevel, LogRecord, OverflowCallback, OverflowPolicy,
        PayloadFormatter, PublishCallback, Result, TimestampFormat, Transport, TransportError,
        TransportMetrics, TransportOptions,
    };
    pub use crate::transports::{AmqpTransport, PublisherState, TransportBuilder};
}

pub use broker::{BrokerClient, MemoryBroker};
pub use core::{
    FormatContext, JsonFormatter, LogLevel, LogRecord, OverflowCallback, OverflowPolicy,
    PayloadFormatter, PublishCallback, Result, TimestampFormat, Transport, TransportError,
    TransportMetrics, TransportOptions,
};
pub use transports::{AmqpTransport, PublisherState, TransportBuilder};
