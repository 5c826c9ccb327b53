//! Transport implementations

pub mod amqp;
mod publisher;

pub use amqp::{AmqpTransport, TransportBuilder};
pub use publisher::PublisherState;
