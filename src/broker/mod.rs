//! Broker client capability, session handling and the in-process broker

pub mod client;
pub mod memory;
pub mod session;

pub use client::BrokerClient;
pub use memory::{MemoryBroker, MemoryChannel, MemoryConnection};
pub use session::{BrokerSession, Resource, SessionSettings};
