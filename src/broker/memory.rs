//! In-process fanout broker
//!
//! `MemoryBroker` implements [`BrokerClient`] without any network. Every
//! queue bound to an exchange receives every message published to it, the
//! same as a fanout exchange on a real broker. Failures and backpressure can
//! be injected, which makes it the broker used by the test suite, the demos
//! and the benchmarks.

use super::client::BrokerClient;
use crate::core::{Result, TransportError};
use async_trait::async_trait;
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryConnection {
    id: u64,
}

impl MemoryConnection {
    pub fn id(&self) -> u64 {
        self.id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryChannel {
    id: u64,
    connection: u64,
}

impl MemoryChannel {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn connection_id(&self) -> u64 {
        self.connection
    }
}

#[derive(Debug, Default)]
struct Exchange {
    durable: bool,
    published: Vec<Vec<u8>>,
}

#[derive(Debug, Default)]
struct BrokerState {
    next_id: u64,
    exchanges: HashMap<String, Exchange>,
    bindings: HashMap<String, Vec<Sender<Vec<u8>>>>,
    open_connections: HashSet<u64>,
    /// channel id -> connection id
    open_channels: HashMap<u64, u64>,
    connections_opened: u64,
    channels_opened: u64,
    connections_closed: u64,
    channels_closed: u64,
    failing_connects: usize,
    failing_channels: usize,
    failing_closes: usize,
    rejected_publishes: usize,
    backpressure: bool,
    connect_delay: Option<Duration>,
}

impl BrokerState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Fanout broker living in the current process
///
/// Cloning is cheap; clones share the same broker.
///
/// # Example
///
/// ```
/// use amqp_log_transport::broker::{BrokerClient, MemoryBroker};
///
/// # tokio_test::block_on(async {
/// let broker = MemoryBroker::new();
/// let deliveries = broker.bind("logs");
///
/// let connection = broker.connect("amqp://localhost").await.unwrap();
/// let channel = broker.open_channel(&connection).await.unwrap();
/// broker.declare_exchange(&channel, "logs", false).await.unwrap();
///
/// assert!(broker.publish(&channel, "logs", "", b"hello").await);
/// assert_eq!(deliveries.try_recv().unwrap(), b"hello".to_vec());
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a new queue to `exchange` and return its consumer end
    ///
    /// Binding may happen before the exchange is declared.
    pub fn bind(&self, exchange: &str) -> Receiver<Vec<u8>> {
        let (tx, rx) = unbounded();
        self.state
            .lock()
            .bindings
            .entry(exchange.to_string())
            .or_default()
            .push(tx);
        rx
    }

    /// Every payload accepted by `exchange`, oldest first
    pub fn published(&self, exchange: &str) -> Vec<String> {
        self.state
            .lock()
            .exchanges
            .get(exchange)
            .map(|ex| {
                ex.published
                    .iter()
                    .map(|payload| String::from_utf8_lossy(payload).into_owned())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn published_count(&self, exchange: &str) -> usize {
        self.state
            .lock()
            .exchanges
            .get(exchange)
            .map_or(0, |ex| ex.published.len())
    }

    pub fn exchange_durable(&self, exchange: &str) -> Option<bool> {
        self.state.lock().exchanges.get(exchange).map(|ex| ex.durable)
    }

    /// Refuse all publishes while enabled
    pub fn set_backpressure(&self, enabled: bool) {
        self.state.lock().backpressure = enabled;
    }

    /// Refuse the next `count` publishes
    pub fn reject_next_publishes(&self, count: usize) {
        self.state.lock().rejected_publishes = count;
    }

    /// Fail the next `count` connection attempts
    pub fn fail_next_connects(&self, count: usize) {
        self.state.lock().failing_connects = count;
    }

    /// Fail the next `count` channel opens
    pub fn fail_next_channels(&self, count: usize) {
        self.state.lock().failing_channels = count;
    }

    /// Fail the next `count` channel or connection closes
    ///
    /// A failed close leaves the resource open on the broker.
    pub fn fail_next_closes(&self, count: usize) {
        self.state.lock().failing_closes = count;
    }

    /// Make every connection attempt take `delay`
    pub fn set_connect_delay(&self, delay: Option<Duration>) {
        self.state.lock().connect_delay = delay;
    }

    pub fn connections_opened(&self) -> u64 {
        self.state.lock().connections_opened
    }

    pub fn connections_closed(&self) -> u64 {
        self.state.lock().connections_closed
    }

    pub fn channels_opened(&self) -> u64 {
        self.state.lock().channels_opened
    }

    pub fn channels_closed(&self) -> u64 {
        self.state.lock().channels_closed
    }

    pub fn is_connection_open(&self, connection: &MemoryConnection) -> bool {
        self.state.lock().open_connections.contains(&connection.id)
    }

    pub fn is_channel_open(&self, channel: &MemoryChannel) -> bool {
        self.state.lock().open_channels.contains_key(&channel.id)
    }

    pub fn open_connection_count(&self) -> usize {
        self.state.lock().open_connections.len()
    }

    pub fn open_channel_count(&self) -> usize {
        self.state.lock().open_channels.len()
    }
}

#[async_trait]
impl BrokerClient for MemoryBroker {
    type Connection = MemoryConnection;
    type Channel = MemoryChannel;

    async fn connect(&self, url: &str) -> Result<MemoryConnection> {
        let delay = self.state.lock().connect_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        if state.failing_connects > 0 {
            state.failing_connects -= 1;
            return Err(TransportError::connection(url, "connection refused"));
        }

        let id = state.next_id();
        state.open_connections.insert(id);
        state.connections_opened += 1;
        Ok(MemoryConnection { id })
    }

    async fn open_channel(&self, connection: &MemoryConnection) -> Result<MemoryChannel> {
        let mut state = self.state.lock();
        if !state.open_connections.contains(&connection.id) {
            return Err(TransportError::channel(format!(
                "connection {} is closed",
                connection.id
            )));
        }
        if state.failing_channels > 0 {
            state.failing_channels -= 1;
            return Err(TransportError::channel("channel open rejected"));
        }

        let id = state.next_id();
        state.open_channels.insert(id, connection.id);
        state.channels_opened += 1;
        Ok(MemoryChannel {
            id,
            connection: connection.id,
        })
    }

    async fn declare_exchange(
        &self,
        channel: &MemoryChannel,
        exchange: &str,
        durable: bool,
    ) -> Result<()> {
        let mut state = self.state.lock();
        if !state.open_channels.contains_key(&channel.id) {
            return Err(TransportError::channel(format!(
                "channel {} is closed",
                channel.id
            )));
        }

        let existing = state
            .exchanges
            .entry(exchange.to_string())
            .or_insert_with(|| Exchange {
                durable,
                published: Vec::new(),
            });
        if existing.durable != durable {
            return Err(TransportError::exchange(
                exchange,
                format!(
                    "inequivalent arg 'durable': received {} but current is {}",
                    durable, existing.durable
                ),
            ));
        }
        Ok(())
    }

    async fn publish(
        &self,
        channel: &MemoryChannel,
        exchange: &str,
        _routing_key: &str,
        payload: &[u8],
    ) -> bool {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if !state.open_channels.contains_key(&channel.id) || state.backpressure {
            return false;
        }
        if state.rejected_publishes > 0 {
            state.rejected_publishes -= 1;
            return false;
        }

        let Some(target) = state.exchanges.get_mut(exchange) else {
            return false;
        };
        target.published.push(payload.to_vec());

        if let Some(queues) = state.bindings.get_mut(exchange) {
            // consumers that went away are unbound
            queues.retain(|queue| queue.send(payload.to_vec()).is_ok());
        }
        true
    }

    async fn close_channel(&self, channel: MemoryChannel) -> Result<()> {
        let mut state = self.state.lock();
        if state.failing_closes > 0 {
            state.failing_closes -= 1;
            return Err(TransportError::channel(format!(
                "channel {} close rejected",
                channel.id
            )));
        }
        if state.open_channels.remove(&channel.id).is_some() {
            state.channels_closed += 1;
            Ok(())
        } else {
            Err(TransportError::channel(format!(
                "channel {} already closed",
                channel.id
            )))
        }
    }

    async fn close_connection(&self, connection: MemoryConnection) -> Result<()> {
        let mut state = self.state.lock();
        if state.failing_closes > 0 {
            state.failing_closes -= 1;
            return Err(TransportError::connection(
                format!("memory://{}", connection.id),
                "connection close rejected",
            ));
        }
        if !state.open_connections.remove(&connection.id) {
            return Err(TransportError::connection(
                format!("memory://{}", connection.id),
                "connection already closed",
            ));
        }
        state.connections_closed += 1;
        // channels die with their connection
        state
            .open_channels
            .retain(|_, owner| *owner != connection.id);
        Ok(())
    }
}
