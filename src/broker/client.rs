//! Broker client capability
//!
//! The transport never talks to a wire protocol directly. Everything it needs
//! from a message broker is expressed by [`BrokerClient`], so any AMQP client
//! library (or the bundled [`MemoryBroker`](super::MemoryBroker)) can be
//! plugged in.

use crate::core::Result;
use async_trait::async_trait;

/// Operations the transport needs from a message broker
///
/// Handles are cloned freely: a supplied channel is cloned into every setup
/// cycle, so `Clone` must be cheap and must refer to the same underlying
/// resource.
///
/// # Example
///
/// ```no_run
/// use amqp_log_transport::broker::BrokerClient;
/// use amqp_log_transport::core::Result;
/// use async_trait::async_trait;
///
/// struct NullBroker;
///
/// #[async_trait]
/// impl BrokerClient for NullBroker {
///     type Connection = ();
///     type Channel = ();
///
///     async fn connect(&self, _url: &str) -> Result<()> { Ok(()) }
///     async fn open_channel(&self, _connection: &()) -> Result<()> { Ok(()) }
///     async fn declare_exchange(&self, _channel: &(), _exchange: &str, _durable: bool) -> Result<()> {
///         Ok(())
///     }
///     async fn publish(&self, _channel: &(), _exchange: &str, _routing_key: &str, _payload: &[u8]) -> bool {
///         true
///     }
///     async fn close_channel(&self, _channel: ()) -> Result<()> { Ok(()) }
///     async fn close_connection(&self, _connection: ()) -> Result<()> { Ok(()) }
/// }
/// ```
#[async_trait]
pub trait BrokerClient: Send + Sync + 'static {
    type Connection: Clone + Send + Sync + 'static;
    type Channel: Clone + Send + Sync + 'static;

    /// Establish a transport-level connection
    ///
    /// Fails with [`TransportError::Connection`](crate::core::TransportError::Connection)
    /// when the broker is unreachable or rejects the handshake.
    async fn connect(&self, url: &str) -> Result<Self::Connection>;

    /// Open a logical channel on an established connection
    async fn open_channel(&self, connection: &Self::Connection) -> Result<Self::Channel>;

    /// Declare a fanout exchange
    ///
    /// Must be idempotent for a matching declaration and must fail with
    /// [`TransportError::Exchange`](crate::core::TransportError::Exchange) for a
    /// conflicting one.
    async fn declare_exchange(
        &self,
        channel: &Self::Channel,
        exchange: &str,
        durable: bool,
    ) -> Result<()>;

    /// Hand a payload to the transport's outbound buffer
    ///
    /// `false` means the message was not accepted (backpressure or a
    /// rejection); the caller keeps it and retries later.
    async fn publish(
        &self,
        channel: &Self::Channel,
        exchange: &str,
        routing_key: &str,
        payload: &[u8],
    ) -> bool;

    async fn close_channel(&self, channel: Self::Channel) -> Result<()>;

    async fn close_connection(&self, connection: Self::Connection) -> Result<()>;
}
