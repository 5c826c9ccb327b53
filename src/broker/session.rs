//! Broker session: the connection and channel a transport publishes through
//!
//! Each resource remembers whether this transport may close it. Resources the
//! caller supplied are never closed; self-created ones are closed only when
//! their auto-close flag is set. A session is moved into the setup future and
//! handed back together with the setup result, so partially resolved
//! resources survive a failed attempt.

use super::client::BrokerClient;
use crate::core::{Result, TransportError};
use std::fmt;

/// A broker handle plus whether this transport may close it
#[derive(Debug, Clone)]
pub struct Resource<T> {
    handle: T,
    closeable: bool,
}

impl<T> Resource<T> {
    /// A resource created by the transport
    pub fn owned(handle: T, auto_close: bool) -> Self {
        Self {
            handle,
            closeable: auto_close,
        }
    }

    /// A resource supplied by the caller
    pub fn borrowed(handle: T) -> Self {
        Self {
            handle,
            closeable: false,
        }
    }

    pub fn handle(&self) -> &T {
        &self.handle
    }

    pub fn is_closeable(&self) -> bool {
        self.closeable
    }

    pub fn into_handle(self) -> T {
        self.handle
    }
}

/// Resolved, immutable inputs to session setup
pub struct SessionSettings<B: BrokerClient> {
    pub url: String,
    pub exchange: String,
    pub durable: bool,
    pub connection: Option<B::Connection>,
    pub channel: Option<B::Channel>,
    pub auto_close_connection: bool,
    pub auto_close_channel: bool,
}

impl<B: BrokerClient> fmt::Debug for SessionSettings<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionSettings")
            .field("url", &self.url)
            .field("exchange", &self.exchange)
            .field("durable", &self.durable)
            .field("connection_supplied", &self.connection.is_some())
            .field("channel_supplied", &self.channel.is_some())
            .field("auto_close_connection", &self.auto_close_connection)
            .field("auto_close_channel", &self.auto_close_channel)
            .finish()
    }
}

pub struct BrokerSession<B: BrokerClient> {
    connection: Option<Resource<B::Connection>>,
    channel: Option<Resource<B::Channel>>,
    /// Close failures from cleaning up after a failed setup
    cleanup_errors: Vec<TransportError>,
}

impl<B: BrokerClient> BrokerSession<B> {
    pub fn new() -> Self {
        Self {
            connection: None,
            channel: None,
            cleanup_errors: Vec::new(),
        }
    }

    pub fn connection(&self) -> Option<&B::Connection> {
        self.connection.as_ref().map(Resource::handle)
    }

    pub fn channel(&self) -> Option<&B::Channel> {
        self.channel.as_ref().map(Resource::handle)
    }

    pub fn owns_connection(&self) -> bool {
        self.connection.as_ref().is_some_and(Resource::is_closeable)
    }

    pub fn owns_channel(&self) -> bool {
        self.channel.as_ref().is_some_and(Resource::is_closeable)
    }

    /// Whether an idle timer has anything to close
    pub fn owns_any(&self) -> bool {
        self.owns_connection() || self.owns_channel()
    }

    /// Resolve connection, channel and exchange
    ///
    /// Resolution order:
    /// 1. a channel is already available (retained or supplied): declare only
    /// 2. a connection is available: open a channel on it, then declare
    /// 3. nothing is available: connect, open a channel, then declare
    ///
    /// Closeable resources created by a failed attempt are closed and dropped
    /// before the session is returned. Errors from those closes are kept for
    /// [`take_cleanup_errors`](Self::take_cleanup_errors).
    pub async fn establish(mut self, client: &B, settings: &SessionSettings<B>) -> (Self, Result<()>) {
        let result = self.resolve(client, settings).await;
        (self, result)
    }

    async fn resolve(&mut self, client: &B, settings: &SessionSettings<B>) -> Result<()> {
        if self.channel.is_none() {
            self.channel = settings.channel.clone().map(Resource::borrowed);
        }

        let mut created_connection = false;
        let mut created_channel = false;

        if self.channel.is_none() {
            if self.connection.is_none() {
                self.connection = match settings.connection.clone() {
                    Some(connection) => Some(Resource::borrowed(connection)),
                    None => {
                        let connection = client.connect(&settings.url).await?;
                        created_connection = true;
                        Some(Resource::owned(connection, settings.auto_close_connection))
                    }
                };
            }

            let opened = match self.connection.as_ref() {
                Some(connection) => client.open_channel(connection.handle()).await,
                None => Err(TransportError::channel("no connection to open a channel on")),
            };
            match opened {
                Ok(channel) => {
                    created_channel = true;
                    self.channel = Some(Resource::owned(channel, settings.auto_close_channel));
                }
                Err(err) => {
                    self.release_created(client, created_connection, false).await;
                    return Err(err);
                }
            }
        }

        let declared = match self.channel.as_ref() {
            Some(channel) => {
                client
                    .declare_exchange(channel.handle(), &settings.exchange, settings.durable)
                    .await
            }
            None => Err(TransportError::channel("no channel to declare the exchange on")),
        };
        if let Err(err) = declared {
            self.release_created(client, created_connection, created_channel)
                .await;
            return Err(err);
        }

        Ok(())
    }

    /// Close and forget closeable resources made by a failed setup attempt
    async fn release_created(&mut self, client: &B, connection: bool, channel: bool) {
        if channel && self.owns_channel() {
            if let Some(resource) = self.channel.take() {
                if let Err(err) = client.close_channel(resource.into_handle()).await {
                    self.cleanup_errors.push(err);
                }
            }
        }
        if connection && self.owns_connection() {
            if let Some(resource) = self.connection.take() {
                self.channel = None;
                if let Err(err) = client.close_connection(resource.into_handle()).await {
                    self.cleanup_errors.push(err);
                }
            }
        }
    }

    /// Errors raised while releasing resources of a failed setup
    pub fn take_cleanup_errors(&mut self) -> Vec<TransportError> {
        std::mem::take(&mut self.cleanup_errors)
    }

    /// Publish through the session's channel
    ///
    /// Returns `false` without a channel, which the caller treats the same as
    /// backpressure.
    pub async fn publish(&self, client: &B, exchange: &str, payload: &[u8]) -> bool {
        match self.channel() {
            Some(channel) => client.publish(channel, exchange, "", payload).await,
            None => false,
        }
    }

    /// Close closeable resources, channel first
    ///
    /// Handles are cleared even when closing fails; the errors are returned
    /// for reporting. Borrowed and non-auto-close resources stay in place so
    /// the next setup can reuse them.
    pub async fn close(&mut self, client: &B) -> Vec<TransportError> {
        let mut errors = Vec::new();

        if self.owns_channel() {
            if let Some(resource) = self.channel.take() {
                if let Err(err) = client.close_channel(resource.into_handle()).await {
                    errors.push(err);
                }
            }
        }

        if self.owns_connection() {
            if let Some(resource) = self.connection.take() {
                // any retained channel was opened on this connection
                self.channel = None;
                if let Err(err) = client.close_connection(resource.into_handle()).await {
                    errors.push(err);
                }
            }
        }

        errors
    }
}

impl<B: BrokerClient> Default for BrokerSession<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: BrokerClient> fmt::Debug for BrokerSession<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerSession")
            .field("has_connection", &self.connection.is_some())
            .field("has_channel", &self.channel.is_some())
            .field("owns_connection", &self.owns_connection())
            .field("owns_channel", &self.owns_channel())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::MemoryBroker;

    fn settings(broker_conn: Option<<MemoryBroker as BrokerClient>::Connection>) -> SessionSettings<MemoryBroker> {
        SessionSettings {
            url: "amqp://localhost".to_string(),
            exchange: "logs".to_string(),
            durable: false,
            connection: broker_conn,
            channel: None,
            auto_close_connection: true,
            auto_close_channel: true,
        }
    }

    #[tokio::test]
    async fn test_self_created_session_owns_both() {
        let broker = MemoryBroker::new();
        let (mut session, result) = BrokerSession::new().establish(&broker, &settings(None)).await;

        assert!(result.is_ok());
        assert!(session.owns_connection());
        assert!(session.owns_channel());
        assert_eq!(broker.exchange_durable("logs"), Some(false));

        assert!(session.close(&broker).await.is_empty());
        assert!(session.channel().is_none());
        assert!(session.connection().is_none());
        assert_eq!(broker.open_connection_count(), 0);
    }

    #[tokio::test]
    async fn test_borrowed_connection_owned_channel() {
        let broker = MemoryBroker::new();
        let connection = broker.connect("amqp://shared").await.unwrap();

        let (mut session, result) = BrokerSession::new()
            .establish(&broker, &settings(Some(connection)))
            .await;

        assert!(result.is_ok());
        assert!(!session.owns_connection());
        assert!(session.owns_channel());
        assert_eq!(broker.connections_opened(), 1);

        session.close(&broker).await;
        assert!(broker.is_connection_open(&connection));
        assert_eq!(broker.channels_closed(), 1);
    }

    #[tokio::test]
    async fn test_supplied_channel_is_only_declared() {
        let broker = MemoryBroker::new();
        let connection = broker.connect("amqp://shared").await.unwrap();
        let channel = broker.open_channel(&connection).await.unwrap();
        let mut settings = settings(Some(connection));
        settings.channel = Some(channel);

        let (mut session, result) = BrokerSession::new().establish(&broker, &settings).await;

        assert!(result.is_ok());
        assert!(!session.owns_any());
        assert_eq!(broker.channels_opened(), 1);

        session.close(&broker).await;
        assert!(broker.is_channel_open(&channel));
        assert_eq!(session.channel(), Some(&channel));
    }

    #[tokio::test]
    async fn test_failed_channel_open_releases_new_connection() {
        let broker = MemoryBroker::new();
        broker.fail_next_channels(1);

        let (session, result) = BrokerSession::new().establish(&broker, &settings(None)).await;

        assert!(matches!(result, Err(TransportError::Channel(_))));
        assert!(session.connection().is_none());
        assert_eq!(broker.connections_closed(), 1);
    }

    #[tokio::test]
    async fn test_cleanup_close_failure_is_kept() {
        let broker = MemoryBroker::new();
        broker.fail_next_channels(1);
        broker.fail_next_closes(1);

        let (mut session, result) = BrokerSession::new().establish(&broker, &settings(None)).await;

        assert!(matches!(result, Err(TransportError::Channel(_))));
        assert!(session.connection().is_none());
        let errors = session.take_cleanup_errors();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], TransportError::Connection { .. }));
        assert!(session.take_cleanup_errors().is_empty());
    }

    #[tokio::test]
    async fn test_non_auto_close_resources_are_retained() {
        let broker = MemoryBroker::new();
        let mut settings = settings(None);
        settings.auto_close_connection = false;
        settings.auto_close_channel = false;

        let (mut session, result) = BrokerSession::new().establish(&broker, &settings).await;
        assert!(result.is_ok());
        assert!(!session.owns_any());

        session.close(&broker).await;
        let (session, result) = session.establish(&broker, &settings).await;
        assert!(result.is_ok());
        assert!(session.channel().is_some());
        assert_eq!(broker.connections_opened(), 1);
        assert_eq!(broker.channels_opened(), 1);
    }
}
