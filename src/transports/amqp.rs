//! AMQP log transport
//!
//! [`AmqpTransport`] is the handle a host logging framework holds. Records are
//! formatted on the caller's thread and handed to the publisher task, which
//! owns the broker session and the pending queue. Calls never wait on the
//! broker.

use super::publisher::{Command, Publisher, PublisherState};
use crate::broker::{BrokerClient, SessionSettings};
use crate::core::config::duration_millis;
use crate::core::diagnostics::{self, stderr_error_handler, ErrorHandler};
use crate::core::{
    generate_correlation_id, FormatContext, JsonFormatter, LogLevel, LogRecord, OverflowCallback,
    OverflowPolicy, PayloadFormatter, PendingMessage, PendingQueue, PublishCallback, Result,
    TimestampFormat, Transport, TransportError, TransportMetrics, TransportOptions,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};

/// Log transport publishing to a fanout exchange
///
/// Dropping every handle stops the publisher task. Messages still pending at
/// that point have their callbacks completed with
/// [`TransportError::TransportClosed`].
///
/// # Example
///
/// ```
/// use amqp_log_transport::broker::MemoryBroker;
/// use amqp_log_transport::{AmqpTransport, LogLevel};
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let broker = MemoryBroker::new();
/// let transport = AmqpTransport::builder(broker.clone())
///     .exchange("logs")
///     .build()
///     .unwrap();
///
/// transport.log(LogLevel::Info, "hello", json!({}), None);
/// transport.flush_and_close().await.unwrap();
///
/// assert_eq!(broker.published_count("logs"), 1);
/// # });
/// ```
pub struct AmqpTransport {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<PublisherState>,
    formatter: Arc<dyn PayloadFormatter>,
    correlation_id: String,
    source: Option<String>,
    log_type: Option<String>,
    metrics: Arc<TransportMetrics>,
    on_error: ErrorHandler,
}

impl AmqpTransport {
    /// Create a builder around a broker client
    #[must_use]
    pub fn builder<B: BrokerClient>(client: B) -> TransportBuilder<B> {
        TransportBuilder::new(client)
    }

    /// Format a record and hand it to the publisher
    ///
    /// The callback receives `Ok(())` once the broker transport accepted the
    /// payload. It receives an error only when the record could not be
    /// formatted, was dropped by a bounded queue, or the transport went away
    /// first.
    pub fn log(
        &self,
        level: LogLevel,
        message: impl Into<String>,
        metadata: Value,
        callback: Option<PublishCallback>,
    ) {
        self.submit(LogRecord::new(level, message, metadata), callback);
    }

    /// Report an uncaught error; published at [`LogLevel::Error`]
    pub fn log_exception(
        &self,
        message: impl Into<String>,
        metadata: Value,
        callback: Option<PublishCallback>,
    ) {
        self.log(LogLevel::Error, message, metadata, callback);
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message, Value::Null, None);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message, Value::Null, None);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message, Value::Null, None);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message, Value::Null, None);
    }

    fn submit(&self, record: LogRecord, callback: Option<PublishCallback>) {
        let ctx = FormatContext::new(&record, &self.correlation_id)
            .with_source(self.source.as_deref())
            .with_log_type(self.log_type.as_deref());

        let payload = match self.formatter.format(&ctx) {
            Ok(payload) => payload,
            Err(err) => {
                diagnostics::report(&self.on_error, &err);
                if let Some(callback) = callback {
                    diagnostics::run_isolated("publish callback", || callback(Err(err)));
                }
                return;
            }
        };

        let message = PendingMessage::new(payload, callback);
        if let Err(mpsc::error::SendError(Command::Log(message))) =
            self.commands.send(Command::Log(message))
        {
            diagnostics::run_isolated("publish callback", || {
                message.complete(Err(TransportError::ChannelSendError))
            });
        }
    }

    /// Close owned broker resources
    ///
    /// Returns immediately. Safe to call repeatedly and with borrowed
    /// resources, which are left open. The next `log` call reconnects.
    pub fn close(&self) {
        let _ = self.commands.send(Command::Close { done: None });
    }

    /// Close and wait until the publisher has processed the request
    ///
    /// Everything the broker accepts is published before owned resources are
    /// released; anything still refused stays pending. While a setup is in
    /// flight this waits for it to resolve, so records buffered before the
    /// first connection still go out.
    pub async fn flush_and_close(&self) -> Result<()> {
        let (done, finished) = oneshot::channel();
        self.commands
            .send(Command::Close { done: Some(done) })
            .map_err(|_| TransportError::TransportClosed)?;
        finished.await.map_err(|_| TransportError::TransportClosed)
    }

    /// Current lifecycle state
    pub fn state(&self) -> PublisherState {
        *self.state.borrow()
    }

    /// Wait until the publisher reaches `target`
    pub async fn wait_for_state(&self, target: PublisherState) -> Result<PublisherState> {
        let mut state = self.state.clone();
        let reached = state
            .wait_for(|current| *current == target)
            .await
            .map(|current| *current);
        reached.map_err(|_| TransportError::TransportClosed)
    }

    /// Number of messages waiting in the pending queue
    ///
    /// Returns 0 once the publisher task has stopped.
    pub async fn pending_len(&self) -> usize {
        let (reply, len) = oneshot::channel();
        if self.commands.send(Command::PendingLen(reply)).is_err() {
            return 0;
        }
        len.await.unwrap_or(0)
    }

    /// Get the transport metrics
    ///
    /// # Example
    ///
    /// ```
    /// use amqp_log_transport::broker::MemoryBroker;
    /// use amqp_log_transport::AmqpTransport;
    ///
    /// # tokio_test::block_on(async {
    /// let transport = AmqpTransport::builder(MemoryBroker::new()).build().unwrap();
    ///
    /// transport.info("started");
    /// transport.flush_and_close().await.unwrap();
    ///
    /// let metrics = transport.metrics();
    /// println!("Published: {}", metrics.published());
    /// println!("Backpressure rate: {:.2}%", metrics.backpressure_rate());
    /// # });
    /// ```
    pub fn metrics(&self) -> &TransportMetrics {
        &self.metrics
    }

    /// Correlation id stamped on every record from this transport
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}

impl Transport for AmqpTransport {
    fn log(
        &self,
        level: LogLevel,
        message: String,
        metadata: Value,
        callback: Option<PublishCallback>,
    ) {
        self.submit(LogRecord::new(level, message, metadata), callback);
    }

    fn close(&self) {
        let _ = self.commands.send(Command::Close { done: None });
    }

    fn name(&self) -> &str {
        "amqp"
    }
}

/// Builder for [`AmqpTransport`]
///
/// Plain options can come from [`TransportOptions`]; broker handles,
/// formatters and callbacks are set here directly.
///
/// # Example
/// ```
/// use amqp_log_transport::broker::MemoryBroker;
/// use amqp_log_transport::prelude::*;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let transport = AmqpTransport::builder(MemoryBroker::new())
///     .url("amqp://broker.internal")
///     .exchange("audit")
///     .durable(true)
///     .auto_close_time(Duration::from_secs(5))
///     .source("billing")
///     .max_pending(10_000)
///     .overflow_policy(OverflowPolicy::DropOldest)
///     .on_error(Arc::new(|err: &TransportError| eprintln!("broker trouble: {}", err)))
///     .build()
///     .unwrap();
/// # drop(transport);
/// # });
/// ```
pub struct TransportBuilder<B: BrokerClient> {
    client: B,
    options: TransportOptions,
    connection: Option<B::Connection>,
    channel: Option<B::Channel>,
    formatter: Option<Arc<dyn PayloadFormatter>>,
    on_overflow: Option<OverflowCallback>,
    on_error: Option<ErrorHandler>,
}

impl<B: BrokerClient> TransportBuilder<B> {
    pub fn new(client: B) -> Self {
        Self {
            client,
            options: TransportOptions::default(),
            connection: None,
            channel: None,
            formatter: None,
            on_overflow: None,
            on_error: None,
        }
    }

    /// Replace all plain options at once
    #[must_use = "builder methods return a new value"]
    pub fn options(mut self, options: TransportOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.options.url = url.into();
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn exchange(mut self, exchange: impl Into<String>) -> Self {
        self.options.exchange = exchange.into();
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn durable(mut self, durable: bool) -> Self {
        self.options.durable = durable;
        self
    }

    /// Publish over an existing connection
    ///
    /// The connection is never closed by the transport.
    #[must_use = "builder methods return a new value"]
    pub fn connection(mut self, connection: B::Connection) -> Self {
        self.connection = Some(connection);
        self
    }

    /// Publish over an existing channel, possibly shared with other producers
    ///
    /// The channel is never closed by the transport and no idle timer runs
    /// unless the transport creates something itself.
    #[must_use = "builder methods return a new value"]
    pub fn channel(mut self, channel: B::Channel) -> Self {
        self.channel = Some(channel);
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn auto_close_channel(mut self, enabled: bool) -> Self {
        self.options.auto_close_channel = enabled;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn auto_close_connection(mut self, enabled: bool) -> Self {
        self.options.auto_close_connection = enabled;
        self
    }

    /// Idle time before owned resources are closed
    #[must_use = "builder methods return a new value"]
    pub fn auto_close_time(mut self, idle: Duration) -> Self {
        self.options.auto_close_time = duration_millis(idle);
        self
    }

    /// Replace the default JSON formatter
    #[must_use = "builder methods return a new value"]
    pub fn formatter<F: PayloadFormatter + 'static>(mut self, formatter: F) -> Self {
        self.formatter = Some(Arc::new(formatter));
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.options.source = Some(source.into());
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn log_type(mut self, log_type: impl Into<String>) -> Self {
        self.options.log_type = Some(log_type.into());
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.options.correlation_id = Some(correlation_id.into());
        self
    }

    /// Timestamp format used by the default formatter
    #[must_use = "builder methods return a new value"]
    pub fn timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.options.timestamp_format = format;
        self
    }

    /// Bound the pending queue
    ///
    /// Unbounded by default, in which case the queue grows for as long as
    /// the broker is unreachable.
    #[must_use = "builder methods return a new value"]
    pub fn max_pending(mut self, capacity: usize) -> Self {
        self.options.max_pending = Some(capacity);
        self
    }

    /// What to drop once `max_pending` is reached
    #[must_use = "builder methods return a new value"]
    pub fn overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.options.overflow_policy = policy;
        self
    }

    /// Called with the total drop count when the queue overflows
    ///
    /// Only used with [`OverflowPolicy::AlertAndDrop`].
    #[must_use = "builder methods return a new value"]
    pub fn on_overflow(mut self, callback: OverflowCallback) -> Self {
        self.on_overflow = Some(callback);
        self
    }

    /// Receives setup and close failures
    ///
    /// Defaults to printing them to stderr.
    #[must_use = "builder methods return a new value"]
    pub fn on_error(mut self, handler: ErrorHandler) -> Self {
        self.on_error = Some(handler);
        self
    }

    /// Validate the options and start the publisher task
    ///
    /// Must be called from within a tokio runtime. Connection setup starts
    /// right away in the background.
    pub fn build(self) -> Result<AmqpTransport> {
        let supplied = self.connection.is_some() || self.channel.is_some();
        self.options.validate(supplied)?;

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| TransportError::config("runtime", e.to_string()))?;

        let options = self.options;
        let formatter: Arc<dyn PayloadFormatter> = match self.formatter {
            Some(formatter) => formatter,
            None => Arc::new(
                JsonFormatter::new().with_timestamp_format(options.timestamp_format.clone()),
            ),
        };
        let correlation_id = options
            .correlation_id
            .clone()
            .unwrap_or_else(generate_correlation_id);
        let pending = match options.max_pending {
            Some(capacity) => PendingQueue::bounded(capacity, options.overflow_policy),
            None => PendingQueue::new(),
        };
        let settings = SessionSettings {
            url: options.url.clone(),
            exchange: options.exchange.clone(),
            durable: options.durable,
            connection: self.connection,
            channel: self.channel,
            auto_close_connection: options.auto_close_connection,
            auto_close_channel: options.auto_close_channel,
        };

        let on_error = self.on_error.unwrap_or_else(stderr_error_handler);
        let metrics = Arc::new(TransportMetrics::new());
        let (state_tx, state_rx) = watch::channel(PublisherState::Uninitialized);
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();

        let publisher = Publisher::new(
            Arc::new(self.client),
            settings,
            pending,
            options.auto_close_duration(),
            state_tx,
            Arc::clone(&metrics),
            Arc::clone(&on_error),
            self.on_overflow,
        );
        runtime.spawn(publisher.run(commands_rx));

        Ok(AmqpTransport {
            commands: commands_tx,
            state: state_rx,
            formatter,
            correlation_id,
            source: options.source,
            log_type: options.log_type,
            metrics,
            on_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::MemoryBroker;
    use parking_lot::Mutex;
    use serde_json::json;

    fn recorder() -> (Arc<Mutex<Vec<Result<()>>>>, impl Fn() -> PublishCallback) {
        let results = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&results);
        let make = move || -> PublishCallback {
            let sink = Arc::clone(&sink);
            Box::new(move |result| sink.lock().push(result))
        };
        (results, make)
    }

    #[test]
    fn test_build_requires_runtime() {
        let result = AmqpTransport::builder(MemoryBroker::new()).build();
        assert!(matches!(
            result,
            Err(TransportError::InvalidConfiguration { .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_options_are_rejected() {
        let result = AmqpTransport::builder(MemoryBroker::new())
            .exchange("")
            .build();
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_payload_carries_transport_tags() {
        let broker = MemoryBroker::new();
        let transport = AmqpTransport::builder(broker.clone())
            .source("billing")
            .log_type("audit")
            .correlation_id("corr-42")
            .build()
            .unwrap();

        transport.log(LogLevel::Warn, "disk low", json!({"free": 3}), None);
        transport.flush_and_close().await.unwrap();

        let published = broker.published("logs");
        let payload: Value = serde_json::from_str(&published[0]).unwrap();
        assert_eq!(payload["level"], "warn");
        assert_eq!(payload["message"], "disk low");
        assert_eq!(payload["meta"]["free"], 3);
        assert_eq!(payload["source"], "billing");
        assert_eq!(payload["type"], "audit");
        assert_eq!(payload["correlationId"], "corr-42");
    }

    #[tokio::test(start_paused = true)]
    async fn test_generated_correlation_id_is_stable() {
        let broker = MemoryBroker::new();
        let transport = AmqpTransport::builder(broker.clone()).build().unwrap();

        transport.info("one");
        transport.info("two");
        transport.flush_and_close().await.unwrap();

        let ids: Vec<String> = broker
            .published("logs")
            .iter()
            .map(|p| serde_json::from_str::<Value>(p).unwrap()["correlationId"].to_string())
            .collect();
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0], ids[1]);
        assert!(ids[0].contains(transport.correlation_id()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_formatter_error_reaches_callback() {
        let broker = MemoryBroker::new();
        let errors = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&errors);
        let transport = AmqpTransport::builder(broker.clone())
            .formatter(|_ctx: &FormatContext<'_>| -> Result<String> {
                Err(TransportError::formatter("test", "unserializable"))
            })
            .on_error(Arc::new(move |_err: &TransportError| *counter.lock() += 1))
            .build()
            .unwrap();
        let (results, callback) = recorder();

        transport.log(LogLevel::Info, "x", Value::Null, Some(callback()));
        transport.flush_and_close().await.unwrap();

        let results = results.lock();
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(TransportError::FormatterError { .. })));
        assert_eq!(*errors.lock(), 1);
        assert_eq!(broker.published_count("logs"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_trait_object_surface() {
        let broker = MemoryBroker::new();
        let transport: Box<dyn Transport> =
            Box::new(AmqpTransport::builder(broker.clone()).build().unwrap());
        let (results, callback) = recorder();

        transport.on(LogLevel::Info, Box::new(|_: LogLevel| {}));
        transport.log_exception("boom".to_string(), json!({"stack": "..."}), Some(callback()));
        assert_eq!(transport.name(), "amqp");

        while results.lock().is_empty() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        assert!(results.lock()[0].is_ok());
        let payload: Value = serde_json::from_str(&broker.published("logs")[0]).unwrap();
        assert_eq!(payload["level"], "error");
        transport.close();
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_len_while_connecting() {
        let broker = MemoryBroker::new();
        broker.set_connect_delay(Some(Duration::from_millis(50)));
        let transport = AmqpTransport::builder(broker.clone()).build().unwrap();

        transport.info("a");
        transport.info("b");
        assert_eq!(transport.pending_len().await, 2);
        assert_eq!(transport.state(), PublisherState::Connecting);

        transport.wait_for_state(PublisherState::Ready).await.unwrap();
        assert_eq!(transport.pending_len().await, 0);
        assert_eq!(broker.published_count("logs"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_auto_close_time_saturates() {
        let broker = MemoryBroker::new();
        let builder = AmqpTransport::builder(broker.clone()).auto_close_time(Duration::MAX);
        assert_eq!(builder.options.auto_close_time, u64::MAX);

        let transport = builder.build().unwrap();
        transport.info("kept open");
        transport.wait_for_state(PublisherState::Ready).await.unwrap();

        tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
        assert_eq!(transport.state(), PublisherState::Ready);
        assert_eq!(broker.published_count("logs"), 1);
    }
}
