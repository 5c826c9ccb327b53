//! Transport trait: the surface a host logging framework calls into

use super::log_level::LogLevel;
use super::pending_queue::PublishCallback;
use serde_json::Value;

/// Listener accepted by [`Transport::on`]
pub type EventListener = Box<dyn Fn(LogLevel) + Send + Sync>;

pub trait Transport: Send + Sync {
    /// Hand a record to the transport
    ///
    /// Never blocks on the broker. The callback, if any, fires once the
    /// record was accepted by the broker transport.
    fn log(
        &self,
        level: LogLevel,
        message: String,
        metadata: Value,
        callback: Option<PublishCallback>,
    );

    /// Report an uncaught exception; same as logging at error level
    fn log_exception(&self, message: String, metadata: Value, callback: Option<PublishCallback>) {
        self.log(LogLevel::Error, message, metadata, callback);
    }

    /// Event subscription hook expected by host frameworks
    ///
    /// Accepts the listener and does nothing with it.
    fn on(&self, _level: LogLevel, _listener: EventListener) {}

    fn close(&self);

    fn name(&self) -> &str;
}
