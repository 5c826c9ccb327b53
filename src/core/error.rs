//! Error types for the transport

pub type Result<T> = std::result::Result<T, TransportError>;

#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// Broker unreachable or handshake rejected
    #[error("Connection to '{url}' failed: {message}")]
    Connection { url: String, message: String },

    /// Channel could not be opened on an established connection
    #[error("Channel error: {0}")]
    Channel(String),

    /// Exchange declaration conflicts with an existing declaration
    #[error("Exchange '{exchange}' declaration failed: {message}")]
    Exchange { exchange: String, message: String },

    /// Pending queue reached its configured capacity
    #[error("Pending queue full: message dropped at capacity {capacity}")]
    QueueOverflow { capacity: usize },

    /// Transport was discarded before the message could be published
    #[error("Transport closed before the message was published")]
    TransportClosed,

    /// Command channel to the publisher task is gone
    #[error("Failed to send log record to publisher task")]
    ChannelSendError,

    /// Invalid configuration with details
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// Formatter error with format type
    #[error("Formatter error ({format_type}): {message}")]
    FormatterError {
        format_type: String,
        message: String,
    },

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(String),
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::JsonError(err.to_string())
    }
}

impl TransportError {
    /// Create a connection error for the given broker address
    pub fn connection(url: impl Into<String>, message: impl Into<String>) -> Self {
        TransportError::Connection {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a channel error
    pub fn channel<S: Into<String>>(msg: S) -> Self {
        TransportError::Channel(msg.into())
    }

    /// Create an exchange declaration error
    pub fn exchange(exchange: impl Into<String>, message: impl Into<String>) -> Self {
        TransportError::Exchange {
            exchange: exchange.into(),
            message: message.into(),
        }
    }

    /// Create a queue overflow error
    pub fn queue_overflow(capacity: usize) -> Self {
        TransportError::QueueOverflow { capacity }
    }

    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        TransportError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a formatter error
    pub fn formatter(format_type: impl Into<String>, message: impl Into<String>) -> Self {
        TransportError::FormatterError {
            format_type: format_type.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = TransportError::queue_overflow(100);
        assert!(matches!(err, TransportError::QueueOverflow { .. }));

        let err = TransportError::config("exchange", "must not be empty");
        assert!(matches!(err, TransportError::InvalidConfiguration { .. }));

        let err = TransportError::connection("amqp://localhost", "refused");
        assert!(matches!(err, TransportError::Connection { .. }));
    }

    #[test]
    fn test_error_display() {
        let err = TransportError::queue_overflow(1000);
        assert_eq!(
            err.to_string(),
            "Pending queue full: message dropped at capacity 1000"
        );

        let err = TransportError::exchange("logs", "PRECONDITION_FAILED");
        assert_eq!(
            err.to_string(),
            "Exchange 'logs' declaration failed: PRECONDITION_FAILED"
        );

        let err = TransportError::formatter("JSON", "Invalid field type");
        assert_eq!(err.to_string(), "Formatter error (JSON): Invalid field type");
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: TransportError = json_err.into();
        assert!(matches!(err, TransportError::JsonError(_)));
        assert!(err.to_string().starts_with("JSON error"));
    }
}
