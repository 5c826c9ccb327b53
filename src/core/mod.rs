//! Core transport types and traits

pub mod config;
pub mod correlation;
pub mod diagnostics;
pub mod error;
pub mod formatter;
pub mod log_level;
pub mod metrics;
pub mod overflow_policy;
pub mod pending_queue;
pub mod record;
pub mod timestamp;
pub mod transport;

pub use config::{TransportOptions, DEFAULT_AUTO_CLOSE_TIME, DEFAULT_EXCHANGE, DEFAULT_URL};
pub use correlation::generate_correlation_id;
pub use diagnostics::{stderr_error_handler, ErrorHandler};
pub use error::{Result, TransportError};
pub use formatter::{JsonFormatter, PayloadFormatter};
pub use log_level::LogLevel;
pub use metrics::TransportMetrics;
pub use overflow_policy::{OverflowCallback, OverflowPolicy};
pub use pending_queue::{Admission, PendingMessage, PendingQueue, PublishCallback};
pub use record::{FormatContext, LogRecord};
pub use timestamp::TimestampFormat;
pub use transport::{EventListener, Transport};
