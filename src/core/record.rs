//! Log records and the context handed to payload formatters

use super::log_level::LogLevel;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// A record as received from the host logging framework
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub level: LogLevel,
    pub message: String,
    /// Caller-supplied structured metadata, passed through untouched
    pub metadata: Value,
}

impl LogRecord {
    pub fn new(level: LogLevel, message: impl Into<String>, metadata: Value) -> Self {
        Self {
            level,
            message: message.into(),
            metadata,
        }
    }
}

/// Everything a formatter may use to build a payload
///
/// Transport-wide tags are passed in explicitly so a formatter never has to
/// reach back into the transport.
#[derive(Debug, Clone, Copy)]
pub struct FormatContext<'a> {
    pub record: &'a LogRecord,
    /// Taken at format time
    pub timestamp: DateTime<Utc>,
    pub correlation_id: &'a str,
    pub source: Option<&'a str>,
    pub log_type: Option<&'a str>,
}

impl<'a> FormatContext<'a> {
    pub fn new(record: &'a LogRecord, correlation_id: &'a str) -> Self {
        Self {
            record,
            timestamp: Utc::now(),
            correlation_id,
            source: None,
            log_type: None,
        }
    }

    pub fn with_source(mut self, source: Option<&'a str>) -> Self {
        self.source = source;
        self
    }

    pub fn with_log_type(mut self, log_type: Option<&'a str>) -> Self {
        self.log_type = log_type;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}
