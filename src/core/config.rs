//! Transport options
//!
//! Everything that can be expressed as plain data lives in
//! [`TransportOptions`], which deserializes from JSON using the option names
//! a host logging framework would pass (`autoCloseTime`, `durable`, ...).
//! Broker handles, formatters and callbacks are set on the builder instead.

use super::error::{Result, TransportError};
use super::overflow_policy::OverflowPolicy;
use super::timestamp::TimestampFormat;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Broker address used when none is configured
pub const DEFAULT_URL: &str = "amqp://localhost";

/// Exchange name used when none is configured
pub const DEFAULT_EXCHANGE: &str = "logs";

/// Idle time after which owned broker resources are closed
pub const DEFAULT_AUTO_CLOSE_TIME: Duration = Duration::from_millis(1000);

/// Whole milliseconds in `duration`, saturating at `u64::MAX`
pub(crate) fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Data-only transport options
///
/// # Example
///
/// ```
/// use amqp_log_transport::TransportOptions;
///
/// let options = TransportOptions::from_json(r#"{"exchange": "audit", "autoCloseTime": 250}"#).unwrap();
/// assert_eq!(options.exchange, "audit");
/// assert_eq!(options.url, "amqp://localhost");
/// assert_eq!(options.auto_close_duration().as_millis(), 250);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransportOptions {
    pub url: String,
    pub exchange: String,
    pub durable: bool,
    pub auto_close_channel: bool,
    pub auto_close_connection: bool,
    /// Milliseconds without activity before owned resources are closed
    pub auto_close_time: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub log_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    pub timestamp_format: TimestampFormat,
    /// Pending queue capacity; unbounded when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_pending: Option<usize>,
    pub overflow_policy: OverflowPolicy,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            exchange: DEFAULT_EXCHANGE.to_string(),
            durable: false,
            auto_close_channel: true,
            auto_close_connection: true,
            auto_close_time: duration_millis(DEFAULT_AUTO_CLOSE_TIME),
            source: None,
            log_type: None,
            correlation_id: None,
            timestamp_format: TimestampFormat::default(),
            max_pending: None,
            overflow_policy: OverflowPolicy::default(),
        }
    }
}

impl TransportOptions {
    /// Parse options from a JSON document; missing keys take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load options from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TransportError::config("options file", format!("{}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    pub fn auto_close_duration(&self) -> Duration {
        Duration::from_millis(self.auto_close_time)
    }

    /// Check the options for values the transport cannot work with
    ///
    /// `url` only matters when the transport has to connect by itself.
    pub fn validate(&self, connection_supplied: bool) -> Result<()> {
        if self.exchange.trim().is_empty() {
            return Err(TransportError::config("exchange", "name must not be empty"));
        }
        if !connection_supplied && self.url.trim().is_empty() {
            return Err(TransportError::config(
                "url",
                "a broker address is required when no connection or channel is supplied",
            ));
        }
        if self.auto_close_time == 0 {
            return Err(TransportError::config(
                "autoCloseTime",
                "idle time must be greater than zero",
            ));
        }
        if self.max_pending == Some(0) {
            return Err(TransportError::config(
                "maxPending",
                "capacity must be greater than zero",
            ));
        }
        if matches!(&self.correlation_id, Some(id) if id.is_empty()) {
            return Err(TransportError::config(
                "correlationId",
                "must not be empty when set",
            ));
        }
        Ok(())
    }
}
