//! Payload formatters
//!
//! A formatter turns a [`FormatContext`] into the string that is published to
//! the exchange. Any `Fn(&FormatContext<'_>) -> Result<String>` closure works
//! as a formatter; [`JsonFormatter`] is used when none is configured.

use super::error::{Result, TransportError};
use super::record::FormatContext;
use super::timestamp::TimestampFormat;
use serde_json::{Map, Value};

/// Serializes a record into an outbound payload
pub trait PayloadFormatter: Send + Sync {
    fn format(&self, ctx: &FormatContext<'_>) -> Result<String>;

    /// Name used in diagnostics
    fn name(&self) -> &str {
        "custom"
    }
}

impl<F> PayloadFormatter for F
where
    F: Fn(&FormatContext<'_>) -> Result<String> + Send + Sync,
{
    fn format(&self, ctx: &FormatContext<'_>) -> Result<String> {
        self(ctx)
    }
}

/// Default formatter producing a single JSON object per record
///
/// ```text
/// {"correlationId":"...","level":"info","message":"hello","meta":{},"source":"api","timestamp":"2025-01-08T10:30:45.123Z"}
/// ```
///
/// `source` and `type` are omitted when not configured.
#[derive(Debug, Clone, Default)]
pub struct JsonFormatter {
    timestamp_format: TimestampFormat,
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_timestamp_format(mut self, format: TimestampFormat) -> Self {
        self.timestamp_format = format;
        self
    }

    /// Build the JSON object without serializing it
    pub fn to_value(&self, ctx: &FormatContext<'_>) -> Value {
        let mut obj = Map::new();
        obj.insert(
            "level".to_string(),
            Value::String(ctx.record.level.to_str().to_string()),
        );
        obj.insert(
            "timestamp".to_string(),
            self.timestamp_format.to_json_value(&ctx.timestamp),
        );
        obj.insert(
            "message".to_string(),
            Value::String(ctx.record.message.clone()),
        );
        obj.insert("meta".to_string(), ctx.record.metadata.clone());
        obj.insert(
            "correlationId".to_string(),
            Value::String(ctx.correlation_id.to_string()),
        );
        if let Some(source) = ctx.source {
            obj.insert("source".to_string(), Value::String(source.to_string()));
        }
        if let Some(log_type) = ctx.log_type {
            obj.insert("type".to_string(), Value::String(log_type.to_string()));
        }
        Value::Object(obj)
    }
}

impl PayloadFormatter for JsonFormatter {
    fn format(&self, ctx: &FormatContext<'_>) -> Result<String> {
        serde_json::to_string(&self.to_value(ctx))
            .map_err(|e| TransportError::formatter("JSON", e.to_string()))
    }

    fn name(&self) -> &str {
        "json"
    }
}
