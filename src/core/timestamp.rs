//! Timestamp rendering for outbound payloads
//!
//! The timestamp is taken when a record is formatted, not when it is finally
//! published, so a message that waits in the pending queue keeps the time it
//! was logged at.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How the `timestamp` field of a payload is rendered
///
/// # Examples
///
/// ```
/// use amqp_log_transport::core::TimestampFormat;
/// use chrono::Utc;
///
/// let value = TimestampFormat::Iso8601.to_json_value(&Utc::now());
/// assert!(value.as_str().unwrap().ends_with('Z'));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimestampFormat {
    /// ISO 8601 with milliseconds: `2025-01-08T10:30:45.123Z`
    #[default]
    Iso8601,

    /// ISO 8601 with microseconds: `2025-01-08T10:30:45.123456Z`
    Iso8601Micros,

    /// RFC 3339 with offset: `2025-01-08T10:30:45.123456+00:00`
    Rfc3339,

    /// Unix timestamp in milliseconds, emitted as a JSON number
    UnixMillis,

    /// Custom strftime format
    Custom(String),
}

impl TimestampFormat {
    /// Render a timestamp as text
    #[must_use]
    pub fn format(&self, datetime: &DateTime<Utc>) -> String {
        match self {
            TimestampFormat::Iso8601 => datetime.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            TimestampFormat::Iso8601Micros => datetime.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string(),
            TimestampFormat::Rfc3339 => datetime.to_rfc3339(),
            TimestampFormat::UnixMillis => datetime.timestamp_millis().to_string(),
            TimestampFormat::Custom(format_str) => datetime.format(format_str).to_string(),
        }
    }

    /// Render a timestamp as a JSON value
    ///
    /// Numeric formats become JSON numbers so consumers can sort on them
    /// without parsing.
    #[must_use]
    pub fn to_json_value(&self, datetime: &DateTime<Utc>) -> serde_json::Value {
        match self {
            TimestampFormat::UnixMillis => serde_json::Value::from(datetime.timestamp_millis()),
            other => serde_json::Value::String(other.format(datetime)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_datetime() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 8, 10, 30, 45)
            .single()
            .expect("valid datetime")
            + chrono::Duration::microseconds(123456)
    }

    #[test]
    fn test_iso8601_format() {
        assert_eq!(
            TimestampFormat::Iso8601.format(&fixed_datetime()),
            "2025-01-08T10:30:45.123Z"
        );
        assert_eq!(
            TimestampFormat::Iso8601Micros.format(&fixed_datetime()),
            "2025-01-08T10:30:45.123456Z"
        );
    }

    #[test]
    fn test_unix_millis_is_numeric_json() {
        let value = TimestampFormat::UnixMillis.to_json_value(&fixed_datetime());
        assert_eq!(value.as_i64(), Some(fixed_datetime().timestamp_millis()));
    }

    #[test]
    fn test_text_formats_are_string_json() {
        let value = TimestampFormat::Rfc3339.to_json_value(&fixed_datetime());
        assert!(value.as_str().unwrap().starts_with("2025-01-08T10:30:45"));
    }

    #[test]
    fn test_custom_format() {
        let format = TimestampFormat::Custom("%Y/%m/%d %H:%M".to_string());
        assert_eq!(format.format(&fixed_datetime()), "2025/01/08 10:30");
    }

    #[test]
    fn test_deserialize_from_options() {
        let format: TimestampFormat = serde_json::from_str("\"UnixMillis\"").unwrap();
        assert_eq!(format, TimestampFormat::UnixMillis);
    }
}
