//! Correlation id generation

use chrono::Utc;
use rand::Rng;

/// Generate a correlation id of the form `<unix-millis>-<16 hex digits>`
///
/// One id is generated per transport instance when none is configured, so
/// every record published by that instance can be tied together downstream.
pub fn generate_correlation_id() -> String {
    let random: u64 = rand::thread_rng().gen();
    format!("{}-{:016x}", Utc::now().timestamp_millis(), random)
}
