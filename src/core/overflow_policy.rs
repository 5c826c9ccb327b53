//! Overflow policies for a bounded pending queue
//!
//! By default the pending queue is unbounded: while the broker is unreachable
//! every logged record is held in memory. Setting a capacity trades that
//! unbounded growth for message loss, and the policy decides which message is
//! lost.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Policy applied when the pending queue is at capacity
///
/// # Example
///
/// ```
/// use amqp_log_transport::OverflowPolicy;
///
/// // Default behavior: alert and drop the incoming message
/// let policy = OverflowPolicy::default();
/// assert_eq!(policy, OverflowPolicy::AlertAndDrop);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverflowPolicy {
    /// Reject the incoming message
    ///
    /// Only metrics record the loss.
    DropNewest,

    /// Evict the oldest buffered message to make room
    ///
    /// Keeps the most recent records, which are usually the ones explaining
    /// why the broker went away.
    DropOldest,

    /// Reject the incoming message and alert via callback and stderr
    AlertAndDrop,
}

impl Default for OverflowPolicy {
    fn default() -> Self {
        OverflowPolicy::AlertAndDrop
    }
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowPolicy::DropNewest => write!(f, "DropNewest"),
            OverflowPolicy::DropOldest => write!(f, "DropOldest"),
            OverflowPolicy::AlertAndDrop => write!(f, "AlertAndDrop"),
        }
    }
}

/// Callback type for overflow notifications
///
/// Called when messages are dropped due to queue overflow.
/// The parameter is the total count of dropped messages so far.
pub type OverflowCallback = Arc<dyn Fn(u64) + Send + Sync>;
