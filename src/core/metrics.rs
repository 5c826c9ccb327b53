//! Transport metrics for observability
//!
//! Counters for publish throughput, backpressure and connection lifecycle.
//! Useful for spotting a broker that keeps the pending queue growing.

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics for transport observability
///
/// # Example
///
/// ```
/// use amqp_log_transport::TransportMetrics;
///
/// let metrics = TransportMetrics::new();
/// metrics.record_published();
/// metrics.record_backpressure();
///
/// assert_eq!(metrics.published(), 1);
/// assert_eq!(metrics.backpressure_events(), 1);
/// ```
#[derive(Debug)]
pub struct TransportMetrics {
    /// Messages accepted by the broker transport
    published: AtomicU64,

    /// Messages appended to the pending queue
    buffered: AtomicU64,

    /// Publish attempts that reported backpressure
    backpressure_events: AtomicU64,

    /// Messages dropped by the overflow policy
    dropped: AtomicU64,

    /// Setups that reached the ready state
    setups_completed: AtomicU64,

    /// Setups that failed
    setup_failures: AtomicU64,

    /// Transitions into the closed state
    closes: AtomicU64,

    /// Closes triggered by the idle timer
    idle_closes: AtomicU64,
}

impl TransportMetrics {
    /// Create a new metrics instance with all counters at zero
    pub const fn new() -> Self {
        Self {
            published: AtomicU64::new(0),
            buffered: AtomicU64::new(0),
            backpressure_events: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            setups_completed: AtomicU64::new(0),
            setup_failures: AtomicU64::new(0),
            closes: AtomicU64::new(0),
            idle_closes: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn buffered(&self) -> u64 {
        self.buffered.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn backpressure_events(&self) -> u64 {
        self.backpressure_events.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn setups_completed(&self) -> u64 {
        self.setups_completed.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn setup_failures(&self) -> u64 {
        self.setup_failures.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn closes(&self) -> u64 {
        self.closes.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn idle_closes(&self) -> u64 {
        self.idle_closes.load(Ordering::Relaxed)
    }

    /// Record an accepted publish
    #[inline]
    pub fn record_published(&self) -> u64 {
        self.published.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_buffered(&self) -> u64 {
        self.buffered.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_backpressure(&self) -> u64 {
        self.backpressure_events.fetch_add(1, Ordering::Relaxed)
    }

    /// Record a dropped message, returning the previous total
    #[inline]
    pub fn record_dropped(&self) -> u64 {
        self.dropped.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_setup_completed(&self) -> u64 {
        self.setups_completed.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_setup_failure(&self) -> u64 {
        self.setup_failures.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_close(&self) -> u64 {
        self.closes.fetch_add(1, Ordering::Relaxed)
    }

    #[inline]
    pub fn record_idle_close(&self) -> u64 {
        self.idle_closes.fetch_add(1, Ordering::Relaxed)
    }

    /// Share of publish attempts that hit backpressure, as a percentage
    ///
    /// Returns 0.0 if nothing has been attempted.
    pub fn backpressure_rate(&self) -> f64 {
        let pushed_back = self.backpressure_events() as f64;
        let total = self.published() as f64 + pushed_back;
        if total == 0.0 {
            0.0
        } else {
            (pushed_back / total) * 100.0
        }
    }

    /// Reset all metrics to zero
    pub fn reset(&self) {
        self.published.store(0, Ordering::Relaxed);
        self.buffered.store(0, Ordering::Relaxed);
        self.backpressure_events.store(0, Ordering::Relaxed);
        self.dropped.store(0, Ordering::Relaxed);
        self.setups_completed.store(0, Ordering::Relaxed);
        self.setup_failures.store(0, Ordering::Relaxed);
        self.closes.store(0, Ordering::Relaxed);
        self.idle_closes.store(0, Ordering::Relaxed);
    }
}

impl Default for TransportMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for TransportMetrics {
    /// Create a snapshot of the current metrics values
    fn clone(&self) -> Self {
        Self {
            published: AtomicU64::new(self.published()),
            buffered: AtomicU64::new(self.buffered()),
            backpressure_events: AtomicU64::new(self.backpressure_events()),
            dropped: AtomicU64::new(self.dropped()),
            setups_completed: AtomicU64::new(self.setups_completed()),
            setup_failures: AtomicU64::new(self.setup_failures()),
            closes: AtomicU64::new(self.closes()),
            idle_closes: AtomicU64::new(self.idle_closes()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = TransportMetrics::new();
        assert_eq!(metrics.published(), 0);
        assert_eq!(metrics.buffered(), 0);
        assert_eq!(metrics.dropped(), 0);
        assert_eq!(metrics.setups_completed(), 0);
        assert_eq!(metrics.idle_closes(), 0);
    }

    #[test]
    fn test_record_returns_previous_value() {
        let metrics = TransportMetrics::new();
        assert_eq!(metrics.record_dropped(), 0);
        assert_eq!(metrics.record_dropped(), 1);
        assert_eq!(metrics.dropped(), 2);
    }

    #[test]
    fn test_backpressure_rate() {
        let metrics = TransportMetrics::new();
        assert_eq!(metrics.backpressure_rate(), 0.0);

        for _ in 0..90 {
            metrics.record_published();
        }
        for _ in 0..10 {
            metrics.record_backpressure();
        }

        let rate = metrics.backpressure_rate();
        assert!((9.9..=10.1).contains(&rate), "Backpressure rate was {}", rate);
    }

    #[test]
    fn test_snapshot_is_independent() {
        let metrics = TransportMetrics::new();
        metrics.record_published();

        let snapshot = metrics.clone();
        metrics.record_published();

        assert_eq!(snapshot.published(), 1);
        assert_eq!(metrics.published(), 2);

        metrics.reset();
        assert_eq!(metrics.published(), 0);
        assert_eq!(snapshot.published(), 1);
    }
}
