//! Metrics collection for ledger monitoring.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use streamledger_common::Amount;

/// Ledger metrics.
#[derive(Debug, Default)]
pub struct Metrics {
    /// Streams created.
    pub streams_created: AtomicU64,
    /// Streams accepted by their receiver.
    pub streams_accepted: AtomicU64,
    /// Successful claims.
    pub claims: AtomicU64,
    /// Successful cancellations.
    pub cancels: AtomicU64,
    /// Operations rejected with an error.
    pub rejected: AtomicU64,
    /// Value locked into streams.
    pub value_locked: AtomicU64,
    /// Value paid to receivers.
    pub value_paid_out: AtomicU64,
    /// Value refunded to senders.
    pub value_refunded: AtomicU64,
}

impl Metrics {
    /// Create new metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record stream creation.
    pub fn stream_created(&self, amount: Amount) {
        self.streams_created.fetch_add(1, Ordering::Relaxed);
        add_saturating(&self.value_locked, amount);
    }

    /// Record stream acceptance.
    pub fn stream_accepted(&self) {
        self.streams_accepted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a claim.
    pub fn claimed(&self, amount: Amount) {
        self.claims.fetch_add(1, Ordering::Relaxed);
        add_saturating(&self.value_paid_out, amount);
    }

    /// Record a cancellation.
    pub fn cancelled(&self, to_receiver: Amount, to_sender: Amount) {
        self.cancels.fetch_add(1, Ordering::Relaxed);
        add_saturating(&self.value_paid_out, to_receiver);
        add_saturating(&self.value_refunded, to_sender);
    }

    /// Record a rejected operation.
    pub fn rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            streams_created: self.streams_created.load(Ordering::Relaxed),
            streams_accepted: self.streams_accepted.load(Ordering::Relaxed),
            claims: self.claims.load(Ordering::Relaxed),
            cancels: self.cancels.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            value_locked: self.value_locked.load(Ordering::Relaxed),
            value_paid_out: self.value_paid_out.load(Ordering::Relaxed),
            value_refunded: self.value_refunded.load(Ordering::Relaxed),
        }
    }

    /// Export metrics in Prometheus format.
    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        format!(
            r#"# HELP streamledger_streams_created Total streams created
# TYPE streamledger_streams_created counter
streamledger_streams_created {}

# HELP streamledger_streams_accepted Total streams accepted
# TYPE streamledger_streams_accepted counter
streamledger_streams_accepted {}

# HELP streamledger_claims Total successful claims
# TYPE streamledger_claims counter
streamledger_claims {}

# HELP streamledger_cancels Total successful cancellations
# TYPE streamledger_cancels counter
streamledger_cancels {}

# HELP streamledger_rejected Total rejected operations
# TYPE streamledger_rejected counter
streamledger_rejected {}

# HELP streamledger_value_locked Total value locked into streams
# TYPE streamledger_value_locked counter
streamledger_value_locked {}

# HELP streamledger_value_paid_out Total value paid to receivers
# TYPE streamledger_value_paid_out counter
streamledger_value_paid_out {}

# HELP streamledger_value_refunded Total value refunded to senders
# TYPE streamledger_value_refunded counter
streamledger_value_refunded {}
"#,
            snapshot.streams_created,
            snapshot.streams_accepted,
            snapshot.claims,
            snapshot.cancels,
            snapshot.rejected,
            snapshot.value_locked,
            snapshot.value_paid_out,
            snapshot.value_refunded,
        )
    }
}

/// Value counters stick at `u64::MAX` instead of wrapping.
fn add_saturating(counter: &AtomicU64, amount: Amount) {
    // The closure always returns Some, so the update cannot fail.
    let _ = counter.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
        Some(current.saturating_add(amount))
    });
}

/// Snapshot of metrics at a point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub streams_created: u64,
    pub streams_accepted: u64,
    pub claims: u64,
    pub cancels: u64,
    pub rejected: u64,
    pub value_locked: u64,
    pub value_paid_out: u64,
    pub value_refunded: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_increment() {
        let metrics = Metrics::new();

        metrics.stream_created(1000);
        metrics.stream_accepted();
        metrics.claimed(250);
        metrics.cancelled(100, 650);
        metrics.rejected();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.streams_created, 1);
        assert_eq!(snapshot.claims, 1);
        assert_eq!(snapshot.cancels, 1);
        assert_eq!(snapshot.rejected, 1);
        assert_eq!(snapshot.value_locked, 1000);
        assert_eq!(snapshot.value_paid_out, 350);
        assert_eq!(snapshot.value_refunded, 650);
    }

    #[test]
    fn test_value_counters_saturate() {
        let metrics = Metrics::new();

        metrics.stream_created(u64::MAX - 1);
        metrics.stream_created(10);
        metrics.cancelled(u64::MAX, u64::MAX);
        metrics.claimed(1);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.streams_created, 2);
        assert_eq!(snapshot.value_locked, u64::MAX);
        assert_eq!(snapshot.value_paid_out, u64::MAX);
        assert_eq!(snapshot.value_refunded, u64::MAX);
    }

    #[test]
    fn test_prometheus_export() {
        let metrics = Metrics::new();
        metrics.stream_created(42);

        let output = metrics.to_prometheus();
        assert!(output.contains("streamledger_streams_created 1"));
        assert!(output.contains("streamledger_value_locked 42"));
    }
}
