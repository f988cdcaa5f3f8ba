//! Simulation metrics.

use std::collections::BTreeMap;

/// Simulation metrics.
#[derive(Debug, Clone, Default)]
pub struct SimulationMetrics {
    /// Total operations attempted.
    pub total_operations: u64,
    /// Operations that succeeded.
    pub successful_operations: u64,
    /// Rejections by error code.
    pub rejections: BTreeMap<&'static str, u64>,
    /// Conservation checks run.
    pub conservation_checks: u64,
}

impl SimulationMetrics {
    /// Create new metrics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful operation.
    pub fn record_success(&mut self) {
        self.total_operations += 1;
        self.successful_operations += 1;
    }

    /// Record a rejected operation.
    pub fn record_rejection(&mut self, code: &'static str) {
        self.total_operations += 1;
        *self.rejections.entry(code).or_insert(0) += 1;
    }

    /// Record a passed conservation check.
    pub fn record_conservation_check(&mut self) {
        self.conservation_checks += 1;
    }

    /// Total rejected operations.
    pub fn rejected_operations(&self) -> u64 {
        self.rejections.values().sum()
    }

    /// Get success rate.
    pub fn success_rate(&self) -> f64 {
        if self.total_operations == 0 {
            return 0.0;
        }

        self.successful_operations as f64 / self.total_operations as f64
    }

    /// Fold another task's metrics into this one.
    pub fn merge(&mut self, other: &SimulationMetrics) {
        self.total_operations += other.total_operations;
        self.successful_operations += other.successful_operations;
        self.conservation_checks += other.conservation_checks;
        for (code, count) in &other.rejections {
            *self.rejections.entry(code).or_insert(0) += count;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics() {
        let mut metrics = SimulationMetrics::new();

        metrics.record_success();
        metrics.record_success();
        metrics.record_success();
        metrics.record_rejection("STREAM_NOT_FOUND");

        assert_eq!(metrics.total_operations, 4);
        assert_eq!(metrics.successful_operations, 3);
        assert_eq!(metrics.rejected_operations(), 1);
        assert_eq!(metrics.success_rate(), 0.75);
    }

    #[test]
    fn test_merge() {
        let mut a = SimulationMetrics::new();
        a.record_rejection("STREAM_NOT_FOUND");

        let mut b = SimulationMetrics::new();
        b.record_success();
        b.record_rejection("STREAM_NOT_FOUND");
        b.record_rejection("NOT_PARTICIPANT");
        b.record_conservation_check();

        a.merge(&b);
        assert_eq!(a.total_operations, 4);
        assert_eq!(a.rejections["STREAM_NOT_FOUND"], 2);
        assert_eq!(a.rejections["NOT_PARTICIPANT"], 1);
        assert_eq!(a.conservation_checks, 1);
    }
}
