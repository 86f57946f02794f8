//! Metrics for a stressor instance.
//!
//! Lightweight counters for observability

use std::sync::atomic::{ AtomicU64, Ordering };
use std::time::Duration;

/// Per-instance counters
pub struct Metrics {
    pub bogo_ops: AtomicU64,
    pub failures: AtomicU64,
    pub restarts: AtomicU64,
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            bogo_ops: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            restarts: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_bogo_op(&self) {
        self.bogo_ops.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_failures(&self, count: u64) {
        self.failures.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_restart(&self) {
        self.restarts.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn bogo_ops(&self) -> u64 {
        self.bogo_ops.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self, elapsed: Duration) -> MetricsSnapshot {
        MetricsSnapshot {
            bogo_ops: self.bogo_ops.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            restarts: self.restarts.load(Ordering::Relaxed),
            elapsed,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub bogo_ops: u64,
    pub failures: u64,
    pub restarts: u64,
    pub elapsed: Duration,
}

impl MetricsSnapshot {
    pub fn ops_per_sec(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.bogo_ops as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Fold another instance's counters into this one
    pub fn merge(&mut self, other: &MetricsSnapshot) {
        self.bogo_ops += other.bogo_ops;
        self.failures += other.failures;
        self.restarts += other.restarts;
        self.elapsed = self.elapsed.max(other.elapsed);
    }
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ops={} failures={} restarts={} elapsed={:.2}s rate={:.0}/s",
            self.bogo_ops,
            self.failures,
            self.restarts,
            self.elapsed.as_secs_f64(),
            self.ops_per_sec()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics() {
        let m = Metrics::new();
        m.record_bogo_op();
        m.record_bogo_op();
        m.record_failures(3);
        m.record_restart();

        let s = m.snapshot(Duration::from_secs(2));
        assert_eq!(s.bogo_ops, 2);
        assert_eq!(s.failures, 3);
        assert_eq!(s.restarts, 1);
        assert!((s.ops_per_sec() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_snapshot_merge() {
        let mut total = MetricsSnapshot::default();
        total.merge(&MetricsSnapshot {
            bogo_ops: 10,
            failures: 1,
            restarts: 0,
            elapsed: Duration::from_secs(1),
        });
        total.merge(&MetricsSnapshot {
            bogo_ops: 5,
            failures: 0,
            restarts: 2,
            elapsed: Duration::from_secs(3),
        });
        assert_eq!(total.bogo_ops, 15);
        assert_eq!(total.failures, 1);
        assert_eq!(total.restarts, 2);
        assert_eq!(total.elapsed, Duration::from_secs(3));
        assert!(total.to_string().starts_with("ops=15 failures=1 restarts=2"));
    }
}
