//! Per-instance stress context.
//!
//! [`RunControl`] is the shared stop predicate; [`StressArgs`] carries it into
//! a stressor together with the instance identity, bogo-op limit and counters.
//! Stressors only read the predicate and only increment the counters.

use std::fmt;
use std::path::Path;
use std::sync::atomic::{ AtomicBool, Ordering };
use std::sync::Arc;
use std::time::{ Duration, Instant };

use nix::unistd::Pid;

use crate::metrics::{ Metrics, MetricsSnapshot };
use crate::temp::TempPaths;

/// Cooperative, latching stop predicate shared by every instance of a run.
#[derive(Debug)]
pub struct RunControl {
    running: AtomicBool,
    deadline: Option<Instant>,
}

impl RunControl {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            running: AtomicBool::new(true),
            deadline: None,
        })
    }

    /// Stop automatically once `timeout` has elapsed
    pub fn with_timeout(timeout: Duration) -> Arc<Self> {
        Arc::new(Self {
            running: AtomicBool::new(true),
            deadline: Some(Instant::now() + timeout),
        })
    }

    /// Once this returns `false` it never returns `true` again.
    #[inline]
    pub fn should_continue(&self) -> bool {
        if !self.running.load(Ordering::Relaxed) {
            return false;
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                self.stop();
                return false;
            }
        }
        true
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

/// Everything a stressor instance needs from the outside world.
pub struct StressArgs {
    name: &'static str,
    instance: u32,
    owner: Pid,
    max_ops: u64,
    verify: bool,
    temp: TempPaths,
    control: Arc<RunControl>,
    metrics: Metrics,
    started: Instant,
}

impl StressArgs {
    pub fn new(name: &'static str, control: Arc<RunControl>) -> Self {
        Self {
            name,
            instance: 0,
            owner: Pid::this(),
            max_ops: 0,
            verify: false,
            temp: TempPaths::default(),
            control,
            metrics: Metrics::new(),
            started: Instant::now(),
        }
    }

    pub fn with_instance(mut self, instance: u32) -> Self {
        self.instance = instance;
        self
    }

    /// Stop after `max_ops` bogo ops (0 = unlimited)
    pub fn with_max_ops(mut self, max_ops: u64) -> Self {
        self.max_ops = max_ops;
        self
    }

    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub fn with_temp_base<P: AsRef<Path>>(mut self, base: P) -> Self {
        self.temp = TempPaths::new(base);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn instance(&self) -> u32 {
        self.instance
    }

    /// Process that owns this instance's temp names
    pub fn owner(&self) -> Pid {
        self.owner
    }

    pub fn verify(&self) -> bool {
        self.verify
    }

    pub fn temp(&self) -> &TempPaths {
        &self.temp
    }

    pub fn control(&self) -> &Arc<RunControl> {
        &self.control
    }

    /// Stop predicate polled before each unit of work
    #[inline]
    pub fn keep_stressing(&self) -> bool {
        self.control.should_continue() &&
            (self.max_ops == 0 || self.metrics.bogo_ops() < self.max_ops)
    }

    /// Count one completed unit of work
    #[inline]
    pub fn inc_counter(&self) {
        self.metrics.record_bogo_op();
    }

    pub fn counter(&self) -> u64 {
        self.metrics.bogo_ops()
    }

    /// Report a correctness violation. Never alters control flow.
    pub fn report_failure(&self, message: fmt::Arguments<'_>) {
        self.metrics.record_failures(1);
        tracing::error!(stressor = self.name, instance = self.instance, "{}", message);
    }

    /// Fold failures observed outside this process (e.g. by a forked child)
    pub fn record_failures(&self, count: u64) {
        self.metrics.record_failures(count);
    }

    pub fn record_restart(&self) {
        self.metrics.record_restart();
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot(self.started.elapsed())
    }
}

impl fmt::Debug for StressArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StressArgs")
            .field("name", &self.name)
            .field("instance", &self.instance)
            .field("owner", &self.owner)
            .field("max_ops", &self.max_ops)
            .field("verify", &self.verify)
            .field("temp", &self.temp)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_ops_stops_stressing() {
        let args = StressArgs::new("test", RunControl::new()).with_max_ops(3);
        let mut done = 0;
        while args.keep_stressing() {
            args.inc_counter();
            done += 1;
        }
        assert_eq!(done, 3);
        assert_eq!(args.counter(), 3);
    }

    #[test]
    fn test_stop_latches() {
        let control = RunControl::new();
        let args = StressArgs::new("test", control.clone());
        assert!(args.keep_stressing());
        control.stop();
        assert!(!args.keep_stressing());
        assert!(!control.should_continue());
    }

    #[test]
    fn test_deadline_expires() {
        let control = RunControl::with_timeout(Duration::ZERO);
        assert!(!control.should_continue());
        assert!(!control.should_continue());
    }

    #[test]
    fn test_report_failure_counts() {
        let args = StressArgs::new("test", RunControl::new()).with_instance(2);
        args.report_failure(format_args!("probe {} succeeded", "x"));
        args.record_failures(2);
        let s = args.snapshot();
        assert_eq!(s.failures, 3);
        assert_eq!(s.bogo_ops, 0);
        assert_eq!(args.instance(), 2);
    }
}
