//! Multi-instance stress runs with progress reporting.

use std::path::{ Path, PathBuf };
use std::sync::Arc;
use std::thread;
use std::time::{ Duration, Instant };

use crossbeam_channel::{ select, tick, unbounded };
use kstress::insights::stressor_span;
use kstress::{ ExitStatus, MetricsSnapshot, RunControl, StressArgs, Stressor };
use tracing::debug;

/// Configuration for stress runs
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Stop after this long (`None` = only the ops limit stops the run)
    pub duration: Option<Duration>,
    /// Number of concurrently running instances
    pub instances: u32,
    /// Bogo-op limit per instance (0 = unlimited)
    pub max_ops: u64,
    /// Verify payloads where the stressor supports it
    pub verify: bool,
    /// Where instances create their temp directories
    pub temp_base: PathBuf,
    /// Print progress every interval
    pub report_interval: Duration,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            duration: Some(Duration::from_secs(10)),
            instances: 1,
            max_ops: 0,
            verify: false,
            temp_base: std::env::temp_dir(),
            report_interval: Duration::from_secs(1),
        }
    }
}

impl StressConfig {
    pub fn new(duration_secs: u64) -> Self {
        Self {
            duration: Some(Duration::from_secs(duration_secs)),
            ..Default::default()
        }
    }

    /// Run until every instance hits `max_ops`
    pub fn ops(max_ops: u64) -> Self {
        Self {
            duration: None,
            max_ops,
            ..Default::default()
        }
    }

    pub fn with_instances(mut self, n: u32) -> Self {
        self.instances = n;
        self
    }

    pub fn with_max_ops(mut self, max_ops: u64) -> Self {
        self.max_ops = max_ops;
        self
    }

    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub fn with_temp_base<P: AsRef<Path>>(mut self, base: P) -> Self {
        self.temp_base = base.as_ref().to_path_buf();
        self
    }

    pub fn with_report_interval(mut self, interval: Duration) -> Self {
        self.report_interval = interval;
        self
    }
}

/// What one instance ended with
#[derive(Debug, Clone)]
pub struct InstanceOutcome {
    pub instance: u32,
    pub status: ExitStatus,
    pub metrics: MetricsSnapshot,
    pub error: Option<String>,
}

/// Metrics collected during a stress run
#[derive(Debug, Clone, Default)]
pub struct StressMetrics {
    pub instances: Vec<InstanceOutcome>,
    pub total: MetricsSnapshot,
    pub duration: Duration,
}

impl StressMetrics {
    /// Every instance succeeded and no correctness failure was reported
    pub fn passed(&self) -> bool {
        self.total.failures == 0 && self.instances.iter().all(|i| i.status.is_success())
    }

    /// Worst status across all instances
    pub fn exit_status(&self) -> ExitStatus {
        ExitStatus::worst(self.instances.iter().map(|i| i.status))
    }

    pub fn ops_per_sec(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.total.bogo_ops as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }
}

/// Runner for stress tests with progress reporting
pub struct StressRunner {
    config: StressConfig,
    control: Arc<RunControl>,
}

impl StressRunner {
    pub fn new(config: StressConfig) -> Self {
        let control = match config.duration {
            Some(duration) => RunControl::with_timeout(duration),
            None => RunControl::new(),
        };
        Self { config, control }
    }

    /// Stop predicate shared by every instance; `stop()` ends the run early
    pub fn control(&self) -> Arc<RunControl> {
        self.control.clone()
    }

    pub fn config(&self) -> &StressConfig {
        &self.config
    }

    fn args_for(&self, name: &'static str, instance: u32) -> StressArgs {
        StressArgs::new(name, self.control.clone())
            .with_instance(instance)
            .with_max_ops(self.config.max_ops)
            .with_verify(self.config.verify)
            .with_temp_base(&self.config.temp_base)
    }

    /// Run all instances of `stressor` to completion
    pub fn run(&self, stressor: &dyn Stressor) -> StressMetrics {
        self.run_inner(stressor, false)
    }

    /// Same as [`run`](Self::run), printing a progress line every interval
    pub fn run_with_progress(&self, stressor: &dyn Stressor) -> StressMetrics {
        self.run_inner(stressor, true)
    }

    fn run_inner(&self, stressor: &dyn Stressor, progress: bool) -> StressMetrics {
        let start = Instant::now();
        let args: Vec<StressArgs> = (0..self.config.instances)
            .map(|i| self.args_for(stressor.name(), i))
            .collect();
        let (tx, rx) = unbounded();
        let ticker = tick(self.config.report_interval);
        let mut instances = Vec::with_capacity(args.len());

        thread::scope(|s| {
            for args in &args {
                let tx = tx.clone();
                s.spawn(move || {
                    let _span = stressor_span(args.name(), args.instance()).entered();
                    let result = stressor.run(args);
                    let _ = tx.send(outcome(args, &result));
                });
            }
            drop(tx);

            let mut last_ops = 0u64;
            loop {
                select! {
                    recv(rx) -> msg => match msg {
                        Ok(outcome) => {
                            debug!(instance = outcome.instance, status = ?outcome.status, "instance finished");
                            instances.push(outcome);
                        }
                        Err(_) => break,
                    },
                    recv(ticker) -> _ => {
                        if progress {
                            let ops: u64 = args.iter().map(|a| a.counter()).sum();
                            let rate = (ops - last_ops) as f64 / self.config.report_interval.as_secs_f64();
                            last_ops = ops;
                            eprintln!(
                                "[{:>5.1}s] {}: ops: {:>10}, rate: {:>8.0}/s, done: {}/{}",
                                start.elapsed().as_secs_f64(),
                                stressor.name(),
                                ops,
                                rate,
                                instances.len(),
                                args.len()
                            );
                        }
                    }
                }
            }
        });

        instances.sort_by_key(|i| i.instance);
        let mut total = MetricsSnapshot::default();
        for instance in &instances {
            total.merge(&instance.metrics);
        }

        StressMetrics {
            instances,
            total,
            duration: start.elapsed(),
        }
    }
}

fn outcome(args: &StressArgs, result: &kstress::Result<()>) -> InstanceOutcome {
    let metrics = args.snapshot();
    let status = match ExitStatus::from(result) {
        ExitStatus::Success if metrics.failures > 0 => ExitStatus::NotSuccess,
        status => status,
    };
    InstanceOutcome {
        instance: args.instance(),
        status,
        metrics,
        error: result.as_ref().err().map(|e| e.to_string()),
    }
}

/// Print a summary of stress run results
pub fn print_summary(name: &str, metrics: &StressMetrics) {
    eprintln!("\n╔══════════════════════════════════════════════════════════════╗");
    eprintln!("║                    STRESS RUN RESULTS                        ║");
    eprintln!("╠══════════════════════════════════════════════════════════════╣");
    eprintln!("║  Stressor:        {:>10}                                  ║", name);
    eprintln!("║  Instances:       {:>10}                                  ║", metrics.instances.len());
    eprintln!("║  Duration:        {:>10.2}s                                ║", metrics.duration.as_secs_f64());
    eprintln!("║  Bogo Ops:        {:>10}                                  ║", metrics.total.bogo_ops);
    eprintln!("║  Ops Rate:        {:>10.0} ops/s                          ║", metrics.ops_per_sec());
    eprintln!("║  Restarts:        {:>10}                                  ║", metrics.total.restarts);
    eprintln!("║  Failures:        {:>10}                                  ║", metrics.total.failures);
    eprintln!("╚══════════════════════════════════════════════════════════════╝");

    for instance in metrics.instances.iter().filter(|i| !i.status.is_success()) {
        eprintln!(
            "  instance {}: {:?} {}",
            instance.instance,
            instance.status,
            instance.error.as_deref().unwrap_or("")
        );
    }

    if metrics.passed() {
        eprintln!("\n✅ PASSED: {} bogo ops, no failures", metrics.total.bogo_ops);
    } else {
        eprintln!("\n❌ FAILED: {} failures, exit status {:?}", metrics.total.failures, metrics.exit_status());
    }
}
