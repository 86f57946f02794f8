//! Rename churn tests
#![cfg(target_os = "linux")]

use std::fs;
use std::time::Duration;

use kstress::rename::{ RenameEngine, RenameStressor };
use kstress::{ ExitStatus, RunControl, StressArgs };
use kstress_test_support::{ assert_clean, print_summary, StressConfig, StressRunner };

#[test]
fn test_bounded_run_leaves_nothing_behind() {
    let scratch = tempfile::tempdir().unwrap();
    let args = StressArgs::new("rename", RunControl::new())
        .with_max_ops(500)
        .with_temp_base(scratch.path());

    RenameEngine::new(&args).unwrap().run().unwrap();

    let snapshot = args.snapshot();
    assert_eq!(snapshot.bogo_ops, 500);
    assert_eq!(snapshot.failures, 0);
    assert_eq!(snapshot.restarts, 0);
    assert_clean(scratch.path());
}

#[test]
fn test_instances_use_disjoint_directories() {
    let scratch = tempfile::tempdir().unwrap();
    let runner = StressRunner::new(
        StressConfig::ops(2_000).with_instances(4).with_temp_base(scratch.path())
    );

    let metrics = runner.run(&RenameStressor);
    print_summary("rename", &metrics);

    assert_eq!(metrics.instances.len(), 4);
    assert_eq!(metrics.total.bogo_ops, 8_000);
    assert_eq!(metrics.total.failures, 0);
    assert!(metrics.passed());
    assert_clean(scratch.path());
}

#[test]
fn test_timed_run_cleans_up() {
    let scratch = tempfile::tempdir().unwrap();
    let config = StressConfig::new(1)
        .with_instances(2)
        .with_temp_base(scratch.path())
        .with_report_interval(Duration::from_millis(250));

    let metrics = StressRunner::new(config).run_with_progress(&RenameStressor);

    assert!(metrics.total.bogo_ops > 0);
    assert!(metrics.passed());
    assert_clean(scratch.path());
}

#[test]
fn test_missing_base_directory_is_fatal() {
    let scratch = tempfile::tempdir().unwrap();
    let missing = scratch.path().join("missing");
    let runner = StressRunner::new(StressConfig::ops(10).with_temp_base(&missing));

    let metrics = runner.run(&RenameStressor);

    assert_eq!(metrics.exit_status(), ExitStatus::Failure);
    assert!(!missing.exists());
    assert!(fs::read_dir(scratch.path()).unwrap().next().is_none());
}
