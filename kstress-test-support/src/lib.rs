//! # kstress-test-support
//!
//! Testing infrastructure for kstress.
//!
//! ## Components
//!
//! - **StressRunner** - Runs several instances of a stressor with progress reporting
//! - **residue** - Finds files and directories a run failed to clean up

pub mod residue;
pub mod stress;

pub use residue::{ assert_clean, leftover_entries };
pub use stress::{ print_summary, InstanceOutcome, StressConfig, StressMetrics, StressRunner };
