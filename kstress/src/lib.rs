//! kstress - kernel stress workers.
//!
//! Each stressor hammers one kernel subsystem until a shared stop condition
//! fires, reporting anything the kernel gets wrong along the way.
//!
//! - **msg** - a parent streams sequence numbers to a forked child over a
//!   System V message queue, optionally verifying order and content.
//! - **rename** - one file churns through `rename`, `renameat` and
//!   `renameat2`, interleaved with illegal-argument probes.
//!
//! ```rust,no_run
//! use kstress::{RunControl, StressArgs};
//!
//! let args = StressArgs::new("rename", RunControl::new())
//!     .with_max_ops(10_000)
//!     .with_temp_base("/tmp");
//! let stressor = kstress::stressor::find("rename").unwrap();
//! stressor.run(&args)?;
//! println!("{}", args.snapshot());
//! # Ok::<(), kstress::StressError>(())
//! ```

pub mod args;
pub mod constants;
pub mod error;
pub mod fd;
pub mod insights;
pub mod metrics;
pub mod stressor;
pub mod temp;

#[cfg(target_os = "linux")]
pub mod msg;
#[cfg(target_os = "linux")]
pub mod rename;

pub use args::{ RunControl, StressArgs };
pub use error::{ ExitStatus, Result, StressError };
pub use metrics::MetricsSnapshot;
pub use stressor::{ Help, Stressor, STRESSORS };
pub use nix::errno::Errno;
