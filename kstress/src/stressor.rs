//! Stressor registry.

use crate::args::StressArgs;
use crate::error::Result;

/// One line of per-stressor help text
#[derive(Debug, Clone, Copy)]
pub struct Help {
    pub short: Option<&'static str>,
    pub long: &'static str,
    pub description: &'static str,
}

impl Help {
    pub const fn new(
        short: Option<&'static str>,
        long: &'static str,
        description: &'static str
    ) -> Self {
        Self { short, long, description }
    }
}

/// A self-contained stress algorithm.
pub trait Stressor: Sync {
    fn name(&self) -> &'static str;

    fn help(&self) -> &'static [Help];

    /// Run one instance until `args.keep_stressing()` turns false or a
    /// fatal error occurs. Correctness violations are reported through
    /// `args` and do not end the run.
    fn run(&self, args: &StressArgs) -> Result<()>;
}

/// Every stressor built for this platform
pub static STRESSORS: &[&dyn Stressor] = &[
    #[cfg(target_os = "linux")]
    &crate::msg::MsgStressor,
    #[cfg(target_os = "linux")]
    &crate::rename::RenameStressor,
];

/// Look a stressor up by name
pub fn find(name: &str) -> Option<&'static dyn Stressor> {
    STRESSORS.iter().copied().find(|s| s.name() == name)
}
