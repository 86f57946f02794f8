//! Rename churn stressor.
//!
//! Keeps a single file moving between two private directories with `rename`,
//! `renameat` and `renameat2`, probing illegal argument combinations along
//! the way. See [`RenameEngine`].

mod engine;
mod probes;
mod slots;
pub mod sys;

pub use engine::{ RenameEngine, Step };
pub use probes::{ exercise_renameat, exercise_renameat2, ProbeReport };
pub use slots::SlotPair;

use crate::args::StressArgs;
use crate::error::Result;
use crate::stressor::{ Help, Stressor };

static HELP: &[Help] = &[
    Help::new(Some("R"), "rename N", "start N workers exercising file renames"),
    Help::new(None, "rename-ops N", "stop after N rename bogo operations"),
];

/// Registry entry for the rename stressor
pub struct RenameStressor;

impl Stressor for RenameStressor {
    fn name(&self) -> &'static str {
        "rename"
    }

    fn help(&self) -> &'static [Help] {
        HELP
    }

    fn run(&self, args: &StressArgs) -> Result<()> {
        RenameEngine::new(args)?.run()
    }
}
