//! System V message queue stressor.
//!
//! A parent streams sequence numbers to a forked child over one queue; the
//! child optionally verifies them. See [`run_pair`] for the protocol.

mod message;
mod pair;
mod queue;
mod tally;

pub use message::{ Message, Payload };
pub use pair::{ consume, produce, run_pair, PairOutcome, SendLoopExit };
pub use queue::{ MsgQueue, QueueStats };
pub use tally::{ ConsumerTally, SharedTally };

use crate::args::StressArgs;
use crate::error::Result;
use crate::stressor::{ Help, Stressor };

static HELP: &[Help] = &[
    Help::new(None, "msg N", "start N workers stressing System V messages"),
    Help::new(None, "msg-ops N", "stop msg workers after N bogo messages"),
];

/// Registry entry for the message queue stressor
pub struct MsgStressor;

impl Stressor for MsgStressor {
    fn name(&self) -> &'static str {
        "msg"
    }

    fn help(&self) -> &'static [Help] {
        HELP
    }

    fn run(&self, args: &StressArgs) -> Result<()> {
        run_pair(args).map(drop)
    }
}
