//! Rename churn engine.
//!
//! One live file is moved around two sibling directories through four rename
//! flavours. Any failed rename throws both names away and bootstraps a new
//! file under a fresh generation of names.

use std::fs::{ self, File, OpenOptions };
use std::io;
use std::os::fd::{ AsRawFd, RawFd };
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;

use tracing::{ debug, error, trace, warn };

use crate::args::StressArgs;
use crate::error::Result;
use crate::fd::bad_descriptor;
use crate::rename::probes::{ exercise_renameat, exercise_renameat2 };
use crate::rename::sys::{ self, AT_FDCWD, RENAME_NOREPLACE };
use crate::rename::SlotPair;
use crate::temp::TempDirPair;

/// One transformation of the churn loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// `rename` into the second directory
    Rename,
    /// `rename` back into the first directory
    RenameBack,
    /// `renameat` from a directory descriptor, after its probe battery
    RenameAt,
    /// `renameat2(RENAME_NOREPLACE)`, after its probe battery
    RenameAt2,
}

impl Step {
    pub const ALL: [Step; 4] = [Step::Rename, Step::RenameBack, Step::RenameAt, Step::RenameAt2];

    fn name(self) -> &'static str {
        match self {
            Step::Rename | Step::RenameBack => "rename",
            Step::RenameAt => "renameat",
            Step::RenameAt2 => "renameat2",
        }
    }
}

/// How a pass over the churn loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Churn {
    Stopped,
    Restart,
}

pub struct RenameEngine<'a> {
    args: &'a StressArgs,
    dirs: TempDirPair,
    base: PathBuf,
    /// Name generation; never reset, so no name is ever reused
    seq: u64,
    bad_fd: RawFd,
}

impl<'a> RenameEngine<'a> {
    /// Create the two instance directories (`instance * 2` and `instance * 2 + 1`).
    pub fn new(args: &'a StressArgs) -> Result<Self> {
        let inst1 = args.instance() * 2;
        let dirs = TempDirPair::acquire(args.temp(), args.name(), args.owner(), [inst1, inst1 + 1])
            .map_err(|err| {
                error!(%err, base = %args.temp().base().display(), "cannot create temp directories");
                err
            })?;

        Ok(Self {
            args,
            dirs,
            base: args.temp().base().to_path_buf(),
            seq: 0,
            bad_fd: bad_descriptor(),
        })
    }

    /// Churn until the stop condition fires, then remove everything.
    pub fn run(mut self) -> Result<()> {
        loop {
            let mut slots = match self.bootstrap() {
                Ok(slots) => slots,
                Err(err) => {
                    error!(%err, "cannot create the subject file");
                    self.release_dirs();
                    return Err(err.into());
                }
            };

            match self.churn(&mut slots) {
                Churn::Stopped => {
                    slots.unlink_all(&self.base);
                    self.release_dirs();
                    return Ok(());
                }
                Churn::Restart => {
                    slots.unlink_all(&self.base);
                    self.args.record_restart();
                    if !self.args.keep_stressing() {
                        self.release_dirs();
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Base-relative name `seq` inside directory `instance`
    fn mint(&mut self, instance: u32) -> PathBuf {
        let name = self.args.temp().file_name(self.args.name(), self.args.owner(), instance, self.seq);
        self.seq += 1;
        name
    }

    fn bootstrap(&mut self) -> io::Result<SlotPair> {
        let first = self.mint(self.dirs.instances()[0]);
        File::create(self.base.join(&first))?;
        trace!(file = %first.display(), "subject file created");
        Ok(SlotPair::new(first))
    }

    fn churn(&mut self, slots: &mut SlotPair) -> Churn {
        loop {
            for step in Step::ALL {
                if let Err(err) = self.step(step, slots) {
                    debug!(step = step.name(), %err, "rename failed, restarting");
                    return Churn::Restart;
                }
                self.args.inc_counter();
                if !self.args.keep_stressing() {
                    return Churn::Stopped;
                }
            }
        }
    }

    /// Mint a name for `step`, move the live file there and rotate the slots.
    ///
    /// On error the slots are left as they were, with the fresh name in the
    /// "next" slot, so the caller can unlink both.
    pub fn step(&mut self, step: Step, slots: &mut SlotPair) -> io::Result<()> {
        let [inst1, inst2] = self.dirs.instances();
        let target = if step == Step::Rename { inst2 } else { inst1 };
        slots.set_next(self.mint(target));

        let (old, new) = (slots.current(), slots.next());
        match step {
            Step::Rename | Step::RenameBack => {
                fs::rename(self.base.join(old), self.base.join(new))?;
            }
            Step::RenameAt => {
                let dir = self.open_base()?;
                exercise_renameat(self.args, &self.base, old, new, self.bad_fd);
                sys::renameat(dir.as_raw_fd(), old, AT_FDCWD, self.base.join(new).as_path())?;
                let _ = dir.sync_all();
            }
            Step::RenameAt2 => {
                let dir = self.open_base()?;
                exercise_renameat2(self.args, &self.base, dir.as_raw_fd(), old, new, self.bad_fd);
                sys::renameat2(
                    dir.as_raw_fd(),
                    old,
                    AT_FDCWD,
                    self.base.join(new).as_path(),
                    RENAME_NOREPLACE
                )?;
            }
        }

        slots.rotate();
        Ok(())
    }

    fn open_base(&self) -> io::Result<File> {
        OpenOptions::new().read(true).custom_flags(libc::O_DIRECTORY).open(&self.base)
    }

    fn release_dirs(&mut self) {
        if let Err(err) = self.dirs.release() {
            warn!(%err, "cannot remove temp directories");
        }
    }
}
