//! System V message queue handle.
//!
//! ```rust,no_run
//! use kstress::msg::{Message, MsgQueue};
//!
//! let queue = MsgQueue::create()?;
//! queue.send(&Message::sequence(42))?;
//! let msg = queue.receive()?;
//! queue.remove()?;
//! # Ok::<(), kstress::StressError>(())
//! ```

use std::ffi::{ c_int, c_ushort, c_void };
use std::mem::MaybeUninit;

use nix::errno::Errno;
use tracing::debug;

use crate::constants::{ MSGQ_MODE, MSG_PAYLOAD_SIZE };
use crate::error::{ Result, StressError };
use crate::msg::Message;

// <linux/msg.h>, not exported by every libc target
#[cfg(target_os = "linux")]
const IPC_INFO: c_int = 3;
#[cfg(target_os = "linux")]
const MSG_INFO: c_int = 12;

/// `struct msginfo` as filled in by `IPC_INFO` / `MSG_INFO`
#[cfg(target_os = "linux")]
#[repr(C)]
#[derive(Debug, Default)]
struct MsgInfo {
    msgpool: c_int,
    msgmap: c_int,
    msgmax: c_int,
    msgmnb: c_int,
    msgmni: c_int,
    msgssz: c_int,
    msgtql: c_int,
    msgseg: c_ushort,
}

/// Snapshot of `IPC_STAT` for one queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    /// Messages currently queued
    pub messages: u64,
    /// Maximum bytes the queue may hold
    pub max_bytes: u64,
}

/// Exclusively created message queue, removed exactly once.
///
/// A forked consumer holds a copy of the handle but leaves through `_exit`,
/// so only the creating process ever removes the queue.
#[derive(Debug)]
pub struct MsgQueue {
    id: c_int,
    removed: bool,
}

impl MsgQueue {
    /// `msgget(IPC_PRIVATE, IPC_CREAT | IPC_EXCL | 0600)`
    pub fn create() -> Result<Self> {
        let ret = unsafe {
            libc::msgget(libc::IPC_PRIVATE, libc::IPC_CREAT | libc::IPC_EXCL | MSGQ_MODE)
        };
        let id = Errno::result(ret).map_err(|errno| StressError::syscall("msgget", errno))?;
        debug!(msgq_id = id, "System V message queue created");
        Ok(Self { id, removed: false })
    }

    pub fn id(&self) -> c_int {
        self.id
    }

    /// Blocking send of one message; blocks while the queue is full.
    pub fn send(&self, msg: &Message) -> nix::Result<()> {
        let ret = unsafe {
            libc::msgsnd(self.id, msg as *const Message as *const c_void, MSG_PAYLOAD_SIZE, 0)
        };
        Errno::result(ret).map(drop)
    }

    /// Blocking receive of the next message of any type.
    pub fn receive(&self) -> nix::Result<Message> {
        let mut msg = Message::empty();
        let ret = unsafe {
            libc::msgrcv(self.id, &mut msg as *mut Message as *mut c_void, MSG_PAYLOAD_SIZE, 0, 0)
        };
        Errno::result(ret).map(|_| msg)
    }

    /// Query queue state (`IPC_STAT`, plus `IPC_INFO` and `MSG_INFO` on Linux).
    pub fn stats(&self) -> Result<QueueStats> {
        let ds = stat(self.id).map_err(|errno| StressError::syscall("msgctl IPC_STAT", errno))?;

        #[cfg(target_os = "linux")]
        {
            info(self.id, IPC_INFO).map_err(|errno| StressError::syscall("msgctl IPC_INFO", errno))?;
            info(self.id, MSG_INFO).map_err(|errno| StressError::syscall("msgctl MSG_INFO", errno))?;
        }

        Ok(QueueStats {
            messages: ds.msg_qnum as u64,
            max_bytes: ds.msg_qbytes as u64,
        })
    }

    /// `msgctl(IPC_RMID)`
    pub fn remove(mut self) -> Result<()> {
        self.removed = true;
        rmid(self.id).map_err(|errno| StressError::syscall("msgctl IPC_RMID", errno))?;
        debug!(msgq_id = self.id, "System V message queue deleted");
        Ok(())
    }

    /// Whether a queue with this id is still known to the kernel
    pub fn exists(id: c_int) -> bool {
        stat(id).is_ok()
    }
}

impl Drop for MsgQueue {
    fn drop(&mut self) {
        if !self.removed {
            let _ = rmid(self.id);
        }
    }
}

fn stat(id: c_int) -> nix::Result<libc::msqid_ds> {
    let mut ds = MaybeUninit::<libc::msqid_ds>::zeroed();
    let ret = unsafe { libc::msgctl(id, libc::IPC_STAT, ds.as_mut_ptr()) };
    Errno::result(ret)?;
    Ok(unsafe { ds.assume_init() })
}

#[cfg(target_os = "linux")]
fn info(id: c_int, cmd: c_int) -> nix::Result<MsgInfo> {
    let mut info = MsgInfo::default();
    let ret = unsafe { libc::msgctl(id, cmd, &mut info as *mut MsgInfo as *mut libc::msqid_ds) };
    Errno::result(ret).map(|_| info)
}

fn rmid(id: c_int) -> nix::Result<()> {
    let ret = unsafe { libc::msgctl(id, libc::IPC_RMID, std::ptr::null_mut()) };
    Errno::result(ret).map(drop)
}
